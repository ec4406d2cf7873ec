//! Zoe TUI Entry Point
//!
//! Launches the terminal surface for Zoe.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (~/.config/zoe/zoe.toml if present)
//! zoe
//!
//! # Custom config file and data directory
//! zoe --config ./zoe.toml --data-dir /tmp/zoe
//!
//! # Skip all typing delays
//! zoe --instant
//!
//! # Verbose logging (written to <data_dir>/zoe.log)
//! RUST_LOG=debug zoe
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zoe_core::{default_config_path, load_config_from_path, ConfigOverrides, ZoeConfig};
use zoe_tui::{build_responder, App, TokioPacer};

/// Log file name inside the data directory
const LOG_FILE: &str = "zoe.log";

/// Zoe - a small companion in your terminal
#[derive(Parser, Debug)]
#[command(name = "zoe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "ZOE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the conversation record, credential and log
    #[arg(short = 'd', long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Model used for remote replies
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Attempts per remote reply
    #[arg(long)]
    retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Playback speed (1.0 = as scripted)
    #[arg(short = 's', long)]
    speed: Option<f64>,

    /// Show replies without typing delays
    #[arg(long, conflicts_with = "speed")]
    instant: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(model) = &self.model {
            overrides = overrides.with_model(model.clone());
        }
        if let Some(dir) = &self.data_dir {
            overrides = overrides.with_data_dir(dir.clone());
        }
        if let Some(retries) = self.retries {
            overrides = overrides.with_retries(retries);
        }
        if let Some(ms) = self.timeout_ms {
            overrides = overrides.with_timeout_ms(ms);
        }
        if self.instant {
            overrides = overrides.with_pacing_speed(0.0);
        } else if let Some(speed) = self.speed {
            overrides = overrides.with_pacing_speed(speed);
        }
        overrides
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid command-line options")?;

    init_logging(config.data_dir.as_deref())?;
    tracing::info!(
        source = %config.source(),
        config_file = ?config.config_file_path,
        "Configuration loaded"
    );

    // Check if we have a TTY before attempting initialization
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("zoe needs a terminal (TTY).");
        eprintln!();
        eprintln!("This usually means stdin/stdout are piped, or you are on SSH");
        eprintln!("without -t. Run zoe directly in a terminal.");
        std::process::exit(1);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(config))
}

/// Send logs to `<data_dir>/zoe.log`; the terminal belongs to the UI
fn init_logging(data_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = data_dir else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(io::sink))
            .with(filter)
            .init();
        return Ok(());
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {dir:?}"))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {path:?}"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();
    Ok(())
}

async fn run(config: ZoeConfig) -> Result<()> {
    let responder = build_responder(&config).await?;
    let mut app = App::new(
        responder,
        TokioPacer::new(config.pacing_speed),
        config.mind,
    )?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(goodbye) = app.goodbye() {
        println!("\n\x1b[35mzoe:\x1b[0m {goodbye}\n");
    }
    tracing::info!("Session ended");

    result
}
