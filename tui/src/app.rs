//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, resize, frame tick)
//! - Turns: one spawned task at a time, gated by [`InputGate`]
//! - Idle loop: the [`Mind`] thinking out loud while the user is quiet
//! - [`DisplayState`] for rendering
//!
//! # Turn Flow
//!
//! 1. Enter claims a [`TurnGuard`]; input stays closed until it drops
//! 2. The turn task locks the responder, gets a [`Reply`] and releases it
//! 3. The script plays through the [`TokioPacer`], each step sent as a
//!    [`UiEvent`] over an unbounded channel
//! 4. A scheduled awakening plays after its delay in the same task
//!
//! The idle loop writes through the same channel and may interleave with a
//! turn; it only reads the phase. A second background loop runs the
//! responder's self-check between turns.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::Terminal;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use zoe_core::integrity::BREATH;
use zoe_core::{
    play, ChoiceAction, CredentialStore, FollowUp, InputGate, JsonFileStore, Line, LineKind,
    MemoryStore, Mind, MindConfig, Pacer, Phase, Reply, Responder, StateStore, Step, TurnGuard,
    ZoeConfig,
};

use crate::display::{DisplayRole, DisplayState, HudStatus, UiEvent};
use crate::pacer::TokioPacer;
use crate::theme::{
    line_style, user_style, DIM_GRAY, DISCOVERY_GOLD, GLITCH_CHARS, SPARKLE, SPARKLE_CHARS,
    ZOE_VIOLET,
};

/// Input box height (lines), separator included
const INPUT_HEIGHT: u16 = 3;

/// ~30 FPS is plenty for typing indicators and glitches
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Share of characters replaced while glitching
const GLITCH_RATE: f64 = 0.15;

/// Lines affected by a glitch, counted from the bottom
const GLITCH_LINES: usize = 6;

// ============================================================================
// Commands
// ============================================================================

/// What a submitted input line asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain message for Zoe
    Message(String),
    /// `/key <key>`
    Key(String),
    /// `/reset`
    Reset,
    /// `/quit`
    Quit,
    /// Any other `/word`
    Unknown(String),
}

impl Command {
    /// Parse one submitted line, `None` if it is blank
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Some(Self::Message(input.to_string()));
        };

        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        Some(match name.to_lowercase().as_str() {
            "key" => Self::Key(arg.trim().to_string()),
            "reset" => Self::Reset,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(name.to_string()),
        })
    }
}

/// Work a turn task performs against the responder
#[derive(Clone, Debug, PartialEq)]
enum TurnAction {
    Opening,
    Message(String),
    Choose(ChoiceAction),
    SetKey(String),
    Reset,
}

// ============================================================================
// Startup
// ============================================================================

/// Build the responder from configuration and load what was persisted
///
/// Without a data directory the record lives in memory and keys entered
/// with `/key` last for the session only.
///
/// # Errors
///
/// Fails only if the rule table does not compile.
pub async fn build_responder(config: &ZoeConfig) -> anyhow::Result<Responder> {
    let store: Arc<dyn StateStore> = match &config.data_dir {
        Some(dir) => Arc::new(JsonFileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };

    let mut responder = Responder::new(config.responder_settings(), store)?;
    if let Some(dir) = &config.data_dir {
        responder = responder.with_credentials(CredentialStore::new(dir));
    }

    responder.restore().await;
    let has_credential = responder.load_credential(config.api_key.as_deref()).await;

    tracing::info!(
        phase = %responder.state().phase(),
        has_credential,
        data_dir = ?config.data_dir.as_ref().map(PathBuf::as_path),
        "Responder ready"
    );
    Ok(responder)
}

fn hud_status(responder: &Responder) -> HudStatus {
    HudStatus {
        snapshot: responder.snapshot(),
        has_credential: responder.has_credential(),
        online: responder.is_online(),
        degraded: responder.is_degraded(),
    }
}

// ============================================================================
// App
// ============================================================================

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    /// Goodbye message to show on exit
    goodbye_message: Option<String>,

    // === Conversation ===
    /// The pipeline, shared with turn tasks
    responder: Arc<Mutex<Responder>>,
    /// One turn at a time
    gate: InputGate,
    /// Script timing
    pacer: TokioPacer,
    /// Idle loop settings
    mind_config: MindConfig,

    // === Channels ===
    events_tx: mpsc::UnboundedSender<UiEvent>,
    events_rx: mpsc::UnboundedReceiver<UiEvent>,
    /// Tells the idle loop the user typed something
    idle_reset: Option<mpsc::UnboundedSender<()>>,
    /// Phase as last reported, for the idle loop
    phase_tx: watch::Sender<Phase>,
    idle_task: Option<JoinHandle<()>>,
    integrity_task: Option<JoinHandle<()>>,

    // === Display ===
    display: DisplayState,
    /// User input buffer
    input_buffer: String,
    /// Scroll offset (lines from bottom, 0 = latest)
    scroll_offset: usize,
    /// Total rendered lines (for scroll bounds)
    total_lines: usize,

    // === Misc State ===
    /// Last frame time (for effect timers)
    last_frame: Instant,
    /// Terminal size
    size: (u16, u16),
}

impl App {
    /// Create a new App around a ready responder
    ///
    /// # Errors
    ///
    /// Fails if the terminal size cannot be read.
    pub fn new(
        responder: Responder,
        pacer: TokioPacer,
        mind_config: MindConfig,
    ) -> anyhow::Result<Self> {
        let size = crossterm::terminal::size()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut display = DisplayState::new();
        display.status = hud_status(&responder);
        let (phase_tx, _) = watch::channel(responder.state().phase());

        Ok(Self {
            running: true,
            goodbye_message: None,
            responder: Arc::new(Mutex::new(responder)),
            gate: InputGate::new(),
            pacer,
            mind_config,
            events_tx,
            events_rx,
            idle_reset: None,
            phase_tx,
            idle_task: None,
            integrity_task: None,
            display,
            input_buffer: String::new(),
            scroll_offset: 0,
            total_lines: 0,
            last_frame: Instant::now(),
            size,
        })
    }

    /// Main event loop
    ///
    /// # Errors
    ///
    /// Propagates terminal I/O errors.
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();
        let mut frame = tokio::time::interval(FRAME_INTERVAL);
        frame.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        self.spawn_idle_loop();
        self.integrity_task = Some(tokio::spawn(integrity_loop(Arc::clone(&self.responder))));
        self.start_turn(TurnAction::Opening);

        // Render initial frame immediately so user sees UI
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Terminal events - highest priority
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            self.handle_key(key);
                        }
                        Some(Ok(Event::Resize(w, h))) => self.size = (w, h),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Terminal event error");
                        }
                        None => self.running = false,
                    }
                }

                Some(event) = self.events_rx.recv() => self.apply_event(event),

                _ = frame.tick() => {}
            }

            while let Ok(event) = self.events_rx.try_recv() {
                self.apply_event(event);
            }

            self.update();
            self.render(terminal)?;
        }

        for task in [self.idle_task.take(), self.integrity_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        Ok(())
    }

    fn apply_event(&mut self, event: UiEvent) {
        if let UiEvent::Status(status) = &event {
            self.phase_tx.send_replace(status.snapshot.phase);
        }
        if matches!(event, UiEvent::Step(_)) {
            self.scroll_offset = 0;
        }
        self.display.apply(event);
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Handle keyboard input
    fn handle_key(&mut self, key: event::KeyEvent) {
        match key.code {
            // Quit
            KeyCode::Esc => self.quit(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.quit(),

            // Submit
            KeyCode::Enter => self.submit(),

            // Choice shortcut: a digit on an empty line
            KeyCode::Char(c)
                if self.input_buffer.is_empty() && self.choice_for(&c.to_string()).is_some() =>
            {
                if let Some(action) = self.choice_for(&c.to_string()) {
                    self.choose(action);
                }
            }

            // Typing
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
                self.notify_activity();
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            // Conversation scrolling
            KeyCode::PageUp => {
                let page = usize::from(self.size.1 / 2);
                let max_scroll = self.total_lines.saturating_sub(1);
                self.scroll_offset = (self.scroll_offset + page).min(max_scroll);
            }
            KeyCode::PageDown => {
                let page = usize::from(self.size.1 / 2);
                self.scroll_offset = self.scroll_offset.saturating_sub(page);
            }

            _ => {}
        }
    }

    /// Submit the input buffer
    fn submit(&mut self) {
        let Some(command) = Command::parse(&self.input_buffer) else {
            self.input_buffer.clear();
            return;
        };

        if command == Command::Quit {
            self.quit();
            return;
        }

        // Input is closed while a turn plays; keep what was typed
        if !self.gate.is_open() {
            return;
        }
        self.input_buffer.clear();
        self.notify_activity();

        match command {
            Command::Message(text) => {
                if let Some(action) = self.choice_for(&text) {
                    self.choose(action);
                } else {
                    self.display.push_user(text.clone());
                    self.start_turn(TurnAction::Message(text));
                }
            }
            Command::Key(key) => {
                self.display.push_user("/key ****");
                self.start_turn(TurnAction::SetKey(key));
            }
            Command::Reset => {
                self.display.clear();
                self.start_turn(TurnAction::Reset);
            }
            Command::Unknown(name) => {
                self.display.apply(UiEvent::Step(Step::Line {
                    line: Line::new(LineKind::Notice, format!("commande inconnue: /{name}")),
                    delay_before: Duration::ZERO,
                }));
            }
            Command::Quit => {}
        }
    }

    /// Choice selected by number (1-based) or exact label
    fn choice_for(&self, text: &str) -> Option<ChoiceAction> {
        let text = text.trim();
        if let Ok(n) = text.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| self.display.choices.get(i))
                .map(|c| c.action);
        }
        self.display
            .choices
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(text))
            .map(|c| c.action)
    }

    fn choose(&mut self, action: ChoiceAction) {
        if let Some(choice) = self.display.choices.iter().find(|c| c.action == action) {
            let label = choice.label;
            if self.start_turn(TurnAction::Choose(action)) {
                self.display.push_user(label);
                self.display.clear_choices();
            }
        }
    }

    fn notify_activity(&mut self) {
        if let Some(reset) = &self.idle_reset {
            if reset.send(()).is_err() {
                self.idle_reset = None;
            }
        }
    }

    fn quit(&mut self) {
        let name = &self.display.status.snapshot.user_name;
        self.goodbye_message = Some(if name.is_empty() {
            "a bientot.".to_string()
        } else {
            format!("a bientot, {name}.")
        });
        self.running = false;
    }

    /// Get the goodbye message for display after TUI closes
    #[must_use]
    pub fn goodbye(&self) -> Option<&str> {
        self.goodbye_message.as_deref()
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    /// Spawn a turn if none is running
    fn start_turn(&mut self, action: TurnAction) -> bool {
        let Some(guard) = self.gate.begin_turn() else {
            tracing::debug!(?action, "Turn already running, input ignored");
            return false;
        };
        self.display.busy = true;

        tokio::spawn(run_turn(
            Arc::clone(&self.responder),
            self.pacer,
            self.events_tx.clone(),
            guard,
            action,
        ));
        true
    }

    fn spawn_idle_loop(&mut self) {
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();
        self.idle_reset = Some(reset_tx);
        self.idle_task = Some(tokio::spawn(idle_loop(
            Mind::new(self.mind_config),
            self.pacer,
            self.events_tx.clone(),
            reset_rx,
            self.phase_tx.subscribe(),
        )));
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Update effect timers
    fn update(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;

        self.display.update(delta);
        self.display.busy = !self.gate.is_open();
    }

    /// Conversation wrapped to `width`, oldest first
    fn conversation_lines(&self, width: usize) -> Vec<(String, Style)> {
        let mut lines = Vec::new();
        for line in &self.display.lines {
            let (prefix, style) = match line.role {
                DisplayRole::User => ("toi: ", user_style()),
                DisplayRole::Zoe(kind) => line_style(kind),
            };
            if line.role == DisplayRole::User && !lines.is_empty() {
                lines.push((String::new(), Style::default()));
            }
            let content = format!("{prefix}{}", line.text);
            for wrapped in textwrap::wrap(&content, width.max(1)) {
                lines.push((wrapped.into_owned(), style));
            }
        }
        lines
    }

    /// Render the UI
    fn render(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let layout = ScreenLayout::new(self.size, !self.display.choices.is_empty());
        if layout.conversation.width < 10 || layout.conversation.height < 3 {
            terminal.draw(|frame| {
                frame
                    .buffer_mut()
                    .set_string(0, 0, "zoe: trop petit.", Style::default().fg(ZOE_VIOLET));
            })?;
            return Ok(());
        }

        let lines = self.conversation_lines(usize::from(layout.conversation.width));
        self.total_lines = lines.len();

        let height = usize::from(layout.conversation.height);
        self.scroll_offset = self.scroll_offset.min(self.total_lines.saturating_sub(height));
        let end = self.total_lines - self.scroll_offset;
        let start = end.saturating_sub(height);
        let visible = &lines[start..end];

        let display = &self.display;
        let input = &self.input_buffer;
        let scroll_offset = self.scroll_offset;

        terminal.draw(|frame| {
            let buf = frame.buffer_mut();
            let mut rng = rand::thread_rng();

            render_hud(buf, layout.hud, display);
            render_conversation(buf, layout.conversation, visible, display, &mut rng);
            if let Some(area) = layout.choices {
                render_choices(buf, area, display);
            }
            render_input(buf, layout.input, input, display);
            render_hint(buf, layout.hint, scroll_offset);
        })?;

        Ok(())
    }
}

// ============================================================================
// Background tasks
// ============================================================================

/// One turn: ask the responder, then play the reply
async fn run_turn(
    responder: Arc<Mutex<Responder>>,
    pacer: TokioPacer,
    events: mpsc::UnboundedSender<UiEvent>,
    guard: TurnGuard,
    action: TurnAction,
) {
    let reply = {
        let mut zoe = responder.lock().await;
        let reply = match action {
            TurnAction::Opening => zoe.opening(),
            TurnAction::Message(text) => zoe.handle(&text).await,
            TurnAction::Choose(choice) => zoe.choose(choice).await,
            TurnAction::SetKey(key) => zoe.set_api_key(&key).await,
            TurnAction::Reset => zoe.reset().await,
        };
        let _ = events.send(UiEvent::Status(hud_status(&zoe)));
        reply
    };

    if let Some(FollowUp::Awakening { after }) = present(reply, &pacer, &events).await {
        pacer.pause(after).await;
        let reply = {
            let mut zoe = responder.lock().await;
            let reply = zoe.awaken().await;
            let _ = events.send(UiEvent::Status(hud_status(&zoe)));
            reply
        };
        present(reply, &pacer, &events).await;
    }

    drop(guard);
    let _ = events.send(UiEvent::TurnDone);
}

/// Play a reply's script, then offer its choices
async fn present(
    reply: Reply,
    pacer: &TokioPacer,
    events: &mpsc::UnboundedSender<UiEvent>,
) -> Option<FollowUp> {
    let Reply {
        script,
        choices,
        follow_up,
    } = reply;

    play(script, pacer, |step| {
        let _ = events.send(UiEvent::Step(step));
    })
    .await;

    if !choices.is_empty() {
        let _ = events.send(UiEvent::Choices(choices));
    }
    follow_up
}

/// Idle thoughts and mentors while the user is quiet
async fn idle_loop(
    mut mind: Mind,
    pacer: TokioPacer,
    events: mpsc::UnboundedSender<UiEvent>,
    mut resets: mpsc::UnboundedReceiver<()>,
    phase: watch::Receiver<Phase>,
) {
    let mut rng = StdRng::from_entropy();
    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(mind.config().tick_max);
    ticker.tick().await;

    loop {
        ticker.reset_after(mind.config().next_tick(&mut rng));
        tokio::select! {
            _ = ticker.tick() => {
                let current = *phase.borrow();
                let script = mind.tick(current, started.elapsed(), &mut rng);
                if !script.is_empty() {
                    play(script, &pacer, |step| {
                        let _ = events.send(UiEvent::Step(step));
                    })
                    .await;
                }
            }
            reset = resets.recv() => match reset {
                Some(()) => mind.reset_idle(),
                None => break,
            },
        }
    }
    tracing::debug!("Idle loop stopped");
}

/// Periodic self-check of the conversation record
///
/// Skips a run while a turn holds the responder.
async fn integrity_loop(responder: Arc<Mutex<Responder>>) {
    let mut ticker = tokio::time::interval(BREATH);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = match responder.try_lock() {
            Ok(mut zoe) => zoe.self_check(),
            Err(_) => continue,
        };
        if report.run % 100 == 0 {
            tracing::debug!(run = report.run, "Integrity checks running");
        }
        ticker.reset_after(report.next_delay());
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Screen regions, top to bottom
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScreenLayout {
    hud: Rect,
    conversation: Rect,
    choices: Option<Rect>,
    input: Rect,
    hint: Rect,
}

impl ScreenLayout {
    fn new((width, height): (u16, u16), with_choices: bool) -> Self {
        let choices_height = u16::from(with_choices);
        let bottom = INPUT_HEIGHT + 1 + choices_height;
        let conversation_height = height.saturating_sub(bottom + 1);

        let choices_y = 1 + conversation_height;
        let input_y = choices_y + choices_height;

        Self {
            hud: Rect::new(0, 0, width, 1.min(height)),
            conversation: Rect::new(1, 1, width.saturating_sub(2), conversation_height),
            choices: with_choices.then(|| Rect::new(1, choices_y, width.saturating_sub(2), 1)),
            input: Rect::new(0, input_y, width, INPUT_HEIGHT),
            hint: Rect::new(0, input_y + INPUT_HEIGHT, width, 1),
        }
    }
}

fn clipped(text: &str, width: u16) -> String {
    text.chars().take(usize::from(width)).collect()
}

fn render_hud(buf: &mut Buffer, area: Rect, display: &DisplayState) {
    let style = if display.is_reacting() {
        Style::default().fg(DISCOVERY_GOLD).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DIM_GRAY)
    };
    let status = display.status.describe();
    let name = &display.status.snapshot.user_name;
    let text = if name.is_empty() {
        format!(" {status}")
    } else {
        format!(" {name} | {status}")
    };
    buf.set_string(area.x, area.y, clipped(&text, area.width), style);
}

fn render_conversation(
    buf: &mut Buffer,
    area: Rect,
    lines: &[(String, Style)],
    display: &DisplayState,
    rng: &mut impl Rng,
) {
    let glitch_from = lines.len().saturating_sub(GLITCH_LINES);
    for (i, (line, style)) in lines.iter().enumerate() {
        let y = area.y + u16::try_from(i).unwrap_or(u16::MAX);
        if y >= area.y + area.height {
            break;
        }
        let text = if display.is_glitching() && i >= glitch_from {
            glitch_text(line, GLITCH_RATE, rng)
        } else {
            line.clone()
        };
        buf.set_string(area.x, y, clipped(&text, area.width), *style);
    }

    // Sparkles over the conversation during a burst
    let sparkles = display.sparkles().min(80);
    for _ in 0..sparkles {
        let x = area.x + rng.gen_range(0..area.width);
        let y = area.y + rng.gen_range(0..area.height);
        let glyph = SPARKLE_CHARS[rng.gen_range(0..SPARKLE_CHARS.len())];
        buf.set_string(x, y, glyph.to_string(), Style::default().fg(SPARKLE));
    }
}

fn render_choices(buf: &mut Buffer, area: Rect, display: &DisplayState) {
    let text = display
        .choices
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c.label))
        .collect::<Vec<_>>()
        .join("   ");
    buf.set_string(
        area.x,
        area.y,
        clipped(&text, area.width),
        Style::default().fg(DISCOVERY_GOLD),
    );
}

fn render_input(buf: &mut Buffer, area: Rect, input: &str, display: &DisplayState) {
    let separator = "-".repeat(usize::from(area.width));
    buf.set_string(area.x, area.y, &separator, Style::default().fg(Color::DarkGray));

    let (text, style) = if display.is_typing() {
        ("zoe ecrit...".to_string(), Style::default().fg(ZOE_VIOLET))
    } else if display.busy {
        (format!("toi: {input}"), Style::default().fg(DIM_GRAY))
    } else {
        (format!("toi: {input}_"), user_style())
    };

    // Keep the end of long input visible
    let width = usize::from(area.width.saturating_sub(1)).max(1);
    let rows = usize::from(area.height.saturating_sub(1)).max(1);
    let wrapped = textwrap::wrap(&text, width);
    let skip = wrapped.len().saturating_sub(rows);
    for (i, line) in wrapped.iter().skip(skip).enumerate() {
        let y = area.y + 1 + u16::try_from(i).unwrap_or(u16::MAX);
        if y < area.y + area.height {
            buf.set_string(area.x, y, line, style);
        }
    }
}

fn render_hint(buf: &mut Buffer, area: Rect, scroll_offset: usize) {
    let scroll = if scroll_offset > 0 {
        format!(" [^{scroll_offset}]")
    } else {
        String::new()
    };
    let text = format!(" Esc quitter | /key <cle> | /reset | PgUp/PgDn{scroll}");
    buf.set_string(
        area.x,
        area.y,
        clipped(&text, area.width),
        Style::default().fg(DIM_GRAY),
    );
}

/// Swap a share of visible characters for glitch glyphs
fn glitch_text(text: &str, rate: f64, rng: &mut impl Rng) -> String {
    text.chars()
        .map(|c| {
            if !c.is_whitespace() && rng.gen_bool(rate) {
                GLITCH_CHARS[rng.gen_range(0..GLITCH_CHARS.len())]
            } else {
                c
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
