//! Workspace-wide rules, checked against the production sources

use architectural_enforcement::{production_sources, violations, workspace_root};

/// Files allowed to wait on the tokio timer
const TIMER_ALLOWED: &[&str] = &[
    // Retry backoff between attempts
    "companion/core/src/client.rs",
    // Conversational pacing: typing delays between lines
    "tui/src/pacer.rs",
];

/// Files allowed to touch the filesystem synchronously
const BLOCKING_IO_ALLOWED: &[&str] = &[
    // Config is loaded before the runtime starts
    "companion/core/src/config/mod.rs",
    // Log file setup, before the runtime starts
    "tui/src/main.rs",
];

fn report(rule: &str, hits: &[String]) {
    assert!(
        hits.is_empty(),
        "{rule} ({} violation(s)):\n  {}",
        hits.len(),
        hits.join("\n  ")
    );
}

#[test]
fn sources_are_found() {
    let files = production_sources();
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"companion/core/src/responder.rs"), "{paths:?}");
    assert!(paths.contains(&"tui/src/app.rs"), "{paths:?}");
}

#[test]
fn no_thread_sleep() {
    let files = production_sources();
    report(
        "thread sleeps block the runtime",
        &violations(&files, &["thread::sleep", "std::thread::sleep"], &[]),
    );
}

#[test]
fn timer_sleeps_only_for_pacing_and_backoff() {
    let files = production_sources();
    report(
        "tokio sleeps outside pacing/backoff",
        &violations(&files, &["time::sleep(", "sleep_until("], TIMER_ALLOWED),
    );
}

#[test]
fn no_blocking_file_io() {
    let files = production_sources();
    let needles = [
        "std::fs::read",
        "std::fs::write",
        "std::fs::create_dir",
        "std::fs::remove",
        "std::fs::File",
        "std::fs::OpenOptions",
    ];
    report(
        "blocking file I/O (use tokio::fs)",
        &violations(&files, &needles, BLOCKING_IO_ALLOWED),
    );
}

#[test]
fn no_unwrap_in_production() {
    let files = production_sources();
    report(
        "unwrap/expect in production code",
        &violations(&files, &[".unwrap()", ".expect("], &[]),
    );
}

#[test]
fn core_has_no_terminal_dependencies() {
    let manifest = std::fs::read_to_string(workspace_root().join("companion/core/Cargo.toml"))
        .expect("core manifest");
    for krate in ["ratatui", "crossterm"] {
        assert!(
            !manifest.contains(krate),
            "zoe-core must stay headless but depends on {krate}"
        );
    }

    let files = production_sources();
    let core: Vec<_> = files
        .into_iter()
        .filter(|f| f.path.starts_with("companion/core/"))
        .collect();
    report(
        "terminal crates used in zoe-core",
        &violations(&core, &["ratatui::", "crossterm::"], &[]),
    );
}

#[test]
fn tui_does_not_drive_state_directly() {
    let files = production_sources();
    let tui: Vec<_> = files
        .into_iter()
        .filter(|f| f.path.starts_with("tui/"))
        .collect();
    report(
        "TUI bypasses the responder",
        &violations(
            &tui,
            &["ConversationState", ".transition(", "CompletionClient"],
            &[],
        ),
    );
}

#[test]
fn release_profile_keeps_unwinding() {
    let root = std::fs::read_to_string(workspace_root().join("Cargo.toml")).expect("root manifest");
    assert!(root.contains("[profile.release]"), "release profile belongs at the root");

    for member in ["companion/core", "tui", "tests/architectural-enforcement"] {
        let manifest = std::fs::read_to_string(workspace_root().join(member).join("Cargo.toml"))
            .expect("member manifest");
        assert!(
            !manifest.contains("[profile"),
            "{member}: profiles are ignored outside the workspace root"
        );
    }

    // TurnGuard relies on unwinding to reopen the input gate
    let panic_setting = root
        .lines()
        .filter_map(|line| line.split('#').next())
        .any(|line| line.replace(' ', "").starts_with("panic="));
    assert!(!panic_setting, "root manifest overrides panic strategy");
}
