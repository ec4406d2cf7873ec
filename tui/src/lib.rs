//! Zoe TUI - Terminal surface for Zoe
//!
//! A full-screen terminal client around [`zoe_core::Responder`]. It plays
//! reply scripts with their pacing, keeps input closed while a turn runs,
//! offers awakening choices and lets the idle mind think out loud.
//!
//! # Architecture
//!
//! - **App**: event loop, turn tasks, idle loop, rendering
//! - **Display**: lines and effect timers derived from [`display::UiEvent`]s
//! - **Pacer**: real-time script playback with a speed multiplier
//! - **Theme**: colors per line kind

pub mod app;
pub mod display;
pub mod pacer;
pub mod theme;

pub use app::{build_responder, App, Command};
pub use pacer::TokioPacer;
