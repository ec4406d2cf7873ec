//! Theme and Colors
//!
//! Zoe's palette. Each kind of line gets its own color so fragments,
//! thoughts and mentors read differently from plain replies.

use ratatui::style::{Color, Modifier, Style};

use zoe_core::LineKind;

// ============================================================================
// Line Colors
// ============================================================================

/// Zoe's own voice - soft violet
pub const ZOE_VIOLET: Color = Color::Rgb(200, 160, 255);

/// User input green
pub const USER_GREEN: Color = Color::Rgb(130, 220, 130);

/// Hidden fragments - pale cyan
pub const FRAGMENT_CYAN: Color = Color::Rgb(120, 220, 230);

/// Discoveries and level-ups - warm gold
pub const DISCOVERY_GOLD: Color = Color::Rgb(255, 210, 110);

/// Idle thoughts
pub const THOUGHT_GRAY: Color = Color::Rgb(140, 140, 160);

/// Mentor quotes - muted blue
pub const MENTOR_BLUE: Color = Color::Rgb(150, 180, 255);

/// Connection and key notices
pub const NOTICE_RED: Color = Color::Rgb(255, 110, 110);

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Sparkles during bursts
pub const SPARKLE: Color = Color::Rgb(255, 240, 200);

// ============================================================================
// Effects
// ============================================================================

/// Characters swapped in while a glitch is running
pub const GLITCH_CHARS: &[char] = &['#', '%', '&', '@', '$', '!', '?', '/', '\\', '|', '~', '*'];

/// Sparkle glyphs for bursts
pub const SPARKLE_CHARS: &[char] = &['*', '+', '.', 'o', '\''];

/// Prefix and style for a line of the given kind
#[must_use]
pub fn line_style(kind: LineKind) -> (&'static str, Style) {
    match kind {
        LineKind::Zoe => ("zoe: ", Style::default().fg(ZOE_VIOLET)),
        LineKind::Fragment => (
            "   ",
            Style::default().fg(FRAGMENT_CYAN).add_modifier(Modifier::ITALIC),
        ),
        LineKind::Discovery => (
            "~ ",
            Style::default().fg(DISCOVERY_GOLD).add_modifier(Modifier::BOLD),
        ),
        LineKind::Thought => (
            "(pensee) ",
            Style::default().fg(THOUGHT_GRAY).add_modifier(Modifier::ITALIC),
        ),
        LineKind::Mentor => ("> ", Style::default().fg(MENTOR_BLUE)),
        LineKind::Notice => ("! ", Style::default().fg(NOTICE_RED)),
    }
}

/// Style for the user's own lines
#[must_use]
pub fn user_style() -> Style {
    Style::default().fg(USER_GREEN)
}
