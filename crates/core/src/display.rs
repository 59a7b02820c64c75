//! Display-ready projections of session state.
//!
//! The coordinator never renders anything. It hands observers plain values:
//! a title line, a time label and the numbers behind the seek control.

use crate::session::PlaybackSession;

/// What a player's widgets should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub slot: usize,
    pub active: bool,
    /// `<engine state> <protocol> <name>`, suffixed with ` *` when active.
    pub title: String,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// `HH:MM:SS / HH:MM:SS`.
    pub time_text: String,
    pub seekable: bool,
    pub desired_playing: bool,
}

impl SessionView {
    pub fn of(session: &PlaybackSession, active: bool) -> Self {
        let seek = session.seek();
        let position_ms = seek.display_position_ms();
        let duration_ms = seek.reported_duration_ms();
        Self {
            slot: session.id(),
            active,
            title: title(session, active),
            position_ms,
            duration_ms,
            time_text: time_text(position_ms, duration_ms),
            seekable: seek.is_seekable(),
            desired_playing: session.desired_playing(),
        }
    }
}

/// Title line for one player.
pub fn title(session: &PlaybackSession, active: bool) -> String {
    let name = session.display_name();
    let parts: [&str; 3] = [
        session.engine_state(),
        session.config().protocol_label(),
        &name,
    ];
    let mut title = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if active {
        title.push_str(" *");
    }
    title
}

/// Format milliseconds as `HH:MM:SS`. Hours wrap at 24, like a UTC clock.
pub fn clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

pub fn time_text(position_ms: u64, duration_ms: u64) -> String {
    format!("{} / {}", clock(position_ms), clock(duration_ms))
}

/// Advisory notification text, labelled with the player number.
pub fn error_text(slot: usize, message: &str) -> String {
    format!("Player {slot}:{message}")
}
