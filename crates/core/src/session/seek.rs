//! Arbitration between engine-reported and user-dragged positions.
//!
//! Two writers compete for "where are we": the engine, through periodic
//! position reports, and the user, through a seek control. While a drag is in
//! progress the drag value wins for display; engine reports only refresh the
//! duration. On commit the dragged value becomes the reported position until
//! the engine confirms (or corrects) it with its next report.

/// Position bookkeeping for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeekController {
    reported_position_ms: u64,
    reported_duration_ms: u64,
    desired_seek_position_ms: u64,
    drag_in_progress: bool,
}

impl SeekController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a previously captured position (suspend/resume).
    pub fn restored(position_ms: u64, duration_ms: u64) -> Self {
        Self {
            reported_position_ms: position_ms,
            reported_duration_ms: duration_ms,
            desired_seek_position_ms: position_ms,
            drag_in_progress: false,
        }
    }

    pub fn reported_position_ms(&self) -> u64 {
        self.reported_position_ms
    }

    pub fn reported_duration_ms(&self) -> u64 {
        self.reported_duration_ms
    }

    pub fn desired_seek_position_ms(&self) -> u64 {
        self.desired_seek_position_ms
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_in_progress
    }

    /// Position the UI should show.
    pub fn display_position_ms(&self) -> u64 {
        if self.drag_in_progress {
            self.desired_seek_position_ms
        } else {
            self.reported_position_ms
        }
    }

    /// Seeking only makes sense once the engine has reported a duration.
    pub fn is_seekable(&self) -> bool {
        self.reported_duration_ms != 0
    }

    fn clamp(&self, position_ms: u64) -> u64 {
        if self.reported_duration_ms == 0 {
            position_ms
        } else {
            position_ms.min(self.reported_duration_ms)
        }
    }

    /// Start a drag. Returns `false` if one was already in progress.
    pub fn begin_drag(&mut self) -> bool {
        if self.drag_in_progress {
            return false;
        }
        self.drag_in_progress = true;
        self.desired_seek_position_ms = self.reported_position_ms;
        true
    }

    /// Move the drag thumb. Returns the clamped position now displayed.
    pub fn drag_to(&mut self, position_ms: u64) -> u64 {
        self.desired_seek_position_ms = self.clamp(position_ms);
        self.desired_seek_position_ms
    }

    /// Finish the drag at `position_ms`. Returns the seek target.
    pub fn commit(&mut self, position_ms: u64) -> u64 {
        let target = self.clamp(position_ms);
        self.desired_seek_position_ms = target;
        self.reported_position_ms = target;
        self.drag_in_progress = false;
        target
    }

    /// Absorb an engine position report. Returns `true` if the displayed
    /// position may have changed.
    pub fn on_position(&mut self, position_ms: u64, duration_ms: u64) -> bool {
        self.reported_duration_ms = duration_ms;
        if self.drag_in_progress {
            return false;
        }
        self.reported_position_ms = position_ms;
        true
    }

    /// Forget everything; a new stream starts from zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_move_display_when_idle() {
        let mut seek = SeekController::new();
        assert!(seek.on_position(1_000, 60_000));
        assert_eq!(seek.display_position_ms(), 1_000);
        assert!(seek.is_seekable());
    }

    #[test]
    fn drag_freezes_display_but_tracks_duration() {
        let mut seek = SeekController::new();
        seek.on_position(5_000, 60_000);
        assert!(seek.begin_drag());
        seek.drag_to(20_000);

        for pos in [5_250, 5_500, 5_750] {
            assert!(!seek.on_position(pos, 61_000));
            assert_eq!(seek.display_position_ms(), 20_000);
        }
        assert_eq!(seek.reported_duration_ms(), 61_000);
        assert_eq!(seek.reported_position_ms(), 5_000);
    }

    #[test]
    fn begin_drag_starts_from_current_position() {
        let mut seek = SeekController::new();
        seek.on_position(7_000, 60_000);
        seek.begin_drag();
        assert_eq!(seek.display_position_ms(), 7_000);
        assert!(!seek.begin_drag());
    }

    #[test]
    fn commit_converges_on_next_report() {
        let mut seek = SeekController::new();
        seek.on_position(1_000, 60_000);
        seek.begin_drag();
        seek.drag_to(30_000);
        assert_eq!(seek.commit(30_000), 30_000);
        assert!(!seek.is_dragging());
        assert_eq!(seek.display_position_ms(), 30_000);

        seek.on_position(30_040, 60_000);
        assert_eq!(seek.display_position_ms(), 30_040);
    }

    #[test]
    fn drag_is_clamped_to_duration() {
        let mut seek = SeekController::new();
        seek.on_position(0, 10_000);
        seek.begin_drag();
        assert_eq!(seek.drag_to(50_000), 10_000);
        assert_eq!(seek.commit(50_000), 10_000);
    }

    #[test]
    fn live_stream_is_not_seekable_but_unclamped() {
        let mut seek = SeekController::new();
        seek.on_position(3_000, 0);
        assert!(!seek.is_seekable());
        assert_eq!(seek.commit(9_000), 9_000);
    }

    #[test]
    fn reset_clears_drag() {
        let mut seek = SeekController::restored(4_000, 8_000);
        seek.begin_drag();
        seek.reset();
        assert_eq!(seek, SeekController::new());
    }
}
