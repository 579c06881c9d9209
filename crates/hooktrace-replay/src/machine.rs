//! The replay state machine.
//!
//! [`ReplayMachine`] holds only the log length, the selection cursor and the
//! replaying flag. It has no timer; the engine starts and cancels the timer
//! according to the transitions reported here.

use std::fmt;

/// State of the replay engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplayState {
    /// No selection, not replaying.
    Idle,
    /// Selection set, not replaying.
    Paused,
    /// Selection set, timer active, auto-advancing.
    Replaying,
}

impl ReplayState {
    /// Get the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayState::Idle => "idle",
            ReplayState::Paused => "paused",
            ReplayState::Replaying => "replaying",
        }
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards older entries.
    Backward,
    /// Towards newer entries.
    Forward,
}

/// How the machine reacted to a new log length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChange {
    /// Same length as before.
    Unchanged,
    /// The log grew while replaying; the running timer continues.
    Grew,
    /// The log grew while not replaying; the first new entry is selected and
    /// replay started.
    Followed,
    /// The log shrank; replay stopped and the selection was revalidated.
    Shrunk,
}

/// Selection cursor over an append-only log.
///
/// The selection is always `None` or a valid index into a log of `len`
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayMachine {
    len: usize,
    selected: Option<usize>,
    replaying: bool,
}

impl ReplayMachine {
    /// Create an idle machine over an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ReplayState {
        match (self.selected, self.replaying) {
            (None, _) => ReplayState::Idle,
            (Some(_), false) => ReplayState::Paused,
            (Some(_), true) => ReplayState::Replaying,
        }
    }

    /// Number of entries in the log.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Selected index.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Check if the timer should be running.
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    fn last(&self) -> Option<usize> {
        self.len.checked_sub(1)
    }

    fn is_at_last(&self) -> bool {
        self.selected.is_some() && self.selected == self.last()
    }

    /// Select an entry and pause. The index is clamped to the log.
    pub fn set_highlighted(&mut self, index: usize) {
        self.replaying = false;
        self.selected = self.last().map(|last| index.min(last));
    }

    /// Move the selection one entry and pause.
    ///
    /// No-op without a selection. The new index is clamped to the log.
    pub fn step(&mut self, direction: Direction) {
        self.replaying = false;
        self.move_selection(direction);
    }

    /// Step forward and start replaying.
    ///
    /// No-op without a selection or at the last entry. Returns true if the
    /// timer should start; landing on the last entry pauses instead.
    pub fn start_replay(&mut self) -> bool {
        self.replaying = false;
        if self.selected.is_none() || self.is_at_last() {
            return false;
        }
        self.move_selection(Direction::Forward);
        self.replaying = !self.is_at_last();
        self.replaying
    }

    /// Stop replaying.
    pub fn stop_replay(&mut self) {
        self.replaying = false;
    }

    /// Advance on a timer tick.
    ///
    /// Returns true if the timer should keep running; reaching the last
    /// entry pauses.
    pub fn tick(&mut self) -> bool {
        if !self.replaying {
            return false;
        }
        self.move_selection(Direction::Forward);
        if self.selected.is_none() || self.is_at_last() {
            self.replaying = false;
        }
        self.replaying
    }

    /// React to the log reaching a new length.
    pub fn log_changed(&mut self, len: usize) -> LogChange {
        let previous = self.len;
        self.len = len;

        if len < previous {
            self.replaying = false;
            self.selected = match (self.selected, self.last()) {
                (Some(index), Some(last)) => Some(index.min(last)),
                _ => None,
            };
            LogChange::Shrunk
        } else if len > previous {
            if self.replaying {
                return LogChange::Grew;
            }
            self.selected = Some(previous);
            self.replaying = true;
            LogChange::Followed
        } else {
            LogChange::Unchanged
        }
    }

    /// Drop the selection and the log.
    pub fn clear(&mut self) {
        self.len = 0;
        self.selected = None;
        self.replaying = false;
    }

    /// Whether a backward step would move.
    pub fn can_step_back(&self) -> bool {
        self.selected.is_some_and(|index| index > 0)
    }

    /// Whether a forward step would move.
    pub fn can_step_forward(&self) -> bool {
        self.selected.is_some() && !self.is_at_last()
    }

    /// Whether starting a replay is offered.
    pub fn can_start_replay(&self) -> bool {
        !self.replaying && self.len > 0 && !self.is_at_last()
    }

    /// Whether clearing the log is offered.
    pub fn can_clear(&self) -> bool {
        self.len > 0
    }

    fn move_selection(&mut self, direction: Direction) {
        let (Some(index), Some(last)) = (self.selected, self.last()) else {
            return;
        };
        let next = match direction {
            Direction::Backward => index.saturating_sub(1),
            Direction::Forward => index.saturating_add(1),
        };
        self.selected = Some(next.min(last));
    }
}
