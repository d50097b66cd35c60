use std::fmt::{Display, Formatter};

/// Number of steps assumed when a run does not say otherwise.
pub const DEFAULT_TOTAL_STEPS: u32 = 15;

/// Display counter for the step of a multi-step run.
///
/// The counter is not bounded by `total`; `[17/15]` is a valid display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCounter {
    current: u32,
    total: u32,
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_STEPS)
    }
}

impl StepCounter {
    pub fn new(total: u32) -> Self {
        Self { current: 0, total }
    }

    /// A counter that never prefixes messages.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn reset(&mut self, total: u32) {
        self.current = 0;
        self.total = total;
    }

    pub fn increment(&mut self) {
        self.current = self.current.saturating_add(1);
    }

    /// Moves the counter forward to `current`; never moves it back.
    pub fn advance_to(&mut self, current: u32) {
        self.current = self.current.max(current);
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_enabled(&self) -> bool {
        self.total > 0
    }

    /// `[current/total]`, or `[current]` when no total is known.
    pub fn progress(&self) -> String {
        self.to_string()
    }
}

impl Display for StepCounter {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.total > 0 {
            write!(formatter, "[{}/{}]", self.current, self.total)
        } else {
            write!(formatter, "[{}]", self.current)
        }
    }
}
