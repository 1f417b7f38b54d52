use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BudgetError {
    #[error("words-per-minute must be positive, got {0}")]
    NonPositiveWpm(f64),
    #[error("typing duration must be positive, got {0} seconds")]
    NonPositiveSecs(f64),
}

/// Target pace and total duration for the typing stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypingBudget {
    wpm: f64,
    secs: f64,
}

impl TypingBudget {
    pub fn new(wpm: f64, secs: f64) -> Result<Self, BudgetError> {
        if wpm <= 0.0 || wpm.is_nan() {
            return Err(BudgetError::NonPositiveWpm(wpm));
        }
        if secs <= 0.0 || secs.is_nan() {
            return Err(BudgetError::NonPositiveSecs(secs));
        }
        Ok(Self { wpm, secs })
    }

    pub fn wpm(&self) -> f64 {
        self.wpm
    }

    pub fn secs(&self) -> f64 {
        self.secs
    }

    /// Pause after each successfully sent character.
    ///
    /// A "word" is approximated as 5 characters, so the target is
    /// `wpm * 5` characters per minute and the delay between characters is
    /// `60 / (5 * wpm)` seconds. The session duration cancels out of the
    /// ratio; it only bounds total elapsed time via [`Self::deadline`].
    pub fn char_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / (5.0 * self.wpm))
    }

    /// Absolute point in time at which the typing loop must stop.
    pub fn deadline(&self, start: Instant) -> Instant {
        start + Duration::from_secs_f64(self.secs)
    }
}
