//! Cooperative time limit for long running passes

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// A point in time after which work on a mesh should stop.
///
/// Passes poll [`Deadline::check`] at safe points; nothing is interrupted
/// preemptively. The default deadline never expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires
    pub fn none() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// `after(timeout)` when a timeout is given, otherwise never
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map(Self::after).unwrap_or_default()
    }

    pub fn is_set(&self) -> bool {
        self.at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, `None` when no deadline is set
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`Error::Timeout`] once the deadline has passed.
    pub fn check(&self, context: &str) -> Result<()> {
        if self.is_expired() {
            return Err(Error::Timeout(format!("deadline passed during {}", context)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_expires() {
        let deadline = Deadline::none();
        assert!(!deadline.is_set());
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.check("test").is_ok());
    }

    #[test]
    fn test_past_deadline_fails() {
        let deadline = Deadline::at(Instant::now());
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
        assert!(matches!(deadline.check("welding"), Err(Error::Timeout(_))));
    }

    #[test]
    fn test_generous_deadline() {
        let deadline = Deadline::from_timeout(Some(Duration::from_secs(3600)));
        assert!(deadline.is_set());
        assert!(!deadline.is_expired());
        assert!(deadline.check("smoothing").is_ok());
    }
}
