//! Circuit breaker guarding the LLM client against a persistently
//! failing provider.
//!
//! Three states (`Closed`, `Open`, `HalfOpen`): after 5 consecutive
//! failures the breaker opens for 30 s; the next call after cooldown is
//! a half-open probe that closes the breaker on success or re-opens it
//! on failure.
//!
//! State is a process-local `std::sync::Mutex`-guarded word owned by
//! one `CircuitBreaker` instance, not a free global — every
//! `RetryingLlmClient` gets its own.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const FAILURE_THRESHOLD: u32 = 5;
const OPEN_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Whether a call may proceed, and what to do with the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Proceed normally.
    Closed,
    /// Proceed as the single half-open probe; the breaker is "borrowed"
    /// until the caller reports the outcome.
    HalfOpenProbe,
    /// Fail fast without attempting the call.
    Rejected,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Ask whether a call is allowed right now.
    pub fn permit(&self) -> Permit {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => Permit::Closed,
            State::HalfOpen => Permit::Rejected, // a probe is already in flight
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= OPEN_DURATION {
                    inner.state = State::HalfOpen;
                    Permit::HalfOpenProbe
                } else {
                    Permit::Rejected
                }
            }
        }
    }

    /// Record a successful call: resets the failure counter and closes
    /// the breaker regardless of prior state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Record a failed call: increments the counter and opens the
    /// breaker once the threshold is reached (or immediately, if the
    /// failure was the half-open probe).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;

        if inner.state == State::HalfOpen || inner.consecutive_failures >= FAILURE_THRESHOLD {
            inner.state = State::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.state == State::Open
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let breaker = CircuitBreaker::new();
        assert_eq!(breaker.permit(), Permit::Closed);
    }

    #[test]
    fn opens_after_five_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.record_failure();
            assert_eq!(breaker.permit(), Permit::Closed);
        }
        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(breaker.permit(), Permit::Rejected);
    }

    #[test]
    fn success_resets_counter() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
            assert_eq!(breaker.permit(), Permit::Closed);
        }
        assert!(!breaker.is_open());
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());

        // Simulate cooldown elapsed by forcing state via public API is not
        // possible without sleeping; this is covered at the client level
        // with a fake clock-free approach (attempt tests there instead).
        breaker.record_failure();
        assert!(breaker.is_open());
    }
}
