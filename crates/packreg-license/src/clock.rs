//! Time source for issuance and verification.

use std::sync::Arc;

use packreg_core::Timestamp;
use parking_lot::Mutex;

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A settable clock for tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<Timestamp>>,
}

impl MockClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock();
        *now = now.plus_secs(secs);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances_shared_state() {
        let start = Timestamp::parse("2026-03-01T00:00:00Z").unwrap();
        let clock = MockClock::new(start);
        let handle = clock.clone();
        handle.advance_secs(90);
        assert_eq!(clock.now().to_iso8601(), "2026-03-01T00:01:30Z");
    }
}
