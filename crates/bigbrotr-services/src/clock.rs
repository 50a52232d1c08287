use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now", the `Clock` seam named in §1. Every timestamp a service loop stamps onto a
/// row (`inserted_at`, `generated_at`, `seen_at`, service state's `updated_at`) goes through
/// this trait instead of calling `SystemTime::now()` inline, so tests can pin time without
/// sleeping.
pub trait Clock: Send + Sync {
    /// Current unix time in whole seconds.
    fn now_unix(&self) -> i64;
}

/// Production `Clock`, reading the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Deterministic, externally advanceable `Clock` for tests.
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_by_the_requested_amount() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now_unix(), 1_000);
        clock.advance(60);
        assert_eq!(clock.now_unix(), 1_060);
    }
}
