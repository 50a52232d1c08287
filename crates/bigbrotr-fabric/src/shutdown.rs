use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide shutdown flag, set once by a signal handler (SIGINT/SIGTERM, wired by the
/// binary crate) and observed by every worker between queue reads and at cooperative yield
/// points, per §5's cancellation model. This is the one piece of global mutable state the
/// distilled spec's design notes call out besides the rate limiter's bucket map.
#[derive(Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear_and_latches_once_requested() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_requested());
        flag.request();
        assert!(flag.is_requested());
    }

    #[test]
    fn clones_share_the_same_underlying_flag() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        clone.request();
        assert!(flag.is_requested());
    }
}
