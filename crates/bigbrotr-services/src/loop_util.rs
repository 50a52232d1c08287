use std::time::Duration;

use bigbrotr_fabric::ShutdownFlag;

/// Sleep for `duration`, waking early if `shutdown` is requested. Returns `true` if it woke
/// because of shutdown, `false` if the full duration elapsed — mirrors `BaseService.wait`'s
/// `asyncio.wait_for(self._shutdown_event.wait(), timeout=interval)` pattern, adapted to a
/// plain polled [`ShutdownFlag`] instead of an async event (the flag is also read from worker
/// OS threads in the fan-out fabric, so it cannot be a tokio-only primitive).
pub async fn interruptible_sleep(duration: Duration, shutdown: &ShutdownFlag) -> bool {
    const POLL_STEP: Duration = Duration::from_millis(200);
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if shutdown.is_requested() {
            return true;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep((deadline - now).min(POLL_STEP)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_the_full_duration_when_never_interrupted() {
        let shutdown = ShutdownFlag::new();
        let woke_early = interruptible_sleep(Duration::from_secs(2), &shutdown).await;
        assert!(!woke_early);
    }

    #[tokio::test(start_paused = true)]
    async fn wakes_early_once_shutdown_is_requested() {
        let shutdown = ShutdownFlag::new();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            shutdown_clone.request();
        });
        let woke_early = interruptible_sleep(Duration::from_secs(10), &shutdown).await;
        handle.await.unwrap();
        assert!(woke_early);
    }
}
