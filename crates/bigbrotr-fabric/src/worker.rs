use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bigbrotr_model::Relay;
use bigbrotr_ratelimiter::RelayRateLimiter;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::failure_tracker::FailureTracker;
use crate::queue::RelayQueue;
use crate::shutdown::ShutdownFlag;

/// One relay's unit of work: a probe cycle or an engine crawl, already bound to the thread's
/// own `Store` by the job factory that built it. `Err` carries a short human-readable reason
/// for the [`FailureTracker`] and the warning log — the fabric never needs the caller's
/// concrete error type.
pub type RelayJob = Arc<
    dyn Fn(Relay) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync,
>;

/// Tunables for one cooperative task loop, extracted from [`crate::scheduler::FabricConfig`]
/// so [`run_worker_thread`] does not need the whole config struct.
#[derive(Clone)]
pub struct WorkerTunables {
    pub tasks_per_thread: usize,
    pub relay_timeout: Duration,
    pub failure_window: usize,
    pub failure_threshold: f64,
}

/// Run one worker thread's event loop: a current-thread Tokio runtime hosting
/// `tasks_per_thread` cooperative task loops, each popping relays from the shared `queue` until
/// it is observed empty. Mirrors `BaseSynchronizerWorker.run`'s per-thread event loop and
/// `relay_processor_worker`'s multiple-threads-per-process spawn, collapsed one level (§9
/// design note: processes collapse into OS threads, each still owning its own `Store`).
///
/// This function itself spawns the OS thread and blocks the caller until it is joined — callers
/// run it inside `std::thread::spawn`.
pub fn run_worker_thread(
    queue: RelayQueue,
    shutdown: ShutdownFlag,
    job: RelayJob,
    rate_limiter: Arc<RelayRateLimiter>,
    tunables: WorkerTunables,
) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("building a current-thread tokio runtime never fails under normal resource limits");

    runtime.block_on(async move {
        let mut tasks = JoinSet::new();
        for _ in 0..tunables.tasks_per_thread.max(1) {
            let queue = queue.clone();
            let shutdown = shutdown.clone();
            let job = job.clone();
            let rate_limiter = rate_limiter.clone();
            let tracker = Arc::new(Mutex::new(FailureTracker::new(
                tunables.failure_window,
                tunables.failure_threshold,
            )));
            let relay_timeout = tunables.relay_timeout;
            tasks.spawn(async move {
                task_loop(queue, shutdown, job, rate_limiter, tracker, relay_timeout).await;
            });
        }
        while tasks.join_next().await.is_some() {}
    });
}

/// One cooperative task's loop: pop, rate-limit, run the job under a deadline, record the
/// outcome. Exits when the queue is observed empty or shutdown is requested, per §4.5 and §5.
async fn task_loop(
    queue: RelayQueue,
    shutdown: ShutdownFlag,
    job: RelayJob,
    rate_limiter: Arc<RelayRateLimiter>,
    tracker: Arc<Mutex<FailureTracker>>,
    relay_timeout: Duration,
) {
    loop {
        if shutdown.is_requested() {
            break;
        }

        // `crossbeam_channel::Receiver::recv_timeout` blocks the calling OS thread, so it runs
        // on tokio's blocking pool rather than inline in the cooperative loop.
        let popped = {
            let queue = queue.clone();
            tokio::task::spawn_blocking(move || queue.pop_blocking(Duration::from_secs(1))).await
        };
        let relay = match popped {
            Ok(Some(relay)) => relay,
            _ => break,
        };

        if shutdown.is_requested() {
            break;
        }

        rate_limiter.acquire(&relay.url).await;

        let outcome = tokio::time::timeout(relay_timeout, job(relay.clone())).await;
        let mut tracker = tracker.lock().await;
        match outcome {
            Ok(Ok(())) => tracker.record_success(),
            Ok(Err(reason)) => {
                tracker.record_failure();
                tracing::warn!(relay = %relay.url, reason, "relay job failed");
            }
            Err(_) => {
                tracker.record_failure();
                tracing::warn!(relay = %relay.url, timeout = ?relay_timeout, "relay job timed out");
            }
        }
        if tracker.should_alert() {
            tracing::warn!(
                relay = %relay.url,
                failure_rate = tracker.failure_rate(),
                "rolling relay failure rate crossed alert threshold"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn worker_thread_drains_the_queue_and_runs_every_job() {
        let relays = vec![
            Relay::new("wss://a").unwrap(),
            Relay::new("wss://b").unwrap(),
            Relay::new("wss://c").unwrap(),
        ];
        let queue = RelayQueue::seeded(relays);
        let shutdown = ShutdownFlag::new();
        let rate_limiter = Arc::new(RelayRateLimiter::new(100.0, 100.0));
        let processed = Arc::new(AtomicUsize::new(0));

        let job: RelayJob = {
            let processed = processed.clone();
            Arc::new(move |_relay: Relay| {
                let processed = processed.clone();
                Box::pin(async move {
                    processed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
        };

        run_worker_thread(
            queue,
            shutdown,
            job,
            rate_limiter,
            WorkerTunables {
                tasks_per_thread: 2,
                relay_timeout: Duration::from_secs(5),
                failure_window: 10,
                failure_threshold: 0.5,
            },
        );

        assert_eq!(processed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn shutdown_flag_stops_the_worker_before_the_queue_drains() {
        let relays: Vec<_> = (0..5)
            .map(|i| Relay::new(format!("wss://relay-{i}")).unwrap())
            .collect();
        let queue = RelayQueue::seeded(relays);
        let shutdown = ShutdownFlag::new();
        shutdown.request();
        let rate_limiter = Arc::new(RelayRateLimiter::new(100.0, 100.0));
        let processed = Arc::new(AtomicUsize::new(0));

        let job: RelayJob = {
            let processed = processed.clone();
            Arc::new(move |_relay: Relay| {
                let processed = processed.clone();
                Box::pin(async move {
                    processed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
        };

        run_worker_thread(
            queue,
            shutdown,
            job,
            rate_limiter,
            WorkerTunables {
                tasks_per_thread: 2,
                relay_timeout: Duration::from_secs(5),
                failure_window: 10,
                failure_threshold: 0.5,
            },
        );

        assert_eq!(processed.load(Ordering::SeqCst), 0);
    }
}
