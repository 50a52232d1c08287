use std::time::Duration;

use bigbrotr_model::Filter;
use bigbrotr_store::Store;

use crate::error::EngineError;
use crate::transport::RelayConnection;

/// Tunables for [`crawl_relay`], pinned from `src/constants.py` and `process_relay.py` in the
/// original implementation.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Assumed per-request cap when the bracketing probe can't observe a real one (the relay
    /// never truncated the probe window), before the safety margin is subtracted.
    pub default_limit_fallback: u32,
    /// Upper bound on a single `REQ`'s `limit`, after the safety margin.
    pub max_limit_ceiling: u32,
    /// Smallest `(since, until)` window the bisection will still try to split further.
    pub min_range: i64,
    /// Deepest the pending-bound stack is allowed to grow before the overflow fallback kicks in.
    pub stack_max_size: usize,
    /// Wall-clock budget for a single `REQ`/`EOSE` round trip.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit_fallback: 500,
            max_limit_ceiling: 2000,
            min_range: 1,
            stack_max_size: 1000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlStats {
    pub events_inserted: u64,
    pub requests_sent: u64,
    pub stack_overflow_drops: u64,
}

/// Resume watermark for `relay_url`: one past the latest event `created_at` recorded for it, or
/// `filter.since` (default 0) if nothing has been seen yet. Mirrors `get_start_time` in the
/// original implementation.
pub async fn resume_since(
    store: &dyn Store,
    relay_url: &str,
    filter: &Filter,
) -> Result<i64, EngineError> {
    let recorded = store.max_seen_at(relay_url).await?;
    let floor = filter.since.unwrap_or(0);
    Ok(match recorded {
        Some(last) => (last + 1).max(floor),
        None => floor,
    })
}

/// Estimate the relay's per-request result cap by bracketing `[since, until]` with two
/// unbounded (no client-side `limit`) `REQ`s, mirroring `process_relay.py::get_max_limit`:
///
/// the first `REQ` counts how many events the relay is willing to hand back for the whole
/// window and records the oldest `created_at` among them; the second `REQ` re-asks the window
/// ending just before that oldest event (`until = min(min_created_at, until) - 1`). If that
/// second, strictly-older window still has events, the first window's count was a truncation
/// cap rather than the true total, so it is returned as the estimate. If the first window had
/// no events at all, or the second window is empty (nothing was truncated), there is no
/// observable cap and the caller falls back to `default_limit_fallback`.
///
/// The safety margin (subtract 50 if the estimate is at least 100, else 5, floored at 1) and the
/// `[1, max_limit_ceiling]` clamp are applied by the caller, as in the original.
async fn estimate_max_limit(
    connection: &mut dyn RelayConnection,
    base_filter: &Filter,
    since: i64,
    until: i64,
    config: &EngineConfig,
) -> Result<Option<u32>, EngineError> {
    let first_window = base_filter.narrowed_to(since, until);
    let first_events = connection.fetch(&first_window, config.request_timeout).await?;
    let first_count = first_events.len() as u32;

    let Some(min_created_at) = first_events.iter().map(|e| e.created_at).min() else {
        return Ok(None);
    };

    let narrowed_until = min_created_at.min(until).saturating_sub(1).max(0);
    let second_window = base_filter.narrowed_to(since, narrowed_until);
    let second_count = connection
        .fetch(&second_window, config.request_timeout)
        .await?
        .len();

    Ok(if second_count > 0 { Some(first_count) } else { None })
}

/// Drain a relay of every event matching `base_filter` between its resume watermark and
/// `base_filter.until` (or `now` if absent), adaptively bisecting the time range whenever a
/// request returns exactly `max_limit` results (a sign the relay silently truncated).
///
/// This is the authoritative crawl algorithm, pinned from `process_relay.py::process_relay`:
/// a stack of pending `until` bounds seeded with the top of the range, a `since` watermark that
/// only ever advances forward as ranges fully drain, and a bisection step that pushes the
/// midpoint of the current `(since, until)` window onto the stack whenever the window's result
/// count hits the cap. If the stack grows past `stack_max_size`, the oldest (smallest, most
/// stalled) pending bound is dropped rather than retried forever — this sacrifices completeness
/// for a pathological relay instead of crawling it indefinitely.
pub async fn crawl_relay(
    connection: &mut dyn RelayConnection,
    store: &dyn Store,
    relay_url: &str,
    base_filter: &Filter,
    now: i64,
    config: &EngineConfig,
) -> Result<CrawlStats, EngineError> {
    let mut since = resume_since(store, relay_url, base_filter).await?;
    let until_top = base_filter.until.unwrap_or(now);
    if until_top <= since {
        return Ok(CrawlStats::default());
    }

    let observed_limit = estimate_max_limit(connection, base_filter, since, until_top, config).await?;
    let bracketed = observed_limit
        .unwrap_or(config.default_limit_fallback)
        .min(config.max_limit_ceiling);
    let margin = if bracketed >= 100 { 50 } else { 5 };
    let max_limit = bracketed.saturating_sub(margin).max(1);

    let mut stack = vec![until_top];
    let mut stats = CrawlStats::default();

    while let Some(&top) = stack.last() {
        if top <= since {
            stack.pop();
            continue;
        }

        if stack.len() > config.stack_max_size {
            tracing::warn!(relay_url, stack_len = stack.len(), "bisection stack overflowed, dropping oldest bound");
            stack.remove(0);
            stats.stack_overflow_drops += 1;
            continue;
        }

        let filter = base_filter.narrowed_to(since, top).with_limit(max_limit);
        let events = connection.fetch(&filter, config.request_timeout).await?;
        stats.requests_sent += 1;

        let hit_cap = events.len() as u32 >= max_limit;
        let can_bisect = top - since > config.min_range;

        if hit_cap && can_bisect {
            let midpoint = since + (top - since) / 2;
            stack.push(midpoint);
            continue;
        }

        for event in &events {
            match store.insert_event(event, relay_url, now).await {
                Ok(_) => stats.events_inserted += 1,
                Err(err) => tracing::warn!(relay_url, error = %err, "failed to store event"),
            }
        }
        since = top;
        stack.pop();
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bigbrotr_model::{build_and_sign, Keys};
    use bigbrotr_store::InMemoryStore;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// In-process mock relay: returns events from a fixed pool matching a filter's `since`/
    /// `until`/`limit`, newest-first, truncated exactly the way a real relay would.
    struct MockRelay {
        events: Vec<bigbrotr_model::Event>,
        requests: Arc<Mutex<Vec<Filter>>>,
    }

    #[async_trait]
    impl RelayConnection for MockRelay {
        async fn fetch(&mut self, filter: &Filter, _timeout: Duration) -> Result<Vec<bigbrotr_model::Event>, EngineError> {
            self.requests.lock().await.push(filter.clone());
            let since = filter.since.unwrap_or(i64::MIN);
            let until = filter.until.unwrap_or(i64::MAX);
            let limit = filter.limit.unwrap_or(u32::MAX) as usize;
            let mut matching: Vec<_> = self
                .events
                .iter()
                .filter(|e| e.created_at >= since && e.created_at < until)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            matching.truncate(limit);
            Ok(matching)
        }
    }

    fn event_at(keys: &Keys, created_at: i64) -> bigbrotr_model::Event {
        build_and_sign(keys, created_at, 1, vec![], "e", 0, 1).unwrap()
    }

    #[tokio::test]
    async fn drains_a_relay_with_fewer_events_than_the_cap() {
        let keys = Keys::generate();
        let events: Vec<_> = (0..10).map(|i| event_at(&keys, 1000 + i)).collect();
        let mut relay = MockRelay {
            events,
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let store = InMemoryStore::new();
        let filter = Filter::new();
        let config = EngineConfig::default();

        let stats = crawl_relay(&mut relay, &store, "wss://relay", &filter, 2000, &config)
            .await
            .unwrap();

        assert_eq!(stats.events_inserted, 10);
        assert_eq!(store.max_seen_at("wss://relay").await.unwrap(), Some(1009));
    }

    #[tokio::test]
    async fn bisects_when_a_window_hits_the_cap() {
        let keys = Keys::generate();
        let events: Vec<_> = (0..500).map(|i| event_at(&keys, 1000 + i)).collect();
        let mut relay = MockRelay {
            events,
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let store = InMemoryStore::new();
        let filter = Filter::new();
        let config = EngineConfig {
            default_limit_fallback: 100,
            max_limit_ceiling: 100,
            min_range: 1,
            stack_max_size: 1000,
            request_timeout: Duration::from_secs(5),
        };

        let stats = crawl_relay(&mut relay, &store, "wss://relay", &filter, 2000, &config)
            .await
            .unwrap();

        assert_eq!(stats.events_inserted, 500);
        assert!(stats.requests_sent > 5);
    }

    #[tokio::test]
    async fn resumes_from_the_stored_watermark() {
        let keys = Keys::generate();
        let event = event_at(&keys, 1500);
        let store = InMemoryStore::new();
        store.insert_event(&event, "wss://relay", 1500).await.unwrap();

        let filter = Filter::new();
        let since = resume_since(&store, "wss://relay", &filter).await.unwrap();
        assert_eq!(since, 1501);
    }
}
