use std::time::Duration;

use bigbrotr_model::Relay;

/// The shared MPMC work queue of relays, consumed by every worker across every thread (and, in
/// the process-per-OS-process mapping the distilled spec describes, across every process).
///
/// Rust collapses the process level into OS threads (§9 design note: "a target language that
/// lacks the process level ... may collapse processes into worker pools as long as per-worker DB
/// pools and the shared MPMC queue are preserved"), so a single `RelayQueue` is cloned into every
/// worker thread spawned by the [`crate::scheduler::FanoutScheduler`].
#[derive(Clone)]
pub struct RelayQueue {
    sender: crossbeam_channel::Sender<Relay>,
    receiver: crossbeam_channel::Receiver<Relay>,
}

impl RelayQueue {
    /// Build a queue pre-loaded with `relays`; no more are ever pushed after construction,
    /// matching the one-shot `shared_queue.put(relay)` seeding in the original scheduler.
    pub fn seeded(relays: impl IntoIterator<Item = Relay>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        for relay in relays {
            // An unbounded sender to a receiver we hold ourselves never disconnects or blocks.
            let _ = sender.send(relay);
        }
        Self { sender, receiver }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Pop one relay, blocking the calling OS thread for up to `timeout`. `None` means the
    /// queue was empty for the whole timeout window — the caller's worker loop should treat
    /// that as "nothing left to do" and terminate, mirroring `shared_queue.get(timeout=1)` /
    /// `except Empty: break` in the original `BaseSynchronizerWorker.run`.
    pub fn pop_blocking(&self, timeout: Duration) -> Option<Relay> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_every_seeded_relay_exactly_once() {
        let relays = vec![
            Relay::new("wss://a").unwrap(),
            Relay::new("wss://b").unwrap(),
            Relay::new("wss://c").unwrap(),
        ];
        let queue = RelayQueue::seeded(relays.clone());
        let mut popped = Vec::new();
        while let Some(relay) = queue.pop_blocking(Duration::from_millis(10)) {
            popped.push(relay);
        }
        popped.sort_by(|a, b| a.url.cmp(&b.url));
        let mut expected = relays;
        expected.sort_by(|a, b| a.url.cmp(&b.url));
        assert_eq!(popped, expected);
    }

    #[test]
    fn pop_blocking_returns_none_once_drained() {
        let queue = RelayQueue::seeded(vec![Relay::new("wss://a").unwrap()]);
        assert!(queue.pop_blocking(Duration::from_millis(10)).is_some());
        assert!(queue.pop_blocking(Duration::from_millis(10)).is_none());
    }
}
