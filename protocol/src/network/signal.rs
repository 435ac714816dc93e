//! # Round Signals
//!
//! A [`RoundSignal`] lets observers wait for "the next time X happens"
//! (the next completed distribute, the next receipt) without polling the
//! swarm's timestamps.
//!
//! Internally it is a `tokio::sync::watch` channel carrying a generation
//! counter. Every firing bumps the counter; every waiter subscribed before
//! the bump wakes up. Any number of tasks may wait concurrently.
//!
//! Signals are a wake-up mechanism only. A waiter that subscribes just
//! after a firing simply waits for the following one, so anything that must
//! be exact should re-check the swarm's timestamps after waking.

use tokio::sync::watch;

/// A reusable, multi-waiter "fired again" notification.
#[derive(Debug)]
pub struct RoundSignal {
    generation: watch::Sender<u64>,
}

impl RoundSignal {
    /// Creates a signal that has never fired.
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Wakes every current waiter and returns the new generation.
    pub fn fire(&self) -> u64 {
        let mut fired = 0;
        self.generation.send_modify(|generation| {
            *generation += 1;
            fired = *generation;
        });
        fired
    }

    /// How many times the signal has fired.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Waits for the next firing after this call and returns its generation.
    pub async fn wait(&self) -> u64 {
        let mut receiver = self.generation.subscribe();
        // The sender lives as long as `self`, so `changed` cannot fail here.
        let _ = receiver.changed().await;
        let generation = *receiver.borrow();
        generation
    }

    /// Waits until the signal has fired at least `generation` times.
    /// Returns immediately if it already has.
    pub async fn wait_for_generation(&self, generation: u64) -> u64 {
        let mut receiver = self.generation.subscribe();
        let reached = match receiver.wait_for(|current| *current >= generation).await {
            Ok(current) => *current,
            Err(_) => self.generation(),
        };
        reached
    }
}

impl Default for RoundSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_on_next_fire() {
        let signal = Arc::new(RoundSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait().await })
        };

        // Let the waiter subscribe before firing.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(signal.fire(), 1);
        let seen = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn every_waiter_observes_a_single_fire() {
        let signal = Arc::new(RoundSignal::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = Arc::clone(&signal);
                tokio::spawn(async move { signal.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.fire();

        for waiter in waiters {
            let seen = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("all waiters should wake")
                .unwrap();
            assert_eq!(seen, 1);
        }
    }

    #[tokio::test]
    async fn past_fires_do_not_satisfy_new_waiters() {
        let signal = RoundSignal::new();
        signal.fire();
        signal.fire();
        assert_eq!(signal.generation(), 2);

        let pending = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn wait_for_generation_returns_when_already_reached() {
        let signal = RoundSignal::new();
        signal.fire();
        let seen = tokio::time::timeout(Duration::from_millis(50), signal.wait_for_generation(1))
            .await
            .expect("already reached");
        assert_eq!(seen, 1);
    }
}
