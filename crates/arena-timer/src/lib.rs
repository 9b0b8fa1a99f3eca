//! Round timers for the arena server.
//!
//! A [`RoundTimers`] holds at most one live countdown per key (a room id in
//! practice). When a countdown elapses it does not call back into the room:
//! it queues an [`Expiry`] that the owner picks up from
//! [`RoundTimers::expired`] on the same task that handles player messages.
//! Timer firing is therefore just another event on the serialized path and
//! never runs concurrently with a handler.
//!
//! Every `start` stamps a fresh generation. An expiry is acted on only if
//! [`RoundTimers::claim`] confirms its generation is still the armed one, so
//! an expiry that was already queued when the timer got canceled or
//! restarted is recognized as stale and dropped.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* handle player messages */ }
//!         expiry = timers.expired() => {
//!             if timers.claim(&expiry) {
//!                 /* force-resolve the round */
//!             }
//!         }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A countdown that elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry<K> {
    pub key: K,
    pub generation: u64,
}

struct Armed {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Per-key cancelable countdowns with a single expiry queue.
pub struct RoundTimers<K> {
    duration: Duration,
    armed: HashMap<K, Armed>,
    next_generation: u64,
    tx: mpsc::UnboundedSender<Expiry<K>>,
    rx: mpsc::UnboundedReceiver<Expiry<K>>,
}

impl<K> RoundTimers<K>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    /// Creates an empty timer set whose countdowns last `duration`.
    pub fn new(duration: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            duration,
            armed: HashMap::new(),
            next_generation: 0,
            tx,
            rx,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Arms the countdown for `key`, replacing any live one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, key: K) -> u64 {
        self.cancel(&key);

        self.next_generation += 1;
        let generation = self.next_generation;
        let duration = self.duration;
        let deadline = tokio::time::Instant::now() + duration;
        let tx = self.tx.clone();
        let fired = Expiry {
            key: key.clone(),
            generation,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // The receiver lives as long as the timer set.
            let _ = tx.send(fired);
        });

        debug!(?key, generation, ?duration, "round timer armed");
        self.armed.insert(key, Armed { generation, handle });
        generation
    }

    /// Disarms the countdown for `key`.
    ///
    /// Idempotent: returns `false` when nothing was armed. Once this
    /// returns, no expiry from the disarmed countdown will be claimed.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.armed.remove(key) {
            Some(armed) => {
                armed.handle.abort();
                trace!(
                    ?key,
                    generation = armed.generation,
                    "round timer canceled"
                );
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a countdown is armed for `key`.
    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    /// Number of armed countdowns.
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Waits for the next queued expiry, current or stale.
    ///
    /// Pends forever while nothing is queued, so it is safe to sit in a
    /// `tokio::select!` branch.
    pub async fn expired(&mut self) -> Expiry<K> {
        match self.rx.recv().await {
            Some(expiry) => expiry,
            // Unreachable while `self.tx` is alive.
            None => std::future::pending().await,
        }
    }

    /// Consumes the armed entry if `expiry` belongs to it.
    ///
    /// Returns `false` for stale expiries: the countdown was canceled, or
    /// restarted under a newer generation, after this one was queued.
    pub fn claim(&mut self, expiry: &Expiry<K>) -> bool {
        let current = self
            .armed
            .get(&expiry.key)
            .is_some_and(|a| a.generation == expiry.generation);
        if current {
            self.armed.remove(&expiry.key);
        } else {
            debug!(
                key = ?expiry.key,
                generation = expiry.generation,
                "stale round timer ignored"
            );
        }
        current
    }
}

impl<K> Drop for RoundTimers<K> {
    fn drop(&mut self) {
        for armed in self.armed.values() {
            armed.handle.abort();
        }
    }
}

impl<K> std::fmt::Debug for RoundTimers<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundTimers")
            .field("duration", &self.duration)
            .field("armed", &self.armed.len())
            .field("next_generation", &self.next_generation)
            .finish()
    }
}
