//! Last-write-wins debounced publication.
//!
//! Holds a single pending timer task. Scheduling a value aborts whatever
//! was pending and starts a fresh delay, so at most one publication is ever
//! outstanding and values are never applied out of order.
//!
//! Aborting cannot stop a timer task that is already publishing on another
//! worker, so every request also bumps a generation counter. A timer only
//! publishes if its generation is still the latest, checked while holding
//! the channel's write lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Debouncer<T> {
    delay: Duration,
    published: Arc<watch::Sender<T>>,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration) -> Self {
        let (published, _) = watch::channel(initial);
        Self {
            delay,
            published: Arc::new(published),
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.published.subscribe()
    }

    /// Publish `value` after the delay unless superseded first
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, value: T) {
        self.cancel();

        let scheduled = self.generation.load(Ordering::SeqCst);
        let published = self.published.clone();
        let generation = self.generation.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            publish_if_current(&published, &generation, scheduled, value);
        }));
    }

    /// Drop the pending publication, if any
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Cancel anything pending and publish immediately
    pub fn publish_now(&mut self, value: T) {
        self.cancel();
        let current = self.generation.load(Ordering::SeqCst);
        publish_if_current(&self.published, &self.generation, current, value);
    }
}

/// Replace the published value if `scheduled` is still the latest generation
fn publish_if_current<T: PartialEq>(
    sender: &watch::Sender<T>,
    generation: &AtomicU64,
    scheduled: u64,
    value: T,
) -> bool {
    sender.send_if_modified(|current| {
        if generation.load(Ordering::SeqCst) != scheduled || *current == value {
            return false;
        }
        *current = value;
        true
    })
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
