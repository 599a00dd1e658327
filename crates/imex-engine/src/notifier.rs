//! Fan-out of assignment events to report subscribers.

use imex_kernel::Event;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("report write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receives every event of a run, in processing order.
pub trait Subscriber {
    fn name(&self) -> &str;

    fn on_event(&mut self, event: &Event) -> Result<(), SubscriberError>;

    /// Called once after the last event of a run.
    fn finish(&mut self) -> Result<(), SubscriberError> {
        Ok(())
    }
}

/// Fire-and-forget delivery. A failing subscriber is logged and skipped for
/// that event; the others still receive it.
#[derive(Default)]
pub struct Notifier {
    subscribers: Vec<Box<dyn Subscriber>>,
    failures: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn with_subscriber(mut self, subscriber: impl Subscriber + 'static) -> Self {
        self.subscribe(subscriber);
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Delivery failures observed so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn notify(&mut self, event: &Event) {
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber.on_event(event) {
                self.failures += 1;
                warn!(
                    subscriber = subscriber.name(),
                    publication = %event.publication_id,
                    error = %err,
                    "subscriber failed to handle event"
                );
            }
        }
    }

    pub fn finish(&mut self) {
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber.finish() {
                self.failures += 1;
                warn!(subscriber = subscriber.name(), error = %err, "subscriber failed to finish");
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("Notifier")
            .field("subscribers", &names)
            .field("failures", &self.failures)
            .finish()
    }
}
