//! Delivery event fan-out.
//!
//! Every [`DeliveryEvent`] names the run that produced it. A subscriber
//! either watches all runs or follows exactly one; a follower never sees
//! the late events of a stopped run once its successor is live.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

use convoy_types::event::DeliveryEvent;

/// Events buffered per subscriber before the slowest one starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Publishes delivery events to any number of [`EventStream`]s.
///
/// Publishing never blocks the loop: with no subscriber the event is
/// dropped, and a subscriber that falls `capacity` events behind gets
/// `RecvError::Lagged` instead of slowing delivery down.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeliveryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DeliveryEvent) {
        let run_id = event.run_id();
        if self.sender.send(event).is_err() {
            tracing::trace!(%run_id, "No event subscribers");
        }
    }

    /// Stream of every run's events from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            run_id: None,
        }
    }

    /// Stream of the events of `run_id` only.
    pub fn follow_run(&self, run_id: Uuid) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            run_id: Some(run_id),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving side of the bus, optionally pinned to one run.
pub struct EventStream {
    receiver: broadcast::Receiver<DeliveryEvent>,
    run_id: Option<Uuid>,
}

impl EventStream {
    /// The run this stream follows, or `None` for all runs.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    fn wants(&self, event: &DeliveryEvent) -> bool {
        self.run_id.is_none_or(|run_id| event.run_id() == run_id)
    }

    /// Next event of the followed run(s).
    pub async fn recv(&mut self) -> Result<DeliveryEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// Next already-published event of the followed run(s), without waiting.
    pub fn try_recv(&mut self) -> Result<DeliveryEvent, TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }
}
