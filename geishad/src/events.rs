//! Event Bus
//!
//! Fans actor events out to subscribed connections.
//!
//! # Architecture
//!
//! One registry task owns the list of subscriber sinks. Subscribing,
//! emitting and counting are all messages into that task, so the list has a
//! single writer and needs no lock. Each sink is a bounded mpsc sender: a
//! failed `try_send` (receiver gone, or buffer full because the subscriber
//! stopped reading) drops the sink, which ends that subscriber's stream.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub use geisha_common::Event;

enum BusCommand {
    Subscribe(mpsc::Sender<Event>),
    Emit(Event),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the registry task
///
/// The task exits once every handle is dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<BusCommand>,
    buffer: usize,
}

impl EventBus {
    /// Spawn the registry task
    ///
    /// # Arguments
    ///
    /// * `buffer` - Events each subscriber may have pending before it is dropped
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_registry(rx));
        Self {
            tx,
            buffer: buffer.max(1),
        }
    }

    /// Broadcast `event` to every current subscriber. Never blocks.
    pub fn emit(&self, event: Event) {
        debug!("Event: {}", event);
        // Only fails once the registry is gone, i.e. during shutdown.
        let _ = self.tx.send(BusCommand::Emit(event));
    }

    /// Register a new sink and return its receiving end
    ///
    /// Only events emitted after registration are delivered.
    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (sink, stream) = mpsc::channel(self.buffer);
        let _ = self.tx.send(BusCommand::Subscribe(sink));
        stream
    }

    /// Number of registered sinks, as seen by the registry
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(BusCommand::Count(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

async fn run_registry(mut rx: mpsc::UnboundedReceiver<BusCommand>) {
    let mut sinks: Vec<mpsc::Sender<Event>> = Vec::new();

    while let Some(command) = rx.recv().await {
        match command {
            BusCommand::Subscribe(sink) => {
                sinks.push(sink);
                debug!("Subscriber added, {} active", sinks.len());
            }
            BusCommand::Emit(event) => deliver(&mut sinks, event),
            BusCommand::Count(reply) => {
                let _ = reply.send(sinks.len());
            }
        }
    }

    debug!("Event bus stopped");
}

/// Most recent subscriber first; failing sinks are removed
fn deliver(sinks: &mut Vec<mpsc::Sender<Event>>, event: Event) {
    for index in (0..sinks.len()).rev() {
        if let Err(e) = sinks[index].try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Subscriber fell behind, dropping it")
                }
                mpsc::error::TrySendError::Closed(_) => debug!("Subscriber went away"),
            }
            sinks.remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_to_all_subscribers() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(Event::SongPlay);
        bus.emit(Event::QueueChange);

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await, Some(Event::SongPlay));
            assert_eq!(rx.recv().await, Some(Event::QueueChange));
        }
        assert_eq!(bus.subscriber_count().await, 2);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_new_events() {
        let bus = EventBus::new(8);
        let mut early = bus.subscribe();
        bus.emit(Event::CtrlPlay);

        let mut late = bus.subscribe();
        bus.emit(Event::CtrlPause);

        assert_eq!(early.recv().await, Some(Event::CtrlPlay));
        assert_eq!(early.recv().await, Some(Event::CtrlPause));
        assert_eq!(late.recv().await, Some(Event::CtrlPause));
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_removed() {
        let bus = EventBus::new(8);
        let mut kept = bus.subscribe();
        let gone = bus.subscribe();
        assert_eq!(bus.subscriber_count().await, 2);

        drop(gone);
        bus.emit(Event::ModeChange);

        assert_eq!(kept.recv().await, Some(Event::ModeChange));
        assert_eq!(bus.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_is_dropped() {
        let bus = EventBus::new(1);
        let mut stalled = bus.subscribe();

        bus.emit(Event::SongPlay);
        bus.emit(Event::SongDone);
        assert_eq!(bus.subscriber_count().await, 0);

        // The buffered event is still readable, then the stream ends.
        assert_eq!(stalled.recv().await, Some(Event::SongPlay));
        assert_eq!(stalled.recv().await, None);
    }

    #[test]
    fn test_full_sink_removed_without_affecting_others() {
        let (first_tx, mut first_rx) = mpsc::channel(1);
        let (second_tx, mut second_rx) = mpsc::channel(1);
        let mut sinks = vec![first_tx, second_tx];

        // Newest sink is full, so delivery to it fails.
        sinks[1].try_send(Event::CtrlStop).unwrap();
        deliver(&mut sinks, Event::CtrlSkip);

        assert_eq!(sinks.len(), 1);
        assert_eq!(first_rx.try_recv().unwrap(), Event::CtrlSkip);
        assert_eq!(second_rx.try_recv().unwrap(), Event::CtrlStop);
    }
}
