//! Delivery of decoded interactions to the host application.
//!
//! The scheduler calls a sink from its single worker task, in poll order,
//! never concurrently with itself. How the sink hands entries on to a user
//! interface or another thread is up to the sink.

use oobwatch_core::InteractionEntry;
use tokio::sync::mpsc;

/// Receives decoded interaction entries.
pub trait EntrySink: Send + 'static {
    /// Called once per decoded entry.
    fn deliver(&mut self, entry: InteractionEntry);

    /// Called once after a successful registration with the interaction domain.
    fn ready(&mut self, _domain: &str) {}
}

impl EntrySink for Box<dyn EntrySink> {
    fn deliver(&mut self, entry: InteractionEntry) {
        (**self).deliver(entry)
    }

    fn ready(&mut self, domain: &str) {
        (**self).ready(domain)
    }
}

/// Event emitted by a [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum SinkEvent {
    /// Registration succeeded; carries the interaction domain.
    Ready(String),
    /// One decoded interaction.
    Entry(InteractionEntry),
}

/// Forwards events over an unbounded tokio channel.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Sink receiver dropped, discarding event");
        }
    }
}

impl EntrySink for ChannelSink {
    fn deliver(&mut self, entry: InteractionEntry) {
        self.send(SinkEvent::Entry(entry));
    }

    fn ready(&mut self, domain: &str) {
        self.send(SinkEvent::Ready(domain.to_string()));
    }
}

/// Adapts a closure into an [`EntrySink`] that ignores the ready notification.
pub struct FnSink<F>(pub F);

impl<F> EntrySink for FnSink<F>
where
    F: FnMut(InteractionEntry) + Send + 'static,
{
    fn deliver(&mut self, entry: InteractionEntry) {
        (self.0)(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn entry(unique_id: &str) -> InteractionEntry {
        let record = format!(
            r#"{{"protocol":"dns","unique-id":"{unique_id}","q-type":"A","remote-address":"198.51.100.1","timestamp":"2024-01-01T00:00:00Z"}}"#
        );
        InteractionEntry::parse(record).unwrap()
    }

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (mut sink, mut rx) = ChannelSink::new();

        sink.ready("abc.oast.test");
        sink.deliver(entry("one"));
        sink.deliver(entry("two"));

        assert!(matches!(rx.try_recv().unwrap(), SinkEvent::Ready(d) if d == "abc.oast.test"));
        assert!(matches!(rx.try_recv().unwrap(), SinkEvent::Entry(e) if e.unique_id() == "one"));
        assert!(matches!(rx.try_recv().unwrap(), SinkEvent::Entry(e) if e.unique_id() == "two"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.deliver(entry("lost"));
    }

    #[test]
    fn test_fn_sink_and_boxed_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let mut sink: Box<dyn EntrySink> = Box::new(FnSink(move |e: InteractionEntry| {
            captured.lock().unwrap().push(e.unique_id().to_string());
        }));

        sink.ready("ignored.oast.test");
        sink.deliver(entry("x"));
        sink.deliver(entry("y"));

        assert_eq!(*seen.lock().unwrap(), vec!["x", "y"]);
    }
}
