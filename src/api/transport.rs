use std::cell::{Cell, RefCell};

use anyhow::{Result, bail};
use log::debug;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::protocol::{Inbound, Request};

/// Outgoing half of the backend connection.
///
/// Responses never come back through this trait: they are delivered as
/// [`Inbound`] messages on a channel that the TUI loop drains and emits on
/// the event bus.
pub trait Transport {
    fn send_object(&self, message: &Request) -> Result<()>;
}

pub type InboundSender = UnboundedSender<Inbound>;
pub type InboundReceiver = UnboundedReceiver<Inbound>;

pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

type Responder = Box<dyn Fn(&Request) -> Vec<Inbound>>;

/// In-process transport that records every request.
///
/// With a responder attached, each request is answered by queueing the
/// responder's messages on the inbound channel, so replies arrive on a later
/// frame exactly like socket traffic does.
#[derive(Default)]
pub struct MemoryTransport {
    sent: RefCell<Vec<Request>>,
    responder: Option<(InboundSender, Responder)>,
    failing: Cell<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder<F>(inbound: InboundSender, responder: F) -> Self
    where
        F: Fn(&Request) -> Vec<Inbound> + 'static,
    {
        Self {
            responder: Some((inbound, Box::new(responder))),
            ..Self::default()
        }
    }

    /// Make subsequent sends fail as if the connection had dropped
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.borrow().clone()
    }

    pub fn take_sent(&self) -> Vec<Request> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent.borrow().iter().map(Request::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.sent.borrow().iter().filter(|r| r.name() == name).count()
    }
}

impl Transport for MemoryTransport {
    fn send_object(&self, message: &Request) -> Result<()> {
        if self.failing.get() {
            bail!("Connection to backend is closed");
        }

        debug!("-> {}", message.name());
        self.sent.borrow_mut().push(message.clone());

        if let Some((inbound, responder)) = &self.responder {
            for reply in responder(message) {
                if inbound.send(reply).is_err() {
                    bail!("Inbound channel is closed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_requests() {
        let transport = MemoryTransport::new();
        transport.send_object(&Request::GetFleets).unwrap();
        transport.send_object(&Request::GetQueues).unwrap();
        assert_eq!(transport.sent_names(), vec!["GetFleets", "GetQueues"]);
        assert_eq!(transport.count("GetFleets"), 1);
        assert_eq!(transport.take_sent().len(), 2);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_failing_transport() {
        let transport = MemoryTransport::new();
        transport.set_failing(true);
        assert!(transport.send_object(&Request::PurgeData).is_err());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_responder_queues_replies() {
        let (tx, mut rx) = inbound_channel();
        let transport = MemoryTransport::with_responder(tx, |request| {
            vec![Inbound::new(request.response_event(), json!({"Errors": []}))]
        });

        transport.send_object(&Request::PurgeData).unwrap();
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.event, "PurgeDataResponse");
        assert!(rx.try_recv().is_err());
    }
}
