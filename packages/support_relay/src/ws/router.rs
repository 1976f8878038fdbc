//! Message Router
//!
//! Decides which connections receive an outbound frame. Holds no state of its
//! own beyond borrowed access to the registry and metrics.
//!
//! Delivery is best-effort per recipient: a failed send is logged, counted and
//! skipped, and never aborts delivery to the remaining recipients.

use tracing::{debug, warn};

use crate::metrics::RelayMetrics;

use super::connection::{ConnectionHandle, DeliveryError};
use super::protocol::{ServerMessage, SessionId};
use super::registry::Registry;

/// Tally of one routing decision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

impl Delivery {
    fn record(&mut self, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(_) => self.dropped += 1,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Router<'a> {
    registry: &'a Registry,
    metrics: &'a RelayMetrics,
}

impl<'a> Router<'a> {
    pub fn new(registry: &'a Registry, metrics: &'a RelayMetrics) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Queue `msg` for one peer. This is the single place where a failed send
    /// turns into a drop.
    pub fn deliver(&self, conn: &ConnectionHandle, msg: ServerMessage) -> Result<(), DeliveryError> {
        let kind = msg.kind();
        match conn.send(msg) {
            Ok(()) => {
                self.metrics.message_delivered();
                Ok(())
            }
            Err(e @ DeliveryError::QueueFull(_)) => {
                self.metrics.message_dropped();
                warn!(conn_id = %conn.id(), kind, "Dropping message: {}", e);
                Err(e)
            }
            Err(e @ DeliveryError::Closed(_)) => {
                self.metrics.message_dropped();
                debug!(conn_id = %conn.id(), kind, "Dropping message: {}", e);
                Err(e)
            }
        }
    }

    /// Send the current customer list to every agent.
    ///
    /// Runs under the registry lock so that two broadcasts racing each other
    /// reach every agent in the same order as the registry changes they
    /// describe.
    pub fn broadcast_presence(&self) -> Delivery {
        self.metrics.presence_broadcast();
        self.registry.with_presence(|list, agents| {
            let msg = ServerMessage::Customers { list };
            let mut tally = Delivery::default();
            for agent in agents {
                tally.record(self.deliver(agent, msg.clone()));
            }
            tally
        })
    }

    /// Customer → every agent.
    pub fn fan_out_to_agents(&self, from: &SessionId, text: &str) -> Delivery {
        let msg = ServerMessage::from_customer(from, text);
        let mut tally = Delivery::default();
        for agent in self.registry.agents() {
            tally.record(self.deliver(&agent, msg.clone()));
        }
        tally
    }

    /// Agent → the picked customer, if still online. A customer that left is a
    /// silent drop.
    pub fn send_to_customer(&self, session_id: &SessionId, text: &str) -> Delivery {
        let mut tally = Delivery::default();
        match self.registry.lookup_customer(session_id.as_str()) {
            Some(customer) => tally.record(self.deliver(&customer, ServerMessage::from_agent(text))),
            None => {
                self.metrics.message_dropped();
                debug!(session_id = %session_id, "Picked customer is gone, dropping agent message");
                tally.dropped += 1;
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::ConnectionId;
    use tokio::sync::mpsc;

    fn peer(capacity: usize) -> (ConnectionHandle, mpsc::Receiver<ServerMessage>) {
        ConnectionHandle::channel(ConnectionId::next(), capacity)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn presence_reaches_every_agent() {
        let registry = Registry::new();
        let metrics = RelayMetrics::new();
        let router = Router::new(&registry, &metrics);

        let (c1, _c1_rx) = peer(8);
        let (c2, _c2_rx) = peer(8);
        let id1 = registry.register_customer(c1);
        let id2 = registry.register_customer(c2);

        let (a1, mut a1_rx) = peer(8);
        let (a2, mut a2_rx) = peer(8);
        registry.register_agent(a1);
        registry.register_agent(a2);

        let tally = router.broadcast_presence();
        assert_eq!(tally, Delivery { delivered: 2, dropped: 0 });

        let expected = ServerMessage::Customers {
            list: vec![id1, id2],
        };
        assert_eq!(drain(&mut a1_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut a2_rx), vec![expected]);
    }

    #[test]
    fn failed_agent_does_not_stop_broadcast() {
        let registry = Registry::new();
        let metrics = RelayMetrics::new();
        let router = Router::new(&registry, &metrics);

        let (gone, gone_rx) = peer(8);
        drop(gone_rx);
        let (full, _full_rx) = peer(1);
        full.send(ServerMessage::Info { text: "x".into() }).unwrap();
        let (ok, mut ok_rx) = peer(8);

        registry.register_agent(gone);
        registry.register_agent(full);
        registry.register_agent(ok);

        let tally = router.broadcast_presence();
        assert_eq!(tally, Delivery { delivered: 1, dropped: 2 });
        assert_eq!(drain(&mut ok_rx).len(), 1);
        assert_eq!(metrics.snapshot().messages.dropped, 2);
    }

    #[test]
    fn customer_message_goes_to_agents_only() {
        let registry = Registry::new();
        let metrics = RelayMetrics::new();
        let router = Router::new(&registry, &metrics);

        let (c1, mut c1_rx) = peer(8);
        let (c2, mut c2_rx) = peer(8);
        let id1 = registry.register_customer(c1);
        registry.register_customer(c2);
        let (a, mut a_rx) = peer(8);
        registry.register_agent(a);

        let tally = router.fan_out_to_agents(&id1, "hi");
        assert_eq!(tally.delivered, 1);
        assert_eq!(
            drain(&mut a_rx),
            vec![ServerMessage::from_customer(&id1, "hi")]
        );
        assert!(drain(&mut c1_rx).is_empty());
        assert!(drain(&mut c2_rx).is_empty());
    }

    #[test]
    fn agent_message_targets_picked_customer() {
        let registry = Registry::new();
        let metrics = RelayMetrics::new();
        let router = Router::new(&registry, &metrics);

        let (c1, mut c1_rx) = peer(8);
        let (c2, mut c2_rx) = peer(8);
        let id1 = registry.register_customer(c1);
        registry.register_customer(c2);

        let tally = router.send_to_customer(&id1, "hello");
        assert_eq!(tally, Delivery { delivered: 1, dropped: 0 });
        assert_eq!(drain(&mut c1_rx), vec![ServerMessage::from_agent("hello")]);
        assert!(drain(&mut c2_rx).is_empty());
    }

    #[test]
    fn agent_message_to_departed_customer_is_dropped() {
        let registry = Registry::new();
        let metrics = RelayMetrics::new();
        let router = Router::new(&registry, &metrics);

        let (c, mut c_rx) = peer(8);
        let id = registry.register_customer(c);
        registry.unregister_customer(&id);

        let tally = router.send_to_customer(&id, "anyone?");
        assert_eq!(tally, Delivery { delivered: 0, dropped: 1 });
        assert!(drain(&mut c_rx).is_empty());
    }
}
