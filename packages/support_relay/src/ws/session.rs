//! Per-connection session state machine
//!
//! `Unassigned` moves to `Customer` or `Agent` on the first role declaration
//! and never back. `close` consumes the session so cleanup runs exactly once;
//! `SessionGuard` calls it on drop, so it also runs when the connection task
//! panics or is cancelled.

use tracing::{debug, info};

use super::connection::ConnectionHandle;
use super::protocol::{ClientCommand, ClientMessage, Role, ServerMessage, SessionId};
use super::router::Router;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRole {
    Unassigned,
    Customer { session_id: SessionId },
    Agent { picked: Option<SessionId> },
}

/// Result of feeding one inbound frame to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    /// Dropped without a reply; the reason is for logs only.
    Ignored(&'static str),
}

#[derive(Debug)]
pub struct Session {
    conn: ConnectionHandle,
    role: SessionRole,
}

impl Session {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self {
            conn,
            role: SessionRole::Unassigned,
        }
    }

    pub fn role(&self) -> &SessionRole {
        &self.role
    }

    pub fn handle(&mut self, msg: ClientMessage, router: &Router<'_>) -> Outcome {
        match msg {
            ClientMessage::Declare { role } => self.declare(role, router),
            ClientMessage::Command(ClientCommand::PickCustomer { session_id }) => {
                self.pick(SessionId::from(session_id), router)
            }
            ClientMessage::Command(ClientCommand::Message { text, sender }) => {
                self.chat(&text, sender, router)
            }
        }
    }

    fn declare(&mut self, role: Role, router: &Router<'_>) -> Outcome {
        if self.role != SessionRole::Unassigned {
            return Outcome::Ignored("role already assigned");
        }

        match role {
            Role::Customer => {
                let session_id = router.registry().register_customer(self.conn.clone());
                info!(conn_id = %self.conn.id(), session_id = %session_id, "Customer connected");
                self.role = SessionRole::Customer {
                    session_id: session_id.clone(),
                };
                let _ = router.deliver(&self.conn, ServerMessage::Session { session_id });
            }
            Role::Agent => {
                router.registry().register_agent(self.conn.clone());
                info!(conn_id = %self.conn.id(), "Agent connected");
                self.role = SessionRole::Agent { picked: None };
            }
        }
        router.broadcast_presence();
        Outcome::Handled
    }

    fn pick(&mut self, session_id: SessionId, router: &Router<'_>) -> Outcome {
        let SessionRole::Agent { picked } = &mut self.role else {
            return Outcome::Ignored("pick_customer from non-agent");
        };

        // Not checked against the registry: a pick of an unknown id is
        // accepted and later agent messages to it are dropped.
        info!(conn_id = %self.conn.id(), session_id = %session_id, "Agent picked customer");
        let reply = ServerMessage::picked(&session_id);
        *picked = Some(session_id);
        let _ = router.deliver(&self.conn, reply);
        Outcome::Handled
    }

    fn chat(&self, text: &str, sender: Option<Role>, router: &Router<'_>) -> Outcome {
        match (sender, &self.role) {
            (Some(Role::Customer), SessionRole::Customer { session_id }) => {
                let tally = router.fan_out_to_agents(session_id, text);
                debug!(session_id = %session_id, delivered = tally.delivered, dropped = tally.dropped, "Customer message relayed");
                Outcome::Handled
            }
            (Some(Role::Agent), SessionRole::Agent { picked: Some(target) }) => {
                let tally = router.send_to_customer(target, text);
                debug!(session_id = %target, delivered = tally.delivered, dropped = tally.dropped, "Agent message relayed");
                Outcome::Handled
            }
            (Some(Role::Agent), SessionRole::Agent { picked: None }) => {
                Outcome::Ignored("agent message before pick")
            }
            (None, _) => Outcome::Ignored("message without sender"),
            _ => Outcome::Ignored("sender does not match role"),
        }
    }

    /// Remove this connection from the registry. A departing customer
    /// triggers a presence broadcast reflecting the removal.
    pub fn close(self, router: &Router<'_>) {
        match self.role {
            SessionRole::Customer { session_id } => {
                if router.registry().unregister_customer(&session_id) {
                    info!(conn_id = %self.conn.id(), session_id = %session_id, "Customer disconnected");
                    router.broadcast_presence();
                }
            }
            SessionRole::Agent { .. } => {
                if router.registry().unregister_agent(self.conn.id()) {
                    info!(conn_id = %self.conn.id(), "Agent disconnected");
                }
            }
            SessionRole::Unassigned => {
                debug!(conn_id = %self.conn.id(), "Unassigned connection closed");
            }
        }
    }
}

/// Owns a connection's session and closes it against the registry when
/// dropped, whether the connection task returns, panics or is cancelled.
pub struct SessionGuard<'a> {
    session: Option<Session>,
    router: Router<'a>,
}

impl<'a> SessionGuard<'a> {
    pub fn new(session: Session, router: Router<'a>) -> Self {
        Self {
            session: Some(session),
            router,
        }
    }

    pub fn handle(&mut self, msg: ClientMessage) -> Outcome {
        match self.session.as_mut() {
            Some(session) => session.handle(msg, &self.router),
            None => Outcome::Ignored("session closed"),
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.close(&self.router);
        }
    }
}
