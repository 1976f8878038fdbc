//! WebSocket Protocol Types
//!
//! Frames exchanged between the relay and its customer/agent clients. Every
//! frame is a single JSON object carried in a text message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one customer connection, e.g. `customer_42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role a client declares, also used as the `sender` of chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => f.write_str("customer"),
            Role::Agent => f.write_str("agent"),
        }
    }
}

/// Errors raised while decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported frame kind: {0}")]
    Unsupported(&'static str),
}

/// Messages sent FROM the client TO the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `{"role": "customer" | "agent"}`
    Declare { role: Role },
    /// Any frame carrying a `type` tag
    Command(ClientCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Agent selects the customer it is talking to
    PickCustomer { session_id: String },
    /// Chat payload; without a `sender` nothing is routed
    Message {
        text: String,
        #[serde(default)]
        sender: Option<Role>,
    },
}

impl ClientMessage {
    /// Decode one text frame.
    ///
    /// A frame with a `role` key is a role declaration no matter what else it
    /// carries; everything else must be a tagged command.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(role) = value.get("role") {
            let role = Role::deserialize(role)?;
            return Ok(ClientMessage::Declare { role });
        }
        Ok(ClientMessage::Command(serde_json::from_value(value)?))
    }
}

/// Messages sent FROM the relay TO the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once to a customer right after it declares its role
    Session { session_id: SessionId },
    /// Acknowledges an agent's pick
    Info { text: String },
    /// Presence broadcast: every customer currently online
    Customers { list: Vec<SessionId> },
    /// Chat delivery; `from` is the customer's session id or `"agent"`
    Message { text: String, from: String },
}

impl ServerMessage {
    pub fn picked(session_id: &SessionId) -> Self {
        ServerMessage::Info {
            text: format!("Connected with {session_id}"),
        }
    }

    pub fn from_customer(session_id: &SessionId, text: impl Into<String>) -> Self {
        ServerMessage::Message {
            text: text.into(),
            from: session_id.to_string(),
        }
    }

    pub fn from_agent(text: impl Into<String>) -> Self {
        ServerMessage::Message {
            text: text.into(),
            from: Role::Agent.to_string(),
        }
    }

    /// Wire name of the frame, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Session { .. } => "session",
            ServerMessage::Info { .. } => "info",
            ServerMessage::Customers { .. } => "customers",
            ServerMessage::Message { .. } => "message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_role_declarations() {
        assert_eq!(
            ClientMessage::parse(r#"{"role":"customer"}"#).unwrap(),
            ClientMessage::Declare {
                role: Role::Customer
            }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"role":"agent"}"#).unwrap(),
            ClientMessage::Declare { role: Role::Agent }
        );
    }

    #[test]
    fn role_key_wins_over_type() {
        let msg =
            ClientMessage::parse(r#"{"role":"agent","type":"message","text":"x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Declare { role: Role::Agent });
    }

    #[test]
    fn unknown_role_is_malformed() {
        let err = ClientMessage::parse(r#"{"role":"admin"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn parse_pick_customer() {
        let msg = ClientMessage::parse(r#"{"type":"pick_customer","session_id":"customer_7"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Command(ClientCommand::PickCustomer {
                session_id: "customer_7".into()
            })
        );
    }

    #[test]
    fn parse_message_with_and_without_sender() {
        let msg =
            ClientMessage::parse(r#"{"type":"message","text":"hi","sender":"customer"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Command(ClientCommand::Message {
                text: "hi".into(),
                sender: Some(Role::Customer)
            })
        );

        let msg = ClientMessage::parse(r#"{"type":"message","text":"hi"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Command(ClientCommand::Message {
                text: "hi".into(),
                sender: None
            })
        );
    }

    #[test]
    fn malformed_frames_are_rejected() {
        for frame in [
            "not json",
            "[]",
            r#"{"type":"message","sender":"agent"}"#,
            r#"{"type":"pick_customer"}"#,
            r#"{"type":"dance"}"#,
            r#"{"text":"no type"}"#,
        ] {
            assert!(ClientMessage::parse(frame).is_err(), "accepted {frame}");
        }
    }

    #[test]
    fn server_messages_match_wire_shapes() {
        let sid = SessionId::new("customer_3");
        assert_eq!(
            serde_json::to_value(ServerMessage::Session {
                session_id: sid.clone()
            })
            .unwrap(),
            json!({"type": "session", "session_id": "customer_3"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::picked(&sid)).unwrap(),
            json!({"type": "info", "text": "Connected with customer_3"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Customers {
                list: vec![sid.clone()]
            })
            .unwrap(),
            json!({"type": "customers", "list": ["customer_3"]})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::from_customer(&sid, "hi")).unwrap(),
            json!({"type": "message", "text": "hi", "from": "customer_3"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::from_agent("hello")).unwrap(),
            json!({"type": "message", "text": "hello", "from": "agent"})
        );
    }
}
