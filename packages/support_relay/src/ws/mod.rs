//! Customer/Agent WebSocket Relay
//!
//! One WebSocket connection per client. Customers are announced to every
//! agent; an agent picks one customer and converses with it.
//! - Customer messages fan out to all agents
//! - Agent messages go to the picked customer only

pub mod connection;
mod handler;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;

// Re-export the main types and functions
pub use connection::{ConnectionHandle, ConnectionId, DeliveryError};
pub use handler::handle_relay_ws;
pub use protocol::{ClientCommand, ClientMessage, ProtocolError, Role, ServerMessage, SessionId};
pub use registry::Registry;
pub use router::{Delivery, Router};
pub use session::{Outcome, Session, SessionGuard, SessionRole};
