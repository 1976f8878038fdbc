mod health;
mod websocket;

pub use health::*;
pub use websocket::*;
