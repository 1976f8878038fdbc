// Library interface for support_relay
// Exposes the relay core and its HTTP surface so the binary and tests share one router

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod ws;

pub use server::{RelayState, build_router, serve};
