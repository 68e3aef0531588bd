//! HTTP endpoint for the hospital assistant with bearer auth and health check.

mod error;
mod guard;
mod handlers;
mod router;
mod server;
#[cfg(test)]
mod testing;

pub use error::GatewayError;
pub use server::GatewayServer;
