// WebSocket module - Endpoint construction and transport creation
mod endpoint;
mod factory;

pub use endpoint::Endpoint;
pub use factory::{WebSocketFactory, WsStream};
