//! # Realtime Sync
//!
//! Client-side realtime subscription engine: many logical data-channel
//! subscriptions multiplexed over a single WebSocket, automatic recovery with
//! bounded exponential backoff, and routing of pushed updates to subscriber
//! callbacks and cache invalidation.
//!
//! The transport is opened by the first subscription and closed when the last
//! one is dropped. Messages the server sends while disconnected are not
//! replayed.
//!
//! ## Example
//!
//! ```no_run
//! use realtime_sync_rs::{Channel, RealtimeClient, RealtimeClientOptions, SubscriptionDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(RealtimeClientOptions::new("crm.example.com"))?;
//!
//!     let _demandes = client.subscribe(
//!         SubscriptionDescriptor::new(Channel::Demandes)
//!             .invalidate(["demandes", "dashboard"])
//!             .on_message(|demande| println!("demande updated: {demande}")),
//!     )?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use channel::{Channel, SubscriptionId, SubscriptionToken};
pub use client::{
    ConnectionNotice, ConnectionState, ConnectionStatus, RealtimeClient, RealtimeClientBuilder,
    RealtimeClientOptions, Subscription, SubscriptionDescriptor,
};
pub use infrastructure::{
    CacheInvalidator, FileTokenStore, FixedJitter, JitterSource, QueryCache, ReconnectConfig,
    StaticTokenStore, TokenStore,
};
pub use messaging::InboundEvent;
pub use types::{OutboundFrame, RealtimeError, Result};
