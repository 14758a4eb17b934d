// Module declarations
mod builder;
mod connection;
mod core;
mod driver;
mod state;
mod subscription;

// Public API exports
pub use builder::{RealtimeClientBuilder, RealtimeClientOptions};
pub use connection::{
    ConnectionAction, ConnectionEvent, ConnectionManager, ConnectionNotice, ConnectionState,
    TimerKind,
};
pub use self::core::RealtimeClient;
pub use state::{ClientState, ConnectionStatus};
pub use subscription::{Subscription, SubscriptionDescriptor};
