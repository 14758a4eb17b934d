// Module declarations
mod kind;
mod registry;
mod state;

// Public API exports
pub use kind::{Channel, payload_key};
pub use registry::{SubscriptionRegistry, Unsubscribed};
pub use state::{
    ChannelRegistration, MessageCallback, Subscriber, SubscriptionId, SubscriptionToken,
};
