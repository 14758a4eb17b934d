// Messaging module - Inbound frame decoding and routing
pub mod event;
pub mod router;

pub use event::{EntityAction, InboundEvent, NotificationKind};
pub use router::MessageRouter;
