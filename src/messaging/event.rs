use crate::channel::payload_key;
use crate::types::constants::{entity_actions, frame_types};
use crate::types::Result;
use serde_json::Value;

/// Notification sub-types, all routed to the `notifications` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Notifications,
    NotificationUpdate,
    AllNotificationsRead,
}

impl NotificationKind {
    pub fn from_type(s: &str) -> Option<Self> {
        match s {
            frame_types::NOTIFICATIONS => Some(Self::Notifications),
            frame_types::NOTIFICATION_UPDATE => Some(Self::NotificationUpdate),
            frame_types::ALL_NOTIFICATIONS_READ => Some(Self::AllNotificationsRead),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => frame_types::NOTIFICATIONS,
            Self::NotificationUpdate => frame_types::NOTIFICATION_UPDATE,
            Self::AllNotificationsRead => frame_types::ALL_NOTIFICATIONS_READ,
        }
    }
}

/// Kind of change carried by an entity frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityAction {
    New,
    Update,
}

impl EntityAction {
    pub fn from_prefix(s: &str) -> Option<Self> {
        match s {
            entity_actions::NEW => Some(Self::New),
            entity_actions::UPDATE => Some(Self::Update),
            _ => None,
        }
    }
}

/// Inbound frame decoded at the transport boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Heartbeat reply
    Pong,

    /// Any notification-class frame; `frame` is the whole decoded object
    Notification { kind: NotificationKind, frame: Value },

    /// `new_<entity>` / `update_<entity>`; `payload` is the value under the
    /// entity's singular key (`Null` when absent)
    EntityChanged {
        entity: String,
        action: EntityAction,
        payload: Value,
    },

    /// Anything else, keeping the raw `type` (empty when missing)
    Unknown(String),
}

impl InboundEvent {
    /// Decode a text frame. Only invalid JSON is an error.
    pub fn decode(text: &str) -> Result<Self> {
        let frame: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(frame))
    }

    pub fn from_value(mut frame: Value) -> Self {
        let Some(frame_type) = frame.get("type").and_then(Value::as_str) else {
            return Self::Unknown(String::new());
        };
        let frame_type = frame_type.to_string();

        if frame_type == frame_types::PONG {
            return Self::Pong;
        }

        if let Some(kind) = NotificationKind::from_type(&frame_type) {
            return Self::Notification { kind, frame };
        }

        if let Some((prefix, entity)) = frame_type.split_once('_')
            && let Some(action) = EntityAction::from_prefix(prefix)
            && !entity.is_empty()
        {
            let key = payload_key(entity);
            let payload = frame
                .get_mut(&*key)
                .map(Value::take)
                .unwrap_or(Value::Null);
            return Self::EntityChanged {
                entity: entity.to_string(),
                action,
                payload,
            };
        }

        Self::Unknown(frame_type)
    }
}
