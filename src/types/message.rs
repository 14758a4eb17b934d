use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::types::error::Result;

/// Frames the client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Start server-side push for a channel
    Subscribe {
        #[serde(rename = "dataType")]
        data_type: Channel,
    },

    /// Stop server-side push for a channel
    Unsubscribe {
        #[serde(rename = "dataType")]
        data_type: Channel,
    },

    /// Heartbeat keep-alive
    Ping { timestamp: String },
}

impl OutboundFrame {
    pub fn subscribe(channel: Channel) -> Self {
        Self::Subscribe { data_type: channel }
    }

    pub fn unsubscribe(channel: Channel) -> Self {
        Self::Unsubscribe { data_type: channel }
    }

    /// Ping stamped with the current UTC time (RFC 3339, millisecond precision)
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
