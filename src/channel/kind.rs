use crate::types::RealtimeError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

/// Data channels the server can push updates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Contacts,
    Leads,
    Demandes,
    Paiements,
    Emails,
    Performance,
    Notifications,
    Dashboard,
    Clients,
    RendezVous,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Self::Contacts,
        Self::Leads,
        Self::Demandes,
        Self::Paiements,
        Self::Emails,
        Self::Performance,
        Self::Notifications,
        Self::Dashboard,
        Self::Clients,
        Self::RendezVous,
    ];

    /// Wire name used in `dataType` and in entity-change frame types
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Leads => "leads",
            Self::Demandes => "demandes",
            Self::Paiements => "paiements",
            Self::Emails => "emails",
            Self::Performance => "performance",
            Self::Notifications => "notifications",
            Self::Dashboard => "dashboard",
            Self::Clients => "clients",
            Self::RendezVous => "rendez-vous",
        }
    }

    /// Key under which entity-change frames for this channel carry their payload
    pub fn payload_key(&self) -> Cow<'static, str> {
        payload_key(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|channel| channel.as_str() == s)
            .copied()
            .ok_or_else(|| RealtimeError::UnknownChannel(s.to_string()))
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Irregular plural -> singular payload keys
const IRREGULAR_PLURALS: &[(&str, &str)] = &[("demandes", "demande"), ("paiements", "paiement")];

/// Maps a plural entity name to the singular key holding its payload.
///
/// Known irregular plurals come from a hand-maintained table; every other name
/// has one trailing `s` stripped. The fallback is lossy (`"rendez-vous"` becomes
/// `"rendez-vou"`), so any new entity whose plural is not a plain `+s` needs an
/// entry in the table.
pub fn payload_key(entity: &str) -> Cow<'static, str> {
    if let Some((_, singular)) = IRREGULAR_PLURALS
        .iter()
        .find(|(plural, _)| *plural == entity)
    {
        return Cow::Borrowed(*singular);
    }

    Cow::Owned(entity.strip_suffix('s').unwrap_or(entity).to_string())
}
