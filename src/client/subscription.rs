use super::driver::Command;
use crate::channel::{Channel, MessageCallback, Subscriber, SubscriptionId, SubscriptionToken};
use crate::types::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a collaborator wants to follow: a channel, the cache keys to mark
/// stale on every update, and an optional callback for the payload.
///
/// # Example
///
/// ```
/// use realtime_sync_rs::{Channel, SubscriptionDescriptor};
///
/// let descriptor = SubscriptionDescriptor::new(Channel::Leads)
///     .invalidate(["leads", "dashboard-stats"])
///     .on_message(|lead| println!("lead changed: {lead}"));
/// assert_eq!(descriptor.channel(), Channel::Leads);
/// ```
#[derive(Clone)]
pub struct SubscriptionDescriptor {
    channel: Channel,
    invalidation_keys: Vec<String>,
    on_message: Option<MessageCallback>,
}

impl SubscriptionDescriptor {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            invalidation_keys: Vec::new(),
            on_message: None,
        }
    }

    /// Descriptor for a channel given by its wire name (`"rendez-vous"`, `"leads"`, ...)
    pub fn named(channel: &str) -> Result<Self> {
        Ok(Self::new(channel.parse()?))
    }

    /// Appends cache keys; order is preserved.
    pub fn invalidate<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidation_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(callback));
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn invalidation_keys(&self) -> &[String] {
        &self.invalidation_keys
    }

    pub(crate) fn into_subscriber(self, id: SubscriptionId) -> Subscriber {
        Subscriber {
            id,
            channel: self.channel,
            invalidation_keys: self.invalidation_keys,
            on_message: self.on_message,
        }
    }
}

impl std::fmt::Debug for SubscriptionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionDescriptor")
            .field("channel", &self.channel)
            .field("invalidation_keys", &self.invalidation_keys)
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

/// Live registration returned by [`RealtimeClient::subscribe`](super::RealtimeClient::subscribe).
///
/// Unsubscribes when redeemed with [`unsubscribe`](Self::unsubscribe) or dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    token: SubscriptionToken,
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl Subscription {
    pub(crate) fn new(token: SubscriptionToken, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            token,
            commands: Some(commands),
        }
    }

    pub fn token(&self) -> SubscriptionToken {
        self.token
    }

    pub fn channel(&self) -> Channel {
        self.token.channel
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(commands) = self.commands.take()
            && commands.send(Command::Unsubscribe(self.token)).is_err()
        {
            tracing::debug!("Client already shut down, {} released", self.token.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.token.channel)
            .field("id", &self.token.id)
            .finish()
    }
}
