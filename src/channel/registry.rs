use super::state::{ChannelRegistration, Subscriber, SubscriptionToken};
use super::Channel;
use std::collections::HashMap;

/// Result of removing a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsubscribed {
    /// The channel has no subscribers left; server-side push should stop
    pub channel_emptied: bool,
    /// No channel has subscribers left; the transport may close
    pub registry_emptied: bool,
}

/// In-memory map of channel -> subscribers.
///
/// A channel entry exists only while it has at least one subscriber, so
/// iterating [`channels`](Self::channels) is exactly the set to resubscribe.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    channels: HashMap<Channel, ChannelRegistration>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber. Returns `true` when it is the first one of its channel.
    pub fn subscribe(&mut self, subscriber: Subscriber) -> bool {
        let registration = self.channels.entry(subscriber.channel).or_default();
        let first = registration.is_empty();
        registration.add(subscriber);
        first
    }

    /// Removes a subscriber by identity.
    ///
    /// Returns `None` if the token was already redeemed or never registered.
    pub fn unsubscribe(&mut self, token: &SubscriptionToken) -> Option<Unsubscribed> {
        let registration = self.channels.get_mut(&token.channel)?;
        if !registration.remove(token.id) {
            return None;
        }

        let channel_emptied = registration.is_empty();
        if channel_emptied {
            self.channels.remove(&token.channel);
        }

        Some(Unsubscribed {
            channel_emptied,
            registry_emptied: self.channels.is_empty(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels with at least one subscriber
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.channels.get(&channel).map_or(0, ChannelRegistration::count)
    }

    pub fn subscribers(&self, channel: Channel) -> &[Subscriber] {
        self.channels
            .get(&channel)
            .map(ChannelRegistration::subscribers)
            .unwrap_or(&[])
    }

    #[cfg(test)]
    pub(crate) fn registrations(&self) -> impl Iterator<Item = &ChannelRegistration> {
        self.channels.values()
    }
}
