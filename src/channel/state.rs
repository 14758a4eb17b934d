use super::Channel;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Callback invoked with the payload of every frame routed to a subscriber
pub type MessageCallback = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// Identity of a subscriber, unique for the lifetime of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Redeemable token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    pub channel: Channel,
    pub id: SubscriptionId,
}

/// One logical subscription to a channel
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriptionId,
    pub channel: Channel,
    pub invalidation_keys: Vec<String>,
    pub on_message: Option<MessageCallback>,
}

impl Subscriber {
    pub fn token(&self) -> SubscriptionToken {
        SubscriptionToken {
            channel: self.channel,
            id: self.id,
        }
    }

    /// Deliver a payload to the callback, if any.
    ///
    /// A panicking callback is contained and logged; returns `false` in that case.
    pub fn notify(&self, payload: Value) -> bool {
        let Some(callback) = &self.on_message else {
            return true;
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
            Ok(()) => true,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    "Subscriber {} on {} panicked: {}",
                    self.id,
                    self.channel,
                    reason
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("invalidation_keys", &self.invalidation_keys)
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

/// Subscribers of a single channel
#[derive(Debug, Default)]
pub struct ChannelRegistration {
    subscribers: Vec<Subscriber>,
}

impl ChannelRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Remove by identity. Returns whether the subscriber was present.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn subscriber(on_message: Option<MessageCallback>) -> Subscriber {
        Subscriber {
            id: SubscriptionId(1),
            channel: Channel::Contacts,
            invalidation_keys: Vec::new(),
            on_message,
        }
    }

    #[test]
    fn test_notify_contains_callback_panic() {
        fn reject(_: Value) {
            panic!("bad contact");
        }
        let faulty = subscriber(Some(Arc::new(reject)));
        assert!(!faulty.notify(json!({ "id": 1 })));
        // Still usable afterwards.
        assert!(!faulty.notify(json!({ "id": 2 })));
    }

    #[test]
    fn test_notify_delivers_payload() {
        let inbox = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&inbox);
        let healthy = subscriber(Some(Arc::new(move |payload: Value| {
            sink.lock().unwrap().push(payload)
        })));

        assert!(healthy.notify(json!({ "id": 3 })));
        assert!(subscriber(None).notify(json!({})));
        assert_eq!(*inbox.lock().unwrap(), vec![json!({ "id": 3 })]);
    }
}
