use super::event::InboundEvent;
use crate::channel::{Channel, Subscriber, SubscriptionRegistry};
use crate::infrastructure::CacheInvalidator;
use serde_json::Value;
use std::sync::Arc;

/// Routes decoded inbound frames to the subscribers of the matching channel
pub struct MessageRouter {
    invalidator: Arc<dyn CacheInvalidator>,
}

impl MessageRouter {
    pub fn new(invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self { invalidator }
    }

    /// Decodes and dispatches one text frame. Returns the number of subscribers reached.
    ///
    /// Malformed frames are logged and dropped.
    pub fn route(&self, text: &str, registry: &SubscriptionRegistry) -> usize {
        match InboundEvent::decode(text) {
            Ok(event) => self.dispatch(event, registry),
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {} - Raw: {}", e, text);
                0
            }
        }
    }

    pub fn dispatch(&self, event: InboundEvent, registry: &SubscriptionRegistry) -> usize {
        match event {
            InboundEvent::Pong => {
                tracing::debug!("Received pong");
                0
            }
            InboundEvent::Notification { kind, frame } => {
                tracing::debug!("Routing notification frame: {}", kind.as_str());
                self.deliver(registry.subscribers(Channel::Notifications), frame)
            }
            InboundEvent::EntityChanged {
                entity,
                action,
                payload,
            } => {
                let Ok(channel) = entity.parse::<Channel>() else {
                    tracing::debug!("Ignoring {:?} for unknown entity '{}'", action, entity);
                    return 0;
                };
                tracing::debug!("Routing {:?} on channel {}", action, channel);
                self.deliver(registry.subscribers(channel), payload)
            }
            InboundEvent::Unknown(frame_type) => {
                tracing::debug!("Ignoring frame with unrecognized type '{}'", frame_type);
                0
            }
        }
    }

    fn deliver(&self, subscribers: &[Subscriber], payload: Value) -> usize {
        for subscriber in subscribers {
            for key in &subscriber.invalidation_keys {
                self.invalidator.invalidate(key);
            }
            subscriber.notify(payload.clone());
        }
        subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SubscriptionId;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingInvalidator {
        keys: Mutex<Vec<String>>,
    }

    impl CacheInvalidator for RecordingInvalidator {
        fn invalidate(&self, key: &str) {
            self.keys.lock().unwrap().push(key.to_string());
        }
    }

    type Inbox = Arc<Mutex<Vec<Value>>>;

    fn subscriber(id: u64, channel: Channel, keys: &[&str], inbox: &Inbox) -> Subscriber {
        let inbox = Arc::clone(inbox);
        Subscriber {
            id: SubscriptionId(id),
            channel,
            invalidation_keys: keys.iter().map(|k| k.to_string()).collect(),
            on_message: Some(Arc::new(move |payload: Value| {
                inbox.lock().unwrap().push(payload)
            })),
        }
    }

    fn setup() -> (MessageRouter, Arc<RecordingInvalidator>, SubscriptionRegistry) {
        let invalidator = Arc::new(RecordingInvalidator::default());
        let router = MessageRouter::new(invalidator.clone());
        (router, invalidator, SubscriptionRegistry::new())
    }

    #[test]
    fn test_irregular_plural_payload_delivered() {
        let (router, invalidator, mut registry) = setup();
        let inbox = Inbox::default();
        registry.subscribe(subscriber(1, Channel::Demandes, &["demandes", "dashboard"], &inbox));

        let reached = router.route(
            r#"{"type":"update_demandes","demande":{"id":7}}"#,
            &registry,
        );

        assert_eq!(reached, 1);
        assert_eq!(*inbox.lock().unwrap(), vec![json!({ "id": 7 })]);
        assert_eq!(
            *invalidator.keys.lock().unwrap(),
            vec!["demandes".to_string(), "dashboard".to_string()]
        );
    }

    #[test]
    fn test_default_plural_payload_delivered() {
        let (router, _, mut registry) = setup();
        let inbox = Inbox::default();
        registry.subscribe(subscriber(1, Channel::Leads, &["leads"], &inbox));

        router.route(r#"{"type":"new_leads","lead":{"id":3}}"#, &registry);

        assert_eq!(*inbox.lock().unwrap(), vec![json!({ "id": 3 })]);
    }

    #[test]
    fn test_entity_change_only_reaches_its_channel() {
        let (router, _, mut registry) = setup();
        let leads = Inbox::default();
        let contacts = Inbox::default();
        registry.subscribe(subscriber(1, Channel::Leads, &[], &leads));
        registry.subscribe(subscriber(2, Channel::Contacts, &[], &contacts));

        router.route(r#"{"type":"new_contacts","contact":{"id":5}}"#, &registry);

        assert!(leads.lock().unwrap().is_empty());
        assert_eq!(*contacts.lock().unwrap(), vec![json!({ "id": 5 })]);
    }

    #[test]
    fn test_notification_frames_reach_every_notification_subscriber() {
        let (router, _, mut registry) = setup();
        let first = Inbox::default();
        let second = Inbox::default();
        registry.subscribe(subscriber(1, Channel::Notifications, &["notifications"], &first));
        registry.subscribe(subscriber(2, Channel::Notifications, &[], &second));

        let frames = [
            json!({ "type": "notifications", "items": [] }),
            json!({ "type": "NOTIFICATION_UPDATE", "id": 4 }),
            json!({ "type": "ALL_NOTIFICATIONS_READ" }),
        ];
        for frame in &frames {
            assert_eq!(router.route(&frame.to_string(), &registry), 2);
        }

        assert_eq!(*first.lock().unwrap(), frames.to_vec());
        assert_eq!(*second.lock().unwrap(), frames.to_vec());
    }

    #[test]
    fn test_pong_does_not_touch_subscribers() {
        let (router, invalidator, mut registry) = setup();
        let inbox = Inbox::default();
        registry.subscribe(subscriber(1, Channel::Notifications, &["notifications"], &inbox));

        assert_eq!(router.route(r#"{"type":"pong"}"#, &registry), 0);
        assert!(inbox.lock().unwrap().is_empty());
        assert!(invalidator.keys.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_and_unknown_frames_are_dropped() {
        let (router, invalidator, mut registry) = setup();
        let inbox = Inbox::default();
        registry.subscribe(subscriber(1, Channel::Leads, &["leads"], &inbox));

        assert_eq!(router.route("{oops", &registry), 0);
        assert_eq!(router.route(r#"{"type":"presence"}"#, &registry), 0);
        assert_eq!(router.route(r#"{"type":"new_invoices","invoice":{}}"#, &registry), 0);
        assert!(inbox.lock().unwrap().is_empty());
        assert!(invalidator.keys.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_the_rest() {
        fn reject(_: Value) {
            panic!("collaborator bug");
        }
        let (router, invalidator, mut registry) = setup();
        let healthy = Inbox::default();
        registry.subscribe(Subscriber {
            id: SubscriptionId(1),
            channel: Channel::Contacts,
            invalidation_keys: vec!["contacts".to_string()],
            on_message: Some(Arc::new(reject)),
        });
        registry.subscribe(subscriber(2, Channel::Contacts, &["contacts-stats"], &healthy));

        let reached = router.route(r#"{"type":"new_contacts","contact":{"id":1}}"#, &registry);
        router.route(r#"{"type":"update_contacts","contact":{"id":2}}"#, &registry);

        assert_eq!(reached, 2);
        assert_eq!(
            *healthy.lock().unwrap(),
            vec![json!({ "id": 1 }), json!({ "id": 2 })]
        );
        assert_eq!(invalidator.keys.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_subscriber_without_callback_still_invalidates() {
        let (router, invalidator, mut registry) = setup();
        registry.subscribe(Subscriber {
            id: SubscriptionId(1),
            channel: Channel::Paiements,
            invalidation_keys: vec!["paiements".to_string()],
            on_message: None,
        });

        router.route(r#"{"type":"new_paiements","paiement":{"id":1}}"#, &registry);

        assert_eq!(*invalidator.keys.lock().unwrap(), vec!["paiements".to_string()]);
    }
}
