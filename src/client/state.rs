use super::connection::{ConnectionAction, ConnectionEvent, ConnectionManager, ConnectionState};
use crate::channel::{Channel, Subscriber, SubscriptionRegistry, SubscriptionToken};
use crate::messaging::MessageRouter;
use crate::types::OutboundFrame;

/// Snapshot of the connection published to status watchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub retries_exhausted: bool,
    pub active_channels: Vec<Channel>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            reconnect_attempts: 0,
            retries_exhausted: false,
            active_channels: Vec::new(),
        }
    }
}

/// Everything the driver task owns: connection, registry and router.
///
/// Registry changes are translated into connection actions here so that the
/// subscribe/unsubscribe frame rules live in one place.
pub struct ClientState {
    pub connection: ConnectionManager,
    pub registry: SubscriptionRegistry,
    pub router: MessageRouter,
}

impl ClientState {
    pub fn new(connection: ConnectionManager, router: MessageRouter) -> Self {
        Self {
            connection,
            registry: SubscriptionRegistry::new(),
            router,
        }
    }

    /// Registers a subscriber and connects on demand
    pub fn subscribe(&mut self, subscriber: Subscriber) -> Vec<ConnectionAction> {
        let channel = subscriber.channel;
        let first = self.registry.subscribe(subscriber);
        tracing::debug!(
            "Subscribed to {} ({} subscribers)",
            channel,
            self.registry.subscriber_count(channel)
        );

        match self.connection.state() {
            ConnectionState::Open if first => vec![ConnectionAction::Send {
                generation: self.connection.generation(),
                frame: OutboundFrame::subscribe(channel),
            }],
            ConnectionState::Open => Vec::new(),
            // Replayed when the transport opens.
            ConnectionState::Connecting => Vec::new(),
            ConnectionState::Closing => self.connection.connect(),
            ConnectionState::Closed if self.connection.reconnect_pending() => Vec::new(),
            ConnectionState::Closed => self.connection.connect(),
        }
    }

    /// Removes a subscriber. Emits `unsubscribe` when its channel empties and
    /// closes the transport once nothing is subscribed at all.
    pub fn unsubscribe(&mut self, token: &SubscriptionToken) -> Vec<ConnectionAction> {
        let Some(outcome) = self.registry.unsubscribe(token) else {
            tracing::debug!("Unknown subscription {} on {}", token.id, token.channel);
            return Vec::new();
        };

        let mut actions = Vec::new();
        if outcome.channel_emptied && self.connection.is_connected() {
            actions.push(ConnectionAction::Send {
                generation: self.connection.generation(),
                frame: OutboundFrame::unsubscribe(token.channel),
            });
        }
        if outcome.registry_emptied {
            tracing::info!("No active subscriptions left, closing connection");
            actions.extend(self.connection.close());
        }
        actions
    }

    /// Feeds a transport or timer event; inbound frames are routed here.
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Vec<ConnectionAction> {
        if let ConnectionEvent::Frame { generation, text } = &event {
            if self.connection.accepts_frame(*generation) {
                self.router.route(text, &self.registry);
            } else {
                tracing::debug!("Discarding frame from stale transport #{}", generation);
            }
            return Vec::new();
        }

        self.connection.handle_event(event, &self.registry)
    }

    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        self.connection.connect()
    }

    /// Manual reconnect. `None` when there is nothing to connect for.
    pub fn reconnect(&mut self) -> Option<Vec<ConnectionAction>> {
        if self.registry.is_empty() {
            tracing::info!("Manual reconnect ignored: no active subscriptions");
            return None;
        }
        Some(self.connection.reconnect())
    }

    pub fn close(&mut self) -> Vec<ConnectionAction> {
        self.connection.close()
    }

    pub fn status(&self) -> ConnectionStatus {
        let mut active_channels: Vec<_> = self.registry.channels().collect();
        active_channels.sort();
        ConnectionStatus {
            state: self.connection.state(),
            reconnect_attempts: self.connection.attempts(),
            retries_exhausted: self.connection.is_exhausted(),
            active_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SubscriptionId;
    use crate::client::connection::TimerKind;
    use crate::infrastructure::{FixedJitter, QueryCache, ReconnectConfig, ReconnectPolicy};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Inbox = Arc<Mutex<Vec<Value>>>;

    fn client_state() -> (ClientState, Arc<QueryCache>) {
        let policy = ReconnectPolicy::with_jitter(
            ReconnectConfig::default(),
            Box::new(FixedJitter(Duration::ZERO)),
        );
        let cache = Arc::new(QueryCache::new());
        let state = ClientState::new(
            ConnectionManager::new(policy),
            MessageRouter::new(cache.clone()),
        );
        (state, cache)
    }

    fn subscriber(id: u64, channel: Channel, inbox: Option<&Inbox>) -> Subscriber {
        let on_message = inbox.map(|inbox| {
            let inbox = inbox.clone();
            Arc::new(move |payload: Value| inbox.lock().unwrap().push(payload))
                as crate::channel::MessageCallback
        });
        Subscriber {
            id: SubscriptionId(id),
            channel,
            invalidation_keys: vec![format!("{}-list", channel)],
            on_message,
        }
    }

    fn subscribe_frames(actions: &[ConnectionAction]) -> Vec<Channel> {
        actions
            .iter()
            .filter_map(|action| match action {
                ConnectionAction::Send {
                    frame: OutboundFrame::Subscribe { data_type },
                    ..
                } => Some(*data_type),
                _ => None,
            })
            .collect()
    }

    fn open(state: &mut ClientState) -> Vec<ConnectionAction> {
        let generation = state.connection.generation();
        state.handle_event(ConnectionEvent::Opened { generation })
    }

    fn frame(state: &mut ClientState, text: &str) {
        let generation = state.connection.generation();
        state.handle_event(ConnectionEvent::Frame {
            generation,
            text: text.to_string(),
        });
    }

    #[test]
    fn test_first_subscribe_connects_lazily() {
        let (mut state, _) = client_state();
        assert_eq!(state.connection.state(), ConnectionState::Closed);

        let actions = state.subscribe(subscriber(1, Channel::Leads, None));

        assert!(actions.contains(&ConnectionAction::OpenTransport { generation: 1 }));
        assert_eq!(state.connection.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_two_subscribes_before_open_send_one_frame() {
        let (mut state, _) = client_state();
        let mut frames = subscribe_frames(&state.subscribe(subscriber(1, Channel::Leads, None)));
        frames.extend(subscribe_frames(&state.subscribe(subscriber(2, Channel::Leads, None))));
        frames.extend(subscribe_frames(&open(&mut state)));

        assert_eq!(frames, vec![Channel::Leads]);
    }

    #[test]
    fn test_subscribe_while_open_sends_frame_for_first_only() {
        let (mut state, _) = client_state();
        state.subscribe(subscriber(1, Channel::Leads, None));
        open(&mut state);

        let actions = state.subscribe(subscriber(2, Channel::Contacts, None));
        assert_eq!(subscribe_frames(&actions), vec![Channel::Contacts]);

        let actions = state.subscribe(subscriber(3, Channel::Contacts, None));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_subscribe_while_reconnect_pending_waits_for_timer() {
        let (mut state, _) = client_state();
        state.subscribe(subscriber(1, Channel::Leads, None));
        open(&mut state);
        let generation = state.connection.generation();
        state.handle_event(ConnectionEvent::Closed {
            generation,
            code: Some(1006),
        });
        assert!(state.connection.reconnect_pending());

        let actions = state.subscribe(subscriber(2, Channel::Emails, None));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_routes_entity_frames_and_invalidates() {
        let (mut state, cache) = client_state();
        let inbox = Inbox::default();
        state.subscribe(subscriber(1, Channel::Leads, Some(&inbox)));
        open(&mut state);
        cache.insert("leads-list", json!([]));

        frame(&mut state, r#"{"type":"new_leads","lead":{"id":3}}"#);

        assert_eq!(*inbox.lock().unwrap(), vec![json!({"id": 3})]);
        assert!(cache.is_stale("leads-list"));
    }

    #[test]
    fn test_frames_from_stale_transport_are_dropped() {
        let (mut state, _) = client_state();
        let inbox = Inbox::default();
        state.subscribe(subscriber(1, Channel::Leads, Some(&inbox)));
        open(&mut state);
        state.connect();

        state.handle_event(ConnectionEvent::Frame {
            generation: 1,
            text: r#"{"type":"new_leads","lead":{"id":3}}"#.to_string(),
        });

        assert!(inbox.lock().unwrap().is_empty());
    }

    #[test]
    fn test_notifications_survive_partial_unsubscribe() {
        let (mut state, _) = client_state();
        let first = Inbox::default();
        let second = Inbox::default();
        let sub_a = subscriber(1, Channel::Notifications, Some(&first));
        let sub_b = subscriber(2, Channel::Notifications, Some(&second));
        let token_a = sub_a.token();
        state.subscribe(sub_a);
        state.subscribe(sub_b);
        open(&mut state);

        let actions = state.unsubscribe(&token_a);
        assert!(actions.is_empty());
        assert!(state.connection.is_connected());

        frame(&mut state, r#"{"type":"NOTIFICATION_UPDATE","id":1}"#);

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_emptied_channel_unsubscribes_but_keeps_transport() {
        let (mut state, _) = client_state();
        let leads = subscriber(1, Channel::Leads, None);
        let token = leads.token();
        state.subscribe(leads);
        state.subscribe(subscriber(2, Channel::Contacts, None));
        open(&mut state);

        let actions = state.unsubscribe(&token);

        assert_eq!(
            actions,
            vec![ConnectionAction::Send {
                generation: 1,
                frame: OutboundFrame::unsubscribe(Channel::Leads),
            }]
        );
        assert!(state.connection.is_connected());
    }

    #[test]
    fn test_last_unsubscribe_closes_transport() {
        let (mut state, _) = client_state();
        let leads = subscriber(1, Channel::Leads, None);
        let token = leads.token();
        state.subscribe(leads);
        open(&mut state);

        let actions = state.unsubscribe(&token);

        assert_eq!(
            actions[0],
            ConnectionAction::Send {
                generation: 1,
                frame: OutboundFrame::unsubscribe(Channel::Leads),
            }
        );
        assert!(actions.contains(&ConnectionAction::CloseTransport { generation: 1 }));
        assert!(actions.contains(&ConnectionAction::CancelTimer(TimerKind::Heartbeat)));
        assert_eq!(state.connection.state(), ConnectionState::Closing);
    }

    #[test]
    fn test_unsubscribe_twice_is_harmless() {
        let (mut state, _) = client_state();
        let leads = subscriber(1, Channel::Leads, None);
        let token = leads.token();
        state.subscribe(leads);
        state.unsubscribe(&token);
        assert!(state.unsubscribe(&token).is_empty());
    }

    #[test]
    fn test_unsubscribe_while_connecting_abandons_attempt() {
        let (mut state, _) = client_state();
        let leads = subscriber(1, Channel::Leads, None);
        let token = leads.token();
        state.subscribe(leads);

        let actions = state.unsubscribe(&token);
        assert!(actions.contains(&ConnectionAction::CloseTransport { generation: 1 }));
        assert_eq!(state.connection.state(), ConnectionState::Closing);

        assert!(open(&mut state).is_empty());
        let actions = state.handle_event(ConnectionEvent::Closed {
            generation: 1,
            code: None,
        });
        assert_eq!(state.connection.state(), ConnectionState::Closed);
        assert!(!actions.iter().any(|a| matches!(a, ConnectionAction::ArmTimer { .. })));
    }

    #[test]
    fn test_manual_reconnect_requires_subscriptions() {
        let (mut state, _) = client_state();
        assert!(state.reconnect().is_none());

        state.subscribe(subscriber(1, Channel::Dashboard, None));
        let actions = state.reconnect().unwrap();
        assert!(actions.iter().any(|a| matches!(a, ConnectionAction::OpenTransport { .. })));
    }

    #[test]
    fn test_status_snapshot() {
        let (mut state, _) = client_state();
        state.subscribe(subscriber(1, Channel::Leads, None));
        state.subscribe(subscriber(2, Channel::Contacts, None));
        open(&mut state);

        let status = state.status();
        assert!(status.is_connected());
        assert_eq!(status.reconnect_attempts, 0);
        assert!(!status.retries_exhausted);
        assert_eq!(status.active_channels, vec![Channel::Contacts, Channel::Leads]);
    }
}
