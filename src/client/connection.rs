use crate::channel::SubscriptionRegistry;
use crate::infrastructure::ReconnectPolicy;
use crate::types::OutboundFrame;
use crate::types::constants::{DEFAULT_CONNECT_TIMEOUT, HEARTBEAT_INTERVAL};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    /// Transition table
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Closed, Connecting)
                | (Connecting, Open)
                | (Connecting, Closing)
                | (Connecting, Closed)
                | (Open, Closing)
                | (Open, Closed)
                | (Closing, Closed)
        )
    }
}

/// Timers owned by the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// One-shot; force-closes a transport that did not open in time
    ConnectTimeout,
    /// Periodic ping while open
    Heartbeat,
    /// One-shot backoff before the next automatic attempt
    Reconnect,
}

/// User-visible terminal conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    /// Automatic reconnection gave up; call `reconnect()` to try again
    RetriesExhausted { attempts: u32 },
}

/// Something that happened to the transport or one of its timers.
///
/// Transport events carry the generation of the transport that produced them;
/// anything from a replaced generation is discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened { generation: u64 },
    Frame { generation: u64, text: String },
    Errored { generation: u64, error: String },
    Closed { generation: u64, code: Option<u16> },
    /// The transport could not even be constructed (e.g. invalid endpoint)
    Failed { generation: u64, error: String },
    ConnectTimeout,
    HeartbeatDue,
    ReconnectDue,
}

/// Side effect requested by the state machine, executed by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    OpenTransport { generation: u64 },
    CloseTransport { generation: u64 },
    Send { generation: u64, frame: OutboundFrame },
    ArmTimer { kind: TimerKind, delay: Duration },
    CancelTimer(TimerKind),
    Notify(ConnectionNotice),
}

/// Owns the connection state, the transport generation and the reconnect
/// attempt counter. Pure: every input returns the actions to perform.
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    generation: u64,
    attempts: u32,
    connect_in_flight: bool,
    reconnect_pending: bool,
    exhausted: bool,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    heartbeat_interval: Duration,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Closed,
            generation: 0,
            attempts: 0,
            connect_in_flight: false,
            reconnect_pending: false,
            exhausted: false,
            policy,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Generation of the newest transport
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn connect_in_flight(&self) -> bool {
        self.connect_in_flight
    }

    /// Whether a frame from transport `generation` may be routed
    pub fn accepts_frame(&self, generation: u64) -> bool {
        generation == self.generation && self.state == ConnectionState::Open
    }

    fn transition(&mut self, next: ConnectionState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!("Refusing illegal transition {:?} -> {:?}", self.state, next);
            return false;
        }
        tracing::debug!("Connection state {:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }

    fn cancel_reconnect(&mut self, actions: &mut Vec<ConnectionAction>) {
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(ConnectionAction::CancelTimer(TimerKind::Reconnect));
        }
    }

    /// Opens a new transport unless an attempt is already in flight.
    ///
    /// A transport that is not yet closed is closed first.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.connect_in_flight {
            tracing::debug!("Connection attempt already in flight");
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.cancel_reconnect(&mut actions);

        if self.state != ConnectionState::Closed {
            actions.push(ConnectionAction::CancelTimer(TimerKind::Heartbeat));
            actions.push(ConnectionAction::CloseTransport {
                generation: self.generation,
            });
            self.transition(ConnectionState::Closed);
        }

        self.generation += 1;
        self.connect_in_flight = true;
        self.transition(ConnectionState::Connecting);
        tracing::info!(
            "Connecting (transport #{}, attempt {})",
            self.generation,
            self.attempts
        );

        actions.push(ConnectionAction::OpenTransport {
            generation: self.generation,
        });
        actions.push(ConnectionAction::ArmTimer {
            kind: TimerKind::ConnectTimeout,
            delay: self.connect_timeout,
        });
        actions
    }

    /// Closes the transport and clears every timer. No-op once closed.
    pub fn close(&mut self) -> Vec<ConnectionAction> {
        self.reconnect_pending = false;
        let mut actions = vec![
            ConnectionAction::CancelTimer(TimerKind::ConnectTimeout),
            ConnectionAction::CancelTimer(TimerKind::Heartbeat),
            ConnectionAction::CancelTimer(TimerKind::Reconnect),
        ];

        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            self.transition(ConnectionState::Closing);
            self.connect_in_flight = false;
            actions.push(ConnectionAction::CloseTransport {
                generation: self.generation,
            });
        }
        actions
    }

    /// Manual recovery: resets the attempt counter and connects immediately.
    pub fn reconnect(&mut self) -> Vec<ConnectionAction> {
        tracing::info!("Manual reconnect requested");
        let mut actions = Vec::new();
        self.cancel_reconnect(&mut actions);
        self.attempts = 0;
        self.exhausted = false;
        actions.extend(self.connect());
        actions
    }

    /// Feeds a transport or timer event.
    ///
    /// `Frame` events are not consumed here; see [`accepts_frame`](Self::accepts_frame).
    pub fn handle_event(
        &mut self,
        event: ConnectionEvent,
        registry: &SubscriptionRegistry,
    ) -> Vec<ConnectionAction> {
        match event {
            ConnectionEvent::Opened { generation } => self.on_opened(generation, registry),
            ConnectionEvent::Frame { .. } => Vec::new(),
            ConnectionEvent::Errored { generation, error } => {
                // The close that follows drives recovery.
                tracing::warn!("Transport #{} error: {}", generation, error);
                Vec::new()
            }
            ConnectionEvent::Closed { generation, code } => {
                self.on_closed(generation, code, registry)
            }
            ConnectionEvent::Failed { generation, error } => self.on_failed(generation, &error),
            ConnectionEvent::ConnectTimeout => self.on_connect_timeout(registry),
            ConnectionEvent::HeartbeatDue => self.on_heartbeat(),
            ConnectionEvent::ReconnectDue => self.on_reconnect_due(registry),
        }
    }

    fn on_opened(
        &mut self,
        generation: u64,
        registry: &SubscriptionRegistry,
    ) -> Vec<ConnectionAction> {
        if generation != self.generation {
            tracing::debug!("Discarding open of replaced transport #{}", generation);
            return vec![ConnectionAction::CloseTransport { generation }];
        }
        if self.state != ConnectionState::Connecting {
            tracing::debug!("Ignoring open while {:?}", self.state);
            return Vec::new();
        }

        self.transition(ConnectionState::Open);
        self.connect_in_flight = false;
        self.attempts = 0;
        self.exhausted = false;
        tracing::info!("Connected (transport #{})", generation);

        let mut actions = vec![ConnectionAction::CancelTimer(TimerKind::ConnectTimeout)];
        self.cancel_reconnect(&mut actions);

        let mut channels: Vec<_> = registry.channels().collect();
        channels.sort();
        for channel in channels {
            actions.push(ConnectionAction::Send {
                generation,
                frame: OutboundFrame::subscribe(channel),
            });
        }

        actions.push(ConnectionAction::ArmTimer {
            kind: TimerKind::Heartbeat,
            delay: self.heartbeat_interval,
        });
        actions
    }

    fn on_closed(
        &mut self,
        generation: u64,
        code: Option<u16>,
        registry: &SubscriptionRegistry,
    ) -> Vec<ConnectionAction> {
        if generation != self.generation || self.state == ConnectionState::Closed {
            tracing::debug!("Ignoring close of transport #{} ({:?})", generation, code);
            return Vec::new();
        }

        let intentional = self.state == ConnectionState::Closing;
        self.transition(ConnectionState::Closed);
        self.connect_in_flight = false;
        tracing::info!("Transport #{} closed (code={:?})", generation, code);

        let mut actions = vec![
            ConnectionAction::CancelTimer(TimerKind::Heartbeat),
            ConnectionAction::CancelTimer(TimerKind::ConnectTimeout),
        ];
        if !intentional {
            actions.extend(self.schedule_reconnect(registry));
        }
        actions
    }

    fn on_failed(&mut self, generation: u64, error: &str) -> Vec<ConnectionAction> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        tracing::error!("Failed to create transport #{}: {}", generation, error);
        self.transition(ConnectionState::Closed);
        self.connect_in_flight = false;
        vec![ConnectionAction::CancelTimer(TimerKind::ConnectTimeout)]
    }

    fn on_connect_timeout(&mut self, registry: &SubscriptionRegistry) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        tracing::warn!(
            "Transport #{} did not open within {:?}, closing",
            self.generation,
            self.connect_timeout
        );
        let mut actions = vec![ConnectionAction::CloseTransport {
            generation: self.generation,
        }];
        self.transition(ConnectionState::Closed);
        self.connect_in_flight = false;
        actions.extend(self.schedule_reconnect(registry));
        actions
    }

    fn on_heartbeat(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Open {
            tracing::debug!("Skipping heartbeat while {:?}", self.state);
            return Vec::new();
        }
        vec![ConnectionAction::Send {
            generation: self.generation,
            frame: OutboundFrame::ping(),
        }]
    }

    fn on_reconnect_due(&mut self, registry: &SubscriptionRegistry) -> Vec<ConnectionAction> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        if registry.is_empty() {
            tracing::debug!("Reconnect due but no active subscriptions");
            return Vec::new();
        }
        self.connect()
    }

    fn schedule_reconnect(&mut self, registry: &SubscriptionRegistry) -> Vec<ConnectionAction> {
        if registry.is_empty() {
            tracing::debug!("No active subscriptions, not reconnecting");
            return Vec::new();
        }

        if self.policy.should_retry(self.attempts) {
            let delay = self.policy.compute_delay(self.attempts);
            self.attempts += 1;
            self.reconnect_pending = true;
            tracing::info!(
                "Reconnecting in {:?} (attempt {}/{})",
                delay,
                self.attempts,
                self.policy.config().max_attempts
            );
            return vec![ConnectionAction::ArmTimer {
                kind: TimerKind::Reconnect,
                delay,
            }];
        }

        if self.exhausted {
            return Vec::new();
        }
        self.exhausted = true;
        tracing::error!(
            "Giving up after {} reconnection attempts; call reconnect() to retry",
            self.attempts
        );
        vec![ConnectionAction::Notify(ConnectionNotice::RetriesExhausted {
            attempts: self.attempts,
        })]
    }
}
