use super::connection::{
    ConnectionAction, ConnectionEvent, ConnectionNotice, ConnectionState, TimerKind,
};
use super::state::{ClientState, ConnectionStatus};
use crate::channel::{Subscriber, SubscriptionToken};
use crate::infrastructure::{HeartbeatManager, TaskManager, TokenStore};
use crate::types::OutboundFrame;
use crate::types::constants::WS_CLOSE_NORMAL;
use crate::websocket::{Endpoint, WebSocketFactory, WsStream};
use futures::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;

type WsWriter = SplitSink<WsStream, Message>;

/// Queue feeding a transport's writer task; dropping it closes the socket.
type FrameSender = mpsc::UnboundedSender<Message>;

/// Requests from client and subscription handles
pub(crate) enum Command {
    Subscribe(Subscriber),
    Unsubscribe(SubscriptionToken),
    Reconnect(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<()>),
}

/// Background tasks owned by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DriverTask {
    Transport,
    Timer(TimerKind),
}

/// Messages from transport and timer tasks back to the driver
enum DriverEvent {
    Connection(ConnectionEvent),
    /// Frame queue of a freshly opened transport; always precedes its `Opened`
    Writer { generation: u64, frames: FrameSender },
    Timer { kind: TimerKind, token: u64 },
}

/// Single task that owns [`ClientState`] and performs the I/O its actions ask for.
///
/// All state changes happen on this task, one event at a time.
pub(crate) struct Driver {
    state: ClientState,
    endpoint: Endpoint,
    token_store: Arc<dyn TokenStore>,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<DriverEvent>,
    events_rx: mpsc::UnboundedReceiver<DriverEvent>,
    tasks: TaskManager<DriverTask>,
    transport_generation: Option<u64>,
    writer: Option<(u64, FrameSender)>,
    status_tx: watch::Sender<ConnectionStatus>,
    notices_tx: broadcast::Sender<ConnectionNotice>,
}

impl Driver {
    pub(crate) fn new(
        state: ClientState,
        endpoint: Endpoint,
        token_store: Arc<dyn TokenStore>,
        commands: mpsc::UnboundedReceiver<Command>,
        status_tx: watch::Sender<ConnectionStatus>,
        notices_tx: broadcast::Sender<ConnectionNotice>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state,
            endpoint,
            token_store,
            commands,
            events_tx,
            events_rx,
            tasks: TaskManager::new(),
            transport_generation: None,
            writer: None,
            status_tx,
            notices_tx,
        }
    }

    /// Runs until shutdown is requested or every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::debug!("Realtime driver started");
        let mut shutdown_reply = None;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("All client handles dropped");
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
            self.publish_status();
        }

        self.commands.close();
        self.teardown();
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        tracing::info!("Realtime driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(subscriber) => {
                let actions = self.state.subscribe(subscriber);
                self.execute(actions);
            }
            Command::Unsubscribe(token) => {
                let actions = self.state.unsubscribe(&token);
                self.execute(actions);
            }
            Command::Reconnect(reply) => {
                let issued = match self.state.reconnect() {
                    Some(actions) => {
                        self.execute(actions);
                        true
                    }
                    None => false,
                };
                self.publish_status();
                let _ = reply.send(issued);
            }
            Command::Shutdown(_) => {}
        }
    }

    fn handle_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Writer { generation, frames } => {
                if self.transport_generation == Some(generation) {
                    self.writer = Some((generation, frames));
                } else {
                    tracing::debug!("Closing writer of abandoned transport #{}", generation);
                }
            }
            DriverEvent::Timer { kind, token } => {
                let key = DriverTask::Timer(kind);
                let current = match kind {
                    TimerKind::Heartbeat => self.tasks.is_current(key, token),
                    TimerKind::ConnectTimeout | TimerKind::Reconnect => {
                        self.tasks.complete(key, token)
                    }
                };
                if !current {
                    tracing::debug!("Ignoring stale {:?} timer", kind);
                    return;
                }
                let event = match kind {
                    TimerKind::ConnectTimeout => ConnectionEvent::ConnectTimeout,
                    TimerKind::Heartbeat => ConnectionEvent::HeartbeatDue,
                    TimerKind::Reconnect => ConnectionEvent::ReconnectDue,
                };
                let actions = self.state.handle_event(event);
                self.execute(actions);
            }
            DriverEvent::Connection(event) => {
                if let ConnectionEvent::Closed { generation, .. } = &event {
                    self.release_transport(*generation);
                }
                let actions = self.state.handle_event(event);
                self.execute(actions);
            }
        }
    }

    fn execute(&mut self, actions: Vec<ConnectionAction>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                ConnectionAction::OpenTransport { generation } => self.open_transport(generation),
                ConnectionAction::CloseTransport { generation } => {
                    self.close_transport(generation);
                    // The reader was aborted, so its close never arrives.
                    queue.extend(self.state.handle_event(ConnectionEvent::Closed {
                        generation,
                        code: Some(WS_CLOSE_NORMAL),
                    }));
                }
                ConnectionAction::Send { generation, frame } => self.send(generation, &frame),
                ConnectionAction::ArmTimer { kind, delay } => self.arm_timer(kind, delay),
                ConnectionAction::CancelTimer(kind) => {
                    self.tasks.abort(DriverTask::Timer(kind));
                }
                ConnectionAction::Notify(notice) => {
                    if self.notices_tx.send(notice).is_err() {
                        tracing::debug!("No notice listeners");
                    }
                }
            }
        }
    }

    fn open_transport(&mut self, generation: u64) {
        self.writer = None;
        self.transport_generation = Some(generation);

        let endpoint = self.endpoint.clone();
        let token_store = Arc::clone(&self.token_store);
        let events = self.events_tx.clone();
        self.tasks.spawn(DriverTask::Transport, move |_| {
            run_transport(generation, endpoint, token_store, events)
        });
    }

    fn close_transport(&mut self, generation: u64) {
        if self.transport_generation == Some(generation) {
            self.tasks.abort(DriverTask::Transport);
            self.transport_generation = None;
        }
        if matches!(&self.writer, Some((current, _)) if *current == generation) {
            tracing::debug!("Closing transport #{}", generation);
            self.writer = None;
        }
    }

    /// Forgets a transport whose reader already observed the close.
    fn release_transport(&mut self, generation: u64) {
        if self.transport_generation == Some(generation) {
            self.transport_generation = None;
        }
        if matches!(&self.writer, Some((current, _)) if *current == generation) {
            self.writer = None;
        }
    }

    /// Queues a frame on the transport's writer task without waiting for the socket.
    fn send(&self, generation: u64, frame: &OutboundFrame) {
        let Some((current, frames)) = &self.writer else {
            tracing::debug!("No open transport, dropping {:?}", frame);
            return;
        };
        if *current != generation {
            tracing::debug!("Dropping frame for replaced transport #{}", generation);
            return;
        }

        let text = match frame.to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode frame: {}", e);
                return;
            }
        };
        tracing::debug!("Sending frame: {}", text);
        if frames.send(Message::Text(text.into())).is_err() {
            // The reader reports the close that follows.
            tracing::warn!("Writer of transport #{} is gone, frame dropped", generation);
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, delay: Duration) {
        let events = self.events_tx.clone();
        let key = DriverTask::Timer(kind);

        match kind {
            TimerKind::Heartbeat => {
                self.tasks.spawn(key, move |token| {
                    HeartbeatManager::new(events)
                        .with_interval(delay)
                        .run(move || DriverEvent::Timer { kind, token })
                });
            }
            TimerKind::ConnectTimeout | TimerKind::Reconnect => {
                self.tasks.spawn(key, move |token| async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(DriverEvent::Timer { kind, token });
                });
            }
        }
    }

    fn publish_status(&self) {
        let status = self.state.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn teardown(&mut self) {
        let actions = self.state.close();
        self.execute(actions);
        self.tasks.abort_all();
        self.writer = None;
        self.publish_status();
    }
}

impl Drop for Driver {
    /// Status watchers never see `Open` once the driver is gone, whatever ended it.
    fn drop(&mut self) {
        self.status_tx.send_if_modified(|current| {
            if current.state == ConnectionState::Closed {
                false
            } else {
                current.state = ConnectionState::Closed;
                true
            }
        });
    }
}

/// Drains queued frames into the socket, then closes it once every sender is gone.
async fn run_writer(
    generation: u64,
    mut writer: WsWriter,
    mut frames: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = frames.recv().await {
        if let Err(e) = writer.send(message).await {
            tracing::warn!("Failed to send frame on transport #{}: {}", generation, e);
            return;
        }
    }
    if let Err(e) = writer.close().await {
        tracing::debug!("Error while closing transport #{}: {}", generation, e);
    }
}

/// Opens one transport and forwards everything it produces, tagged with `generation`.
async fn run_transport(
    generation: u64,
    endpoint: Endpoint,
    token_store: Arc<dyn TokenStore>,
    events: mpsc::UnboundedSender<DriverEvent>,
) {
    let emit = |event: ConnectionEvent| {
        let _ = events.send(DriverEvent::Connection(event));
    };

    let token = token_store.token();
    let timestamp = chrono::Utc::now().timestamp_millis();
    let url = match endpoint.url(token.as_deref(), timestamp) {
        Ok(url) => url,
        Err(e) => {
            emit(ConnectionEvent::Failed {
                generation,
                error: e.to_string(),
            });
            return;
        }
    };

    tracing::info!(
        "Opening transport #{} to {}://{}",
        generation,
        endpoint.scheme(),
        endpoint.host
    );
    let stream = match WebSocketFactory::create(&url).await {
        Ok(stream) => stream,
        Err(e) => {
            emit(ConnectionEvent::Errored {
                generation,
                error: e.to_string(),
            });
            emit(ConnectionEvent::Closed {
                generation,
                code: None,
            });
            return;
        }
    };

    let (writer, mut reader) = stream.split();
    let (frames, queued) = mpsc::unbounded_channel();
    tokio::spawn(run_writer(generation, writer, queued));
    let _ = events.send(DriverEvent::Writer { generation, frames });
    emit(ConnectionEvent::Opened { generation });

    while let Some(msg_result) = reader.next().await {
        match msg_result {
            Ok(Message::Text(text)) => emit(ConnectionEvent::Frame {
                generation,
                text: text.as_str().to_owned(),
            }),
            Ok(Message::Close(frame)) => {
                let code = frame.as_ref().map(|f| u16::from(f.code));
                match &frame {
                    Some(close_frame) => tracing::info!(
                        "Server closed transport #{}: code={:?}, reason='{}'",
                        generation,
                        code,
                        close_frame.reason.as_str()
                    ),
                    None => tracing::warn!(
                        "Server closed transport #{} without close frame",
                        generation
                    ),
                }
                emit(ConnectionEvent::Closed { generation, code });
                return;
            }
            Ok(Message::Ping(data)) => {
                tracing::debug!("Received ping ({} bytes)", data.len());
            }
            Ok(Message::Pong(data)) => {
                tracing::debug!("Received pong ({} bytes)", data.len());
            }
            Ok(Message::Binary(data)) => {
                tracing::warn!("Received unexpected binary message ({} bytes)", data.len());
            }
            Ok(Message::Frame(_)) => {
                tracing::debug!("Received raw frame (internal)");
            }
            Err(e) => {
                emit(ConnectionEvent::Errored {
                    generation,
                    error: e.to_string(),
                });
                break;
            }
        }
    }

    emit(ConnectionEvent::Closed {
        generation,
        code: None,
    });
}
