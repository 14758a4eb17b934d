use super::connection::ConnectionNotice;
use super::driver::Command;
use super::state::ConnectionStatus;
use super::subscription::{Subscription, SubscriptionDescriptor};
use super::{RealtimeClientBuilder, RealtimeClientOptions};
use crate::channel::SubscriptionId;
use crate::types::{RealtimeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

struct ClientInner {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    notices: broadcast::Sender<ConnectionNotice>,
    next_id: AtomicU64,
}

/// The context object collaborators share to receive realtime updates.
///
/// Build it once at the application root and hand out clones: all clones
/// share one transport, one heartbeat and one reconnect schedule. The
/// connection is opened by the first subscription and closed when the last
/// one goes away.
///
/// # Example
///
/// ```no_run
/// use realtime_sync_rs::{Channel, RealtimeClient, RealtimeClientOptions, SubscriptionDescriptor};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(RealtimeClientOptions::new("crm.example.com"))?;
///
/// let leads = client.subscribe(
///     SubscriptionDescriptor::new(Channel::Leads)
///         .invalidate(["leads"])
///         .on_message(|lead| println!("lead: {lead}")),
/// )?;
///
/// // ...
/// leads.unsubscribe();
/// client.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

impl RealtimeClient {
    /// Creates a client with default collaborators. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if the options are invalid.
    pub fn new(options: RealtimeClientOptions) -> Result<Self> {
        RealtimeClientBuilder::new(options).map(RealtimeClientBuilder::build)
    }

    pub fn builder(options: RealtimeClientOptions) -> Result<RealtimeClientBuilder> {
        RealtimeClientBuilder::new(options)
    }

    pub(crate) fn from_parts(
        commands: mpsc::UnboundedSender<Command>,
        status: watch::Receiver<ConnectionStatus>,
        notices: broadcast::Sender<ConnectionNotice>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                commands,
                status,
                notices,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers interest in a channel, connecting on demand.
    ///
    /// Never blocks; the returned handle unsubscribes when redeemed or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ClientShutdown`] after [`shutdown`](Self::shutdown).
    pub fn subscribe(&self, descriptor: SubscriptionDescriptor) -> Result<Subscription> {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = descriptor.into_subscriber(id);
        let token = subscriber.token();

        self.inner
            .commands
            .send(Command::Subscribe(subscriber))
            .map_err(|_| RealtimeError::ClientShutdown)?;
        tracing::debug!("Registered {} on {}", id, token.channel);

        Ok(Subscription::new(token, self.inner.commands.clone()))
    }

    /// Same as [`Subscription::unsubscribe`]
    pub fn unsubscribe(&self, subscription: Subscription) {
        subscription.unsubscribe();
    }

    /// True iff the transport is open
    pub fn is_connected(&self) -> bool {
        self.inner.status.borrow().is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.clone()
    }

    /// Terminal conditions such as exhausted reconnection retries
    pub fn notices(&self) -> broadcast::Receiver<ConnectionNotice> {
        self.inner.notices.subscribe()
    }

    /// Resets the retry counter and connects immediately.
    ///
    /// Returns `false` when nothing is subscribed or the client is shut down.
    pub async fn reconnect(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.inner.commands.send(Command::Reconnect(reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Closes the transport, cancels every timer and stops the driver.
    ///
    /// Later subscriptions fail with [`RealtimeError::ClientShutdown`].
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.inner.commands.send(Command::Shutdown(reply_tx)).is_ok() {
            let _ = reply_rx.await;
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.commands.is_closed()
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}
