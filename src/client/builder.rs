use super::connection::{ConnectionManager, ConnectionNotice};
use super::driver::Driver;
use super::state::{ClientState, ConnectionStatus};
use super::RealtimeClient;
use crate::infrastructure::{
    CacheInvalidator, JitterSource, QueryCache, ReconnectConfig, ReconnectPolicy, StaticTokenStore,
    ThreadRngJitter, TokenStore,
};
use crate::messaging::MessageRouter;
use crate::types::constants::{CLIENT_NAME, DEFAULT_CONNECT_TIMEOUT, HEARTBEAT_INTERVAL};
use crate::types::{RealtimeError, Result};
use crate::websocket::Endpoint;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

const NOTICE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    /// `host[:port]` serving the `/ws` endpoint
    pub host: String,
    /// Use `wss` instead of `ws`
    pub secure: bool,
    pub client_name: String,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            secure: false,
            client_name: CLIENT_NAME.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl RealtimeClientOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Reads `REALTIME_HOST` and `REALTIME_SECURE`
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("REALTIME_HOST")
            .map_err(|_| RealtimeError::Config("REALTIME_HOST is not set".to_string()))?;

        let secure = match std::env::var("REALTIME_SECURE") {
            Ok(value) => parse_flag(&value).ok_or_else(|| {
                RealtimeError::Config(format!("REALTIME_SECURE must be a boolean, got '{value}'"))
            })?,
            Err(_) => false,
        };

        Ok(Self {
            host,
            secure,
            ..Default::default()
        })
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            secure: self.secure,
            client_name: self.client_name.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Builder for RealtimeClient that handles initialization
pub struct RealtimeClientBuilder {
    options: RealtimeClientOptions,
    token_store: Arc<dyn TokenStore>,
    invalidator: Arc<dyn CacheInvalidator>,
    jitter: Box<dyn JitterSource>,
}

impl RealtimeClientBuilder {
    /// Create a new builder
    pub fn new(options: RealtimeClientOptions) -> Result<Self> {
        if options.host.trim().is_empty() {
            return Err(RealtimeError::Config("host is required".to_string()));
        }
        if options.host.contains("://") {
            return Err(RealtimeError::Config(format!(
                "host must not include a scheme: {}",
                options.host
            )));
        }

        Ok(Self {
            options,
            token_store: Arc::new(StaticTokenStore::empty()),
            invalidator: Arc::new(QueryCache::new()),
            jitter: Box::new(ThreadRngJitter),
        })
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = store;
        self
    }

    pub fn cache_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    /// Replace the random jitter source (e.g. with `FixedJitter` in tests)
    pub fn jitter(mut self, jitter: Box<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the client and spawn its driver task.
    ///
    /// Must be called within a Tokio runtime. Nothing connects until the first
    /// subscription.
    pub fn build(self) -> RealtimeClient {
        let policy = ReconnectPolicy::with_jitter(self.options.reconnect.clone(), self.jitter);
        let connection = ConnectionManager::new(policy)
            .with_connect_timeout(self.options.connect_timeout)
            .with_heartbeat_interval(self.options.heartbeat_interval);
        let state = ClientState::new(connection, MessageRouter::new(self.invalidator));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (notices_tx, _) = broadcast::channel::<ConnectionNotice>(NOTICE_CAPACITY);

        let driver = Driver::new(
            state,
            self.options.endpoint(),
            self.token_store,
            commands_rx,
            status_tx,
            notices_tx.clone(),
        );
        tokio::spawn(driver.run());

        RealtimeClient::from_parts(commands_tx, status_rx, notices_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RealtimeClientOptions::new("crm.example.com");
        assert_eq!(options.client_name, "webapp");
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(options.reconnect.max_attempts, 5);
        assert!(!options.secure);
    }

    #[test]
    fn test_builder_requires_host() {
        let err = RealtimeClientBuilder::new(RealtimeClientOptions::default()).err();
        assert!(matches!(err, Some(RealtimeError::Config(_))));

        let err = RealtimeClientBuilder::new(RealtimeClientOptions::new("wss://x")).err();
        assert!(matches!(err, Some(RealtimeError::Config(_))));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_endpoint_from_options() {
        let options = RealtimeClientOptions {
            secure: true,
            ..RealtimeClientOptions::new("crm.example.com")
        };
        let endpoint = options.endpoint();
        assert_eq!(endpoint.scheme(), "wss");
        assert_eq!(endpoint.host, "crm.example.com");
    }
}
