/// Inbound frame `type` strings
pub mod frame_types {
    pub const PONG: &str = "pong";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const NOTIFICATION_UPDATE: &str = "NOTIFICATION_UPDATE";
    pub const ALL_NOTIFICATIONS_READ: &str = "ALL_NOTIFICATIONS_READ";
}

/// Prefixes of entity-change frame types (`new_<entity>`, `update_<entity>`)
pub mod entity_actions {
    pub const NEW: &str = "new";
    pub const UPDATE: &str = "update";
}

/// Endpoint path on the realtime host
pub const WS_PATH: &str = "/ws";

/// Value of the `client` query parameter
pub const CLIENT_NAME: &str = "webapp";

/// Value of the `mode` query parameter
pub const CONNECTION_MODE: &str = "optimized";

/// Persisted key holding the authentication token
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Connection-open timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 5_000;

/// Heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 30_000;

/// Reconnect backoff (milliseconds unless noted)
pub const RECONNECT_BASE_DELAY: u64 = 3_000;
pub const RECONNECT_GROWTH_FACTOR: f64 = 1.5;
pub const RECONNECT_JITTER_MAX: u64 = 1_000;
pub const RECONNECT_MAX_DELAY: u64 = 60_000;
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
