// Infrastructure module - Background services and pluggable collaborators
pub mod cache;
pub mod heartbeat;
pub mod task_manager;
pub mod timer;
pub mod token;

pub use cache::{CacheInvalidator, QueryCache};
pub use heartbeat::HeartbeatManager;
pub use task_manager::TaskManager;
pub use timer::{FixedJitter, JitterSource, ReconnectConfig, ReconnectPolicy, ThreadRngJitter};
pub use token::{FileTokenStore, StaticTokenStore, TokenStore};
