use std::collections::HashMap;
use std::hash::Hash;
use tokio::task::JoinHandle;

struct TrackedTask {
    token: u64,
    handle: JoinHandle<()>,
}

/// Manages keyed background tasks with proper lifecycle handling.
///
/// At most one task runs per key; spawning under a key aborts the previous
/// task. Every spawn gets a fresh token so messages sent by an aborted task
/// that were already queued can be recognised as stale.
pub struct TaskManager<K> {
    tasks: HashMap<K, TrackedTask>,
    next_token: u64,
}

impl<K: Eq + Hash + Copy> TaskManager<K> {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            next_token: 0,
        }
    }

    /// Spawn a task under `key`, replacing any task already running there.
    ///
    /// `make` receives the token identifying this spawn.
    pub fn spawn<F, Fut>(&mut self, key: K, make: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.next_token += 1;
        let token = self.next_token;
        let handle = tokio::spawn(make(token));

        if let Some(previous) = self.tasks.insert(key, TrackedTask { token, handle }) {
            previous.handle.abort();
        }
        token
    }

    /// Whether `token` belongs to the task currently tracked under `key`
    pub fn is_current(&self, key: K, token: u64) -> bool {
        self.tasks.get(&key).is_some_and(|task| task.token == token)
    }

    /// Stop tracking a task that has completed. Returns `false` for stale tokens.
    pub fn complete(&mut self, key: K, token: u64) -> bool {
        if self.is_current(key, token) {
            self.tasks.remove(&key);
            true
        } else {
            false
        }
    }

    /// Abort the task under `key`, if any
    pub fn abort(&mut self, key: K) -> bool {
        match self.tasks.remove(&key) {
            Some(task) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: K) -> bool {
        self.tasks.contains_key(&key)
    }

    /// Abort all tasks without waiting
    pub fn abort_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.handle.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<K: Eq + Hash + Copy> Default for TaskManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for TaskManager<K> {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.handle.abort();
        }
    }
}
