use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

use crate::types::constants::HEARTBEAT_INTERVAL;

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(HEARTBEAT_INTERVAL);

/// Periodic ticker that asks the connection owner to send a ping.
///
/// The task only signals; whether a ping is actually due is decided by the
/// receiver, which knows the connection state.
pub struct HeartbeatManager<T> {
    interval: Duration,
    sender: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> HeartbeatManager<T> {
    pub fn new(sender: mpsc::UnboundedSender<T>) -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            sender,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs until the receiver goes away, emitting `make_tick()` every interval.
    ///
    /// The first tick fires one full interval after start.
    pub async fn run<F>(self, make_tick: F)
    where
        F: Fn() -> T + Send + 'static,
    {
        let start = time::Instant::now() + self.interval;
        let mut interval_timer = time::interval_at(start, self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;

            if self.sender.send(make_tick()).is_err() {
                tracing::debug!("Heartbeat receiver dropped, stopping heartbeat");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_interval_after_first_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatManager::new(tx).with_interval(Duration::from_secs(30));
        let task = tokio::spawn(heartbeat.run(|| "tick"));

        time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some("tick"));

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.recv().await, Some("tick"));

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let heartbeat = HeartbeatManager::new(tx).with_interval(Duration::from_secs(1));
        let task = tokio::spawn(heartbeat.run(|| ()));

        drop(rx);
        time::sleep(Duration::from_secs(2)).await;

        assert!(task.await.is_ok());
    }
}
