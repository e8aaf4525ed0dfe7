//! Background sweep of expired response cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::ResponseCache;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running sweep task.
///
/// Dropping the handle aborts the task; [`stop()`](Self::stop) shuts it
/// down and waits for it to exit.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Signal the task to stop and wait until it has exited.
    ///
    /// No sweep runs after this returns.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the task has exited (stopped, or its cache was dropped).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn the sweep loop on the current tokio runtime.
///
/// The first sweep runs one full `interval` after spawning. A zero
/// interval is raised to one millisecond.
pub(super) fn spawn<V>(cache: Weak<ResponseCache<V>>, interval: Duration) -> SweepHandle
where
    V: Clone + Send + Sync + 'static,
{
    let interval = interval.max(MIN_INTERVAL);
    let (shutdown, mut stopped) = oneshot::channel();
    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stopped => break,
                _ = ticker.tick() => {
                    let Some(cache) = cache.upgrade() else {
                        break;
                    };
                    cache.sweep_expired();
                }
            }
        }
        debug!("response cache sweeper stopped");
    });

    SweepHandle {
        shutdown: Some(shutdown),
        task: Some(task),
    }
}
