//! Cancellable periodic dispatch task.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::tagger::Tagger;

/// Background task running one dispatch cycle per interval.
///
/// The first tick fires immediately and announces the client with a batch
/// even when no events were tracked. [`stop`](Self::stop) and
/// [`shutdown`](Self::shutdown) let a cycle in progress complete; dropping
/// the timer aborts the task. An aborted cycle keeps its batch pending for
/// the next dispatch.
pub struct DispatchTimer {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DispatchTimer {
    pub(crate) fn spawn(runtime: &Handle, tagger: Arc<Tagger>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut announce = true;

            tracing::debug!(period = ?period, app_id = %tagger.app_id(), "Dispatch timer started");

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let outcome = tagger.dispatch_cycle(announce).await;
                        announce = false;
                        tracing::trace!(?outcome, "Dispatch tick");
                    }
                }
            }

            tracing::debug!(app_id = %tagger.app_id(), "Dispatch timer stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the task to stop after the cycle in progress, if any
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop and wait for the task to finish its current cycle
    pub async fn shutdown(mut self) {
        self.stop();
        let _ = (&mut self.handle).await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        self.stop();
        self.handle.abort();
    }
}
