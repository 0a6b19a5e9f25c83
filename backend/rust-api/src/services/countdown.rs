use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::metrics::INTERVIEWS_ACTIVE;

/// Receives countdown progress. Called from the ticker task.
#[async_trait]
pub trait CountdownObserver: Send + Sync + 'static {
    /// One logical second elapsed. Returning `false` stops the countdown.
    async fn tick(&self, elapsed_seconds: u64, remaining_seconds: u64) -> bool;

    /// The countdown reached zero. Runs on the ticker task after the last tick.
    async fn expired(&self);
}

/// Cooperative countdown: one tick per `tick_interval`, each worth one second.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    pub total_seconds: u64,
    pub tick_interval: Duration,
}

impl Countdown {
    pub fn new(total_seconds: u64, tick_interval: Duration) -> Self {
        Self {
            total_seconds,
            tick_interval,
        }
    }

    pub fn spawn(self, observer: Arc<dyn CountdownObserver>) -> CountdownHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let Countdown {
            total_seconds,
            tick_interval,
        } = self;

        INTERVIEWS_ACTIVE.inc();
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            let mut elapsed: u64 = 0;

            while elapsed < total_seconds {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel_rx.changed() => break,
                }
                if *cancel_rx.borrow() {
                    break;
                }

                elapsed += 1;
                let remaining = total_seconds - elapsed;
                if !observer.tick(elapsed, remaining).await {
                    break;
                }
                if remaining == 0 {
                    INTERVIEWS_ACTIVE.dec();
                    observer.expired().await;
                    return;
                }
            }
            INTERVIEWS_ACTIVE.dec();
        });

        CountdownHandle { cancel_tx, task }
    }
}

/// Handle to a running countdown.
#[derive(Debug)]
pub struct CountdownHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    /// Stops further ticks. Never interrupts an `expired` callback already
    /// running on the ticker task.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
