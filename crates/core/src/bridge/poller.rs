//! # Reasoning Poller
//!
//! Drains a run's [`StreamPipe`] into the shared event queue. Wakes on every
//! write and on a fixed tick, whichever comes first.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::stream_pipe::StreamPipe;
use crate::swarm::StreamEvent;

/// Default tick between pipe checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn the poller for one run.
///
/// The task runs until aborted or until the queue is closed.
pub fn spawn_poller(
    pipe: Arc<StreamPipe>,
    tx: mpsc::Sender<StreamEvent>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(poll_pipe(pipe, tx, interval))
}

async fn poll_pipe(pipe: Arc<StreamPipe>, tx: mpsc::Sender<StreamEvent>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = pipe.written() => {}
            _ = ticker.tick() => {}
        }

        let drain = pipe.lock_drain().await;
        let Some(content) = pipe.take() else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        let sent = tx.send(StreamEvent::Reasoning(content)).await;
        drop(drain);
        if sent.is_err() {
            tracing::debug!("event queue closed, stopping reasoning poller");
            break;
        }
    }
}
