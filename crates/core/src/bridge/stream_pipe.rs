//! # Stream Pipe
//!
//! Single-slot mailbox that carries the latest unread reasoning text from
//! synchronous LLM callbacks into the async bridge.
//!
//! Each run owns one pipe. It is bound to the run's background task through
//! task-local storage, so the hook [`log_llm_stream`] always lands in the pipe
//! of the run that produced the text.
//!
//! ```text
//! LLM callback ──set()──▶ [ slot ] ──take()──▶ poller ──▶ queue
//!                  │                   ▲
//!                  └──── notify ───────┘
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, Notify};

tokio::task_local! {
    static CURRENT_PIPE: Arc<StreamPipe>;
}

/// Last-write-wins mailbox for reasoning text
#[derive(Debug, Default)]
pub struct StreamPipe {
    slot: Mutex<Option<String>>,
    written: Notify,
    drain: AsyncMutex<()>,
}

impl StreamPipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content`, replacing any unread value.
    ///
    /// Safe to call from synchronous code on any thread.
    pub fn set(&self, content: impl Into<String>) {
        let content = content.into();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(content);
        self.written.notify_one();
    }

    /// Remove and return the pending value, if any.
    pub fn take(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Exclusive right to move the slot's value into the event queue.
    ///
    /// The poller holds it from `take` until the event is queued; the runner
    /// holds it while posting the run's outcome. A reasoning value that left
    /// the slot is therefore always queued before the outcome.
    pub async fn lock_drain(&self) -> AsyncMutexGuard<'_, ()> {
        self.drain.lock().await
    }

    /// Wait until the next `set`. A write that happened since the last wake
    /// completes immediately.
    pub async fn written(&self) {
        self.written.notified().await;
    }
}

/// Run `fut` with `pipe` bound as the current run's pipe.
pub async fn scope<F>(pipe: Arc<StreamPipe>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_PIPE.scope(pipe, fut).await
}

/// The pipe bound to the current task, if any.
///
/// Pipelines that spawn their own subtasks capture this and re-bind it with
/// [`scope`] so that reasoning from those subtasks still reaches the run.
pub fn current() -> Option<Arc<StreamPipe>> {
    CURRENT_PIPE.try_with(Arc::clone).ok()
}

/// Reasoning hook for LLM clients. No-op outside a run.
pub fn log_llm_stream(content: &str) {
    let _ = CURRENT_PIPE.try_with(|pipe| pipe.set(content));
}
