//! # Pipeline Runner
//!
//! Background task that drives the pipeline for one run and turns its outcome
//! into stream events. Posts exactly one `done` sentinel, whatever happens.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::stream_pipe::{self, StreamPipe};
use crate::swarm::{MessageBus, Pipeline, RunRequest, StreamEvent};

/// Posts the `done` sentinel once: explicitly via [`DoneSentinel::post`], or
/// from `Drop` when the runner is cancelled or unwinds mid-body.
struct DoneSentinel {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl DoneSentinel {
    fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    async fn post(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(StreamEvent::Done).await;
        }
    }
}

impl Drop for DoneSentinel {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            if tx.try_send(StreamEvent::Done).is_err() {
                tracing::debug!("could not post done sentinel from cancelled runner");
            }
        }
    }
}

/// Spawn the runner task for one run.
pub fn spawn_runner(
    pipeline: Arc<dyn Pipeline>,
    request: RunRequest,
    pipe: Arc<StreamPipe>,
    bus: MessageBus,
    tx: mpsc::Sender<StreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run_pipeline(pipeline, request, pipe, bus, tx))
}

#[tracing::instrument(skip_all, fields(goal_preview = %request.goal.chars().take(50).collect::<String>()))]
async fn run_pipeline(
    pipeline: Arc<dyn Pipeline>,
    request: RunRequest,
    pipe: Arc<StreamPipe>,
    bus: MessageBus,
    tx: mpsc::Sender<StreamEvent>,
) {
    let sentinel = DoneSentinel::new(tx.clone());

    let run = pipeline.run(&request.goal, request.budget, &bus);
    let outcome = AssertUnwindSafe(stream_pipe::scope(Arc::clone(&pipe), run))
        .catch_unwind()
        .await;

    // Held until `done` is posted so an in-flight poller send lands first.
    let _drain = pipe.lock_drain().await;
    match outcome {
        Ok(Ok(history)) => {
            tracing::info!(messages = history.len(), "pipeline completed");
            // Reasoning written just before the pipeline returned still goes
            // out ahead of the result.
            if let Some(pending) = pipe.take().filter(|text| !text.is_empty()) {
                emit(&tx, StreamEvent::Reasoning(pending)).await;
            }
            if let Some(last) = history.last() {
                emit(&tx, StreamEvent::Content(last.content.clone())).await;
            }
            emit(&tx, StreamEvent::completed()).await;
        }
        Ok(Err(e)) => {
            tracing::error!("pipeline failed: {:#}", e);
            emit(&tx, StreamEvent::Error(format!("{:?}", e))).await;
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("pipeline panicked: {}", message);
            emit(&tx, StreamEvent::Error(format!("pipeline panicked: {}", message))).await;
        }
    }

    sentinel.post().await;
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
    if tx.send(event).await.is_err() {
        tracing::debug!("event queue closed, dropping event");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::{Cause, PipelineMessage, RunBudget};
    use async_trait::async_trait;

    enum Behavior {
        Succeed(Vec<&'static str>),
        Fail(&'static str),
        Panic,
        ReasonThenSucceed,
    }

    struct ScriptedPipeline(Behavior);

    #[async_trait]
    impl Pipeline for ScriptedPipeline {
        async fn run(
            &self,
            _goal: &str,
            _budget: RunBudget,
            bus: &MessageBus,
        ) -> anyhow::Result<Vec<PipelineMessage>> {
            match &self.0 {
                Behavior::Succeed(contents) => {
                    let mut history = Vec::new();
                    for content in contents {
                        let msg = PipelineMessage::new("Engineer", Cause::action("WriteCode"), *content);
                        bus.publish(msg.clone()).await?;
                        history.push(msg);
                    }
                    Ok(history)
                }
                Behavior::Fail(reason) => Err(anyhow::anyhow!("{}", reason)),
                Behavior::Panic => panic!("role crashed"),
                Behavior::ReasonThenSucceed => {
                    stream_pipe::log_llm_stream("last thought");
                    Ok(vec![PipelineMessage::new("Engineer", Cause::Unlabeled, "result")])
                }
            }
        }
    }

    async fn collect(behavior: Behavior) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn_runner(
            Arc::new(ScriptedPipeline(behavior)),
            RunRequest::new("build a todo app"),
            Arc::new(StreamPipe::new()),
            MessageBus::new(),
            tx,
        );
        handle.await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_success_emits_content_status_done() {
        let events = collect(Behavior::Succeed(vec!["prd", "final code"])).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("final code".into()),
                StreamEvent::completed(),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_history_has_no_content() {
        let events = collect(Behavior::Succeed(vec![])).await;
        assert_eq!(events, vec![StreamEvent::completed(), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_failure_emits_error_then_done() {
        let events = collect(Behavior::Fail("budget exhausted")).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Error(msg) if msg.contains("budget exhausted")));
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_event() {
        let events = collect(Behavior::Panic).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Error(msg) if msg.contains("role crashed")));
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_pending_reasoning_flushed_before_result() {
        let events = collect(Behavior::ReasonThenSucceed).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Reasoning("last thought".into()),
                StreamEvent::Content("result".into()),
                StreamEvent::completed(),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_outcome_waits_for_in_flight_reasoning() {
        let pipe = Arc::new(StreamPipe::new());
        let (tx, mut rx) = mpsc::channel(8);

        // The poller has taken a value but not queued it yet.
        let drain = pipe.lock_drain().await;
        pipe.set("late thought");
        let taken = pipe.take().unwrap();

        let handle = spawn_runner(
            Arc::new(ScriptedPipeline(Behavior::Succeed(vec!["result"]))),
            RunRequest::new("build a todo app"),
            Arc::clone(&pipe),
            MessageBus::new(),
            tx.clone(),
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        tx.send(StreamEvent::Reasoning(taken)).await.unwrap();
        drop(drain);
        drop(tx);
        handle.await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::Reasoning("late thought".into()),
                StreamEvent::Content("result".into()),
                StreamEvent::completed(),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_runner_still_posts_done() {
        struct Hangs(Arc<tokio::sync::Notify>);

        #[async_trait]
        impl Pipeline for Hangs {
            async fn run(
                &self,
                _goal: &str,
                _budget: RunBudget,
                _bus: &MessageBus,
            ) -> anyhow::Result<Vec<PipelineMessage>> {
                self.0.notify_one();
                futures::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }

        let started = Arc::new(tokio::sync::Notify::new());
        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_runner(
            Arc::new(Hangs(Arc::clone(&started))),
            RunRequest::new("never ends"),
            Arc::new(StreamPipe::new()),
            MessageBus::new(),
            tx,
        );
        started.notified().await;
        handle.abort();
        let _ = handle.await;

        assert_eq!(rx.recv().await, Some(StreamEvent::Done));
        assert_eq!(rx.recv().await, None);
    }
}
