//! # Event Multiplexer
//!
//! Turns one run into a lazy stream of [`StreamEvent`]s. Starts the runner and
//! the reasoning poller on a shared queue and yields queued events until the
//! first `done`.
//!
//! Teardown is unconditional: after `done` the poller is aborted and awaited
//! and the runner joined; if the consumer drops the stream early the poller is
//! aborted from `Drop`, and the runner is handled per [`DisconnectPolicy`].

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::poller::{spawn_poller, DEFAULT_POLL_INTERVAL};
use super::runner::spawn_runner;
use super::stream_pipe::StreamPipe;
use crate::llm::LlmClient;
use crate::report::ReportRecorder;
use crate::swarm::{MessageBus, Pipeline, RunRequest, StreamEvent};

/// What happens to a still-running pipeline when the consumer goes away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Let the pipeline finish; its events are discarded
    #[default]
    Detach,
    /// Abort the pipeline task
    Abort,
}

/// Tuning for the bridge
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub poll_interval: Duration,
    pub queue_capacity: usize,
    pub disconnect_policy: DisconnectPolicy,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: 256,
            disconnect_policy: DisconnectPolicy::Detach,
        }
    }
}

/// Where and how step reports are recorded for each run
#[derive(Clone)]
struct RecorderSettings {
    project_root: PathBuf,
    llm: Arc<dyn LlmClient>,
    language: String,
}

/// Stream of one run's events
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Entry point for streaming pipeline runs
#[derive(Clone)]
pub struct RunBridge {
    pipeline: Arc<dyn Pipeline>,
    options: BridgeOptions,
    recorder: Option<RecorderSettings>,
}

impl RunBridge {
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            pipeline,
            options: BridgeOptions::default(),
            recorder: None,
        }
    }

    pub fn with_options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Record step reports under `project_root` for every run
    pub fn with_recorder(
        mut self,
        project_root: impl Into<PathBuf>,
        llm: Arc<dyn LlmClient>,
        language: impl Into<String>,
    ) -> Self {
        self.recorder = Some(RecorderSettings {
            project_root: project_root.into(),
            llm,
            language: language.into(),
        });
        self
    }

    /// Start a run and return its event stream.
    ///
    /// Must be called within a tokio runtime. The run starts immediately; the
    /// stream ends right after the first `done` event.
    pub fn stream_run(&self, request: RunRequest) -> EventStream {
        let pipe = Arc::new(StreamPipe::new());
        let (tx, rx) = mpsc::channel(self.options.queue_capacity.max(1));

        let bus = MessageBus::new();
        if let Some(settings) = &self.recorder {
            let recorder = ReportRecorder::new(&settings.project_root, Arc::clone(&settings.llm))
                .with_language(settings.language.clone());
            bus.subscribe(Arc::new(Mutex::new(recorder)));
        }

        tracing::info!(
            n_round = request.budget.n_round,
            investment = request.budget.investment,
            "starting run"
        );

        let poller = spawn_poller(Arc::clone(&pipe), tx.clone(), self.options.poll_interval);
        let runner = spawn_runner(Arc::clone(&self.pipeline), request, pipe, bus, tx);

        let state = Multiplexer {
            rx,
            teardown: Teardown {
                poller: Some(poller),
                runner: Some(runner),
                policy: self.options.disconnect_policy,
            },
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }

            let event = match state.rx.recv().await {
                Some(event) => event,
                None => {
                    tracing::warn!("event queue closed without done sentinel");
                    StreamEvent::Done
                }
            };

            if event.is_done() {
                state.finished = true;
                state.teardown.finish().await;
            }

            Some((event, state))
        })
        .boxed()
    }
}

struct Multiplexer {
    rx: mpsc::Receiver<StreamEvent>,
    teardown: Teardown,
    finished: bool,
}

struct Teardown {
    poller: Option<JoinHandle<()>>,
    runner: Option<JoinHandle<()>>,
    policy: DisconnectPolicy,
}

impl Teardown {
    /// Normal completion: stop the poller, join the runner.
    async fn finish(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
            let _ = poller.await;
        }
        if let Some(runner) = self.runner.take() {
            if let Err(e) = runner.await {
                tracing::warn!("runner task did not finish cleanly: {}", e);
            }
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Some(runner) = self.runner.take() {
            match self.policy {
                DisconnectPolicy::Abort => {
                    tracing::info!("consumer disconnected, aborting pipeline");
                    runner.abort();
                }
                DisconnectPolicy::Detach => {
                    tracing::info!("consumer disconnected, pipeline continues detached");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::stream_pipe;
    use crate::swarm::{Cause, PipelineMessage, RunBudget};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const TICK: Duration = Duration::from_millis(20);

    fn fast_options(policy: DisconnectPolicy) -> BridgeOptions {
        BridgeOptions {
            poll_interval: TICK,
            queue_capacity: 16,
            disconnect_policy: policy,
        }
    }

    /// Emits reasoning for each step, then returns the last one as the result
    struct Steps(Vec<&'static str>);

    #[async_trait]
    impl Pipeline for Steps {
        async fn run(
            &self,
            _goal: &str,
            _budget: RunBudget,
            bus: &MessageBus,
        ) -> anyhow::Result<Vec<PipelineMessage>> {
            let mut history = Vec::new();
            for step in &self.0 {
                stream_pipe::log_llm_stream(&format!("thinking about {}", step));
                tokio::time::sleep(TICK * 2).await;
                let msg = PipelineMessage::new("Engineer", Cause::action("WriteCode"), *step);
                bus.publish(msg.clone()).await?;
                history.push(msg);
            }
            Ok(history)
        }
    }

    struct Broken;

    #[async_trait]
    impl Pipeline for Broken {
        async fn run(
            &self,
            _goal: &str,
            _budget: RunBudget,
            _bus: &MessageBus,
        ) -> anyhow::Result<Vec<PipelineMessage>> {
            anyhow::bail!("provider unreachable")
        }
    }

    /// Publishes one reasoning line, exposes its pipe, then never finishes
    struct Stalls {
        pipe: std::sync::Mutex<Option<Arc<StreamPipe>>>,
        dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Pipeline for Stalls {
        async fn run(
            &self,
            _goal: &str,
            _budget: RunBudget,
            _bus: &MessageBus,
        ) -> anyhow::Result<Vec<PipelineMessage>> {
            let _flag = DropFlag(Arc::clone(&self.dropped));
            *self.pipe.lock().unwrap() = stream_pipe::current();
            stream_pipe::log_llm_stream("warming up");
            futures::future::pending::<()>().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_single_done_after_outcome() {
        let bridge = RunBridge::new(Arc::new(Steps(vec!["prd", "design", "code"])))
            .with_options(fast_options(DisconnectPolicy::Detach));

        let events: Vec<StreamEvent> = bridge.stream_run(RunRequest::new("todo app")).collect().await;

        let done_count = events.iter().filter(|e| e.is_done()).count();
        assert_eq!(done_count, 1);
        assert!(events.last().unwrap().is_done());

        let outcomes: Vec<_> = events.iter().filter(|e| e.is_outcome()).collect();
        assert_eq!(outcomes, vec![&StreamEvent::completed()]);

        let content_pos = events
            .iter()
            .position(|e| *e == StreamEvent::Content("code".into()))
            .unwrap();
        let reasoning: Vec<_> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, StreamEvent::Reasoning(_)))
            .collect();
        assert!(!reasoning.is_empty());
        assert!(reasoning.iter().all(|(i, _)| *i < content_pos));
    }

    #[tokio::test]
    async fn test_failure_is_delivered_in_band() {
        let bridge = RunBridge::new(Arc::new(Broken)).with_options(fast_options(DisconnectPolicy::Detach));

        let events: Vec<StreamEvent> = bridge.stream_run(RunRequest::new("anything")).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Error(msg) if msg.contains("provider unreachable")));
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_stream_ends_after_done() {
        let bridge = RunBridge::new(Arc::new(Steps(vec!["only"])))
            .with_options(fast_options(DisconnectPolicy::Detach));
        let mut stream = bridge.stream_run(RunRequest::new("todo app"));

        while let Some(event) = stream.next().await {
            if event.is_done() {
                break;
            }
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_early_drop_stops_poller() {
        let pipeline = Arc::new(Stalls {
            pipe: std::sync::Mutex::new(None),
            dropped: Arc::new(AtomicBool::new(false)),
        });
        let bridge = RunBridge::new(pipeline.clone()).with_options(fast_options(DisconnectPolicy::Detach));

        let mut stream = bridge.stream_run(RunRequest::new("slow goal"));
        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert_eq!(first, Some(StreamEvent::Reasoning("warming up".into())));
        drop(stream);

        let pipe = pipeline.pipe.lock().unwrap().clone().unwrap();
        pipe.set("after disconnect");
        tokio::time::sleep(TICK * 3).await;

        assert_eq!(pipe.take().as_deref(), Some("after disconnect"));
        assert!(!pipeline.dropped.load(Ordering::SeqCst), "detached pipeline keeps running");
    }

    #[tokio::test]
    async fn test_abort_policy_cancels_pipeline() {
        let pipeline = Arc::new(Stalls {
            pipe: std::sync::Mutex::new(None),
            dropped: Arc::new(AtomicBool::new(false)),
        });
        let bridge = RunBridge::new(pipeline.clone()).with_options(fast_options(DisconnectPolicy::Abort));

        let mut stream = bridge.stream_run(RunRequest::new("slow goal"));
        let _ = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        drop(stream);

        tokio::time::sleep(TICK * 3).await;
        assert!(pipeline.dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_cross_talk() {
        let bridge = RunBridge::new(Arc::new(Steps(vec!["alpha"])))
            .with_options(fast_options(DisconnectPolicy::Detach));
        let other = RunBridge::new(Arc::new(Steps(vec!["beta"])))
            .with_options(fast_options(DisconnectPolicy::Detach));

        let (a, b) = tokio::join!(
            bridge.stream_run(RunRequest::new("a")).collect::<Vec<_>>(),
            other.stream_run(RunRequest::new("b")).collect::<Vec<_>>(),
        );

        let reasoning_of = |events: &[StreamEvent]| -> Vec<String> {
            events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::Reasoning(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        };
        assert!(reasoning_of(&a).iter().all(|t| t.contains("alpha")));
        assert!(reasoning_of(&b).iter().all(|t| t.contains("beta")));
    }

    #[tokio::test]
    async fn test_recorder_documents_each_step() {
        let dir = tempfile::TempDir::new().unwrap();
        let bridge = RunBridge::new(Arc::new(Steps(vec!["prd", "finished code"])))
            .with_options(fast_options(DisconnectPolicy::Detach))
            .with_recorder(
                dir.path(),
                Arc::new(crate::llm::testing::RecordingLlm::default()),
                "English",
            );

        let events: Vec<StreamEvent> = bridge.stream_run(RunRequest::new("todo app")).collect().await;
        assert!(events.contains(&StreamEvent::completed()));

        let steps = std::fs::read_dir(dir.path().join("docs/steps")).unwrap().count();
        assert_eq!(steps, 2);
        assert!(dir.path().join("docs/final_report.md").exists());
    }
}
