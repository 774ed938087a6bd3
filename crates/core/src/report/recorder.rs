//! # Report Recorder
//!
//! Observes a run's message bus and documents every step under
//! `<project>/docs/steps/step_<NNN>_<name>/`. Once a message signals that the
//! project is finished, all step reports are synthesized into
//! `<project>/docs/final_report.md`.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use walkdir::WalkDir;

use super::extractor::{extract_files, ExtractedFiles};
use crate::error::ReportError;
use crate::llm::LlmClient;
use crate::swarm::{Cause, MessageObserver, PipelineMessage};

/// Role name the recorder publishes under
pub const PROFILE: &str = "Project Reporter";

const UNKNOWN_STEP: &str = "UnknownStep";

/// Lower-cased phrases that mark the end of a project
const COMPLETION_SIGNALS: [&str; 4] = [
    "\"command_name\": \"end\"",
    "'command_name': 'end'",
    "hoàn tất",
    "finished",
];

/// A persisted step report
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: u32,
    pub step_name: String,
    pub timestamp: DateTime<Local>,
    pub body: String,
    pub extracted_files: ExtractedFiles,
    pub directory: PathBuf,
    pub report_path: PathBuf,
}

/// The persisted end-of-project synthesis
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    pub body: String,
    pub path: PathBuf,
}

/// Whether `content` announces that the project is done
pub fn is_completion_signal(content: &str) -> bool {
    let lowered = content.to_lowercase();
    COMPLETION_SIGNALS
        .iter()
        .any(|signal| lowered.contains(signal))
}

/// Directory-safe step name for a message cause
pub fn step_name(cause: &Cause) -> String {
    let raw = match cause {
        Cause::Action(action) => action.rsplit('.').next().unwrap_or(action.as_str()),
        Cause::Label(label) => label.as_str(),
        Cause::Unlabeled => UNKNOWN_STEP,
    };

    let sanitized: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        UNKNOWN_STEP.to_string()
    } else {
        sanitized
    }
}

/// `NNN` of a `step_<NNN>_<name>` directory name
pub fn step_number(dir_name: &str) -> Option<u32> {
    dir_name.strip_prefix("step_")?.split('_').next()?.parse().ok()
}

/// Highest step number already present in `steps_dir`, 0 when there is none
fn highest_step_number(steps_dir: &Path) -> Result<u32, ReportError> {
    let mut highest = 0u32;
    for entry in WalkDir::new(steps_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| steps_dir.to_path_buf());
            ReportError::io(path, e.into())
        })?;
        if let Some(number) = step_number(&entry.file_name().to_string_lossy()) {
            highest = highest.max(number);
        }
    }
    Ok(highest)
}

/// A step directory this recorder created
#[derive(Debug, Clone)]
struct WrittenStep {
    number: u32,
    dir_name: String,
    report_path: PathBuf,
}

/// Stateful observer writing step and final reports for one run.
///
/// Runs sharing a project root share `docs/steps`: directory numbers continue
/// after the highest one on disk, and the final synthesis only covers the
/// steps this recorder wrote. `StepReport::index` counts this run's steps
/// from 1.
pub struct ReportRecorder {
    project_root: PathBuf,
    llm: Arc<dyn LlmClient>,
    language: String,
    step_counter: u32,
    seen: HashSet<Uuid>,
    written: Vec<WrittenStep>,
    final_pending: bool,
    final_written: bool,
}

impl ReportRecorder {
    pub fn new(project_root: impl AsRef<Path>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            llm,
            language: "English".to_string(),
            step_counter: 0,
            seen: HashSet::new(),
            written: Vec::new(),
            final_pending: false,
            final_written: false,
        }
    }

    /// Language the summaries are written in
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Steps recorded so far
    pub fn step_count(&self) -> u32 {
        self.step_counter
    }

    pub fn final_written(&self) -> bool {
        self.final_written
    }

    fn steps_dir(&self) -> PathBuf {
        self.project_root.join("docs").join("steps")
    }

    /// Record one message.
    ///
    /// Returns `None` for the recorder's own messages and for messages already
    /// recorded. A message whose summary or write fails is not marked as
    /// recorded and takes no step index.
    pub async fn observe(
        &mut self,
        message: &PipelineMessage,
    ) -> Result<Option<StepReport>, ReportError> {
        if message.author == PROFILE || self.seen.contains(&message.id) {
            return Ok(None);
        }

        let index = self.step_counter + 1;
        let name = step_name(&message.cause);
        let extracted_files = extract_files(&message.content);

        tracing::info!(step = index, step_name = %name, author = %message.author, files = extracted_files.len(), "recording step");

        let summary = self
            .llm
            .ask(&self.summary_prompt(message, &extracted_files))
            .await
            .map_err(ReportError::Llm)?;

        let report = self
            .write_step(index, name, summary, extracted_files)
            .await?;
        self.step_counter = index;
        self.seen.insert(message.id);

        if is_completion_signal(&message.content) {
            self.final_pending = true;
        }
        if self.final_pending && !self.final_written {
            self.write_final().await?;
        }

        Ok(Some(report))
    }

    fn summary_prompt(&self, message: &PipelineMessage, files: &ExtractedFiles) -> String {
        let files_line = if files.is_empty() {
            "No source files were produced in this step.".to_string()
        } else {
            format!("Source files produced in this step: {}.", files.names().join(", "))
        };

        format!(
            "You are the {profile}. Summarize the work {author} just completed in this step. \
The summary lets the user follow the project one step at a time.\n\n\
If source code was created or modified, name each file and its purpose.\n\
{files_line}\n\n\
Write in {language}.\n\n\
Work content:\n{content}",
            profile = PROFILE,
            author = message.author,
            language = self.language,
            content = message.content,
        )
    }

    /// Create the next free `step_<NNN>_<name>` directory.
    ///
    /// Numbering continues after the highest step on disk, so a directory
    /// written by an earlier run is never reused.
    async fn claim_step_dir(&self, step_name: &str) -> Result<(u32, PathBuf), ReportError> {
        let steps_dir = self.steps_dir();
        tokio::fs::create_dir_all(&steps_dir)
            .await
            .map_err(|e| ReportError::io(&steps_dir, e))?;

        let last_own = self.written.last().map_or(0, |step| step.number);
        loop {
            let number = highest_step_number(&steps_dir)?.max(last_own) + 1;
            let directory = steps_dir.join(format!("step_{:03}_{}", number, step_name));
            match tokio::fs::create_dir(&directory).await {
                Ok(()) => return Ok((number, directory)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(ReportError::io(&directory, e)),
            }
        }
    }

    async fn write_step(
        &mut self,
        index: u32,
        step_name: String,
        body: String,
        extracted_files: ExtractedFiles,
    ) -> Result<StepReport, ReportError> {
        let (number, directory) = self.claim_step_dir(&step_name).await?;

        let timestamp = Local::now();
        let report_path = directory.join(format!("report_{}.md", timestamp.format("%Y%m%d_%H%M%S")));
        let text = format!("# Step Report: {}\n\n{}\n", step_name, body);
        if let Err(e) = fill_step_dir(&directory, &report_path, &text, &extracted_files).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&directory).await {
                tracing::warn!("could not remove incomplete step {:?}: {}", directory, cleanup);
            }
            return Err(e);
        }

        tracing::info!("step report saved to {:?}", report_path);

        let dir_name = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.written.push(WrittenStep {
            number,
            dir_name,
            report_path: report_path.clone(),
        });

        Ok(StepReport {
            index,
            step_name,
            timestamp,
            body,
            extracted_files,
            directory,
            report_path,
        })
    }

    async fn write_final(&mut self) -> Result<FinalReport, ReportError> {
        tracing::info!("project finished, writing final report");

        let mut steps = self.written.clone();
        steps.sort_by_key(|step| step.number);

        let mut all_reports = String::new();
        for step in &steps {
            let text = tokio::fs::read_to_string(&step.report_path)
                .await
                .map_err(|e| ReportError::io(&step.report_path, e))?;
            all_reports.push_str(&format!("\n---\n## Step {}\n{}\n", step.dir_name, text));
        }

        let prompt = format!(
            "Using the step reports below, write one overall report of the whole project, \
from the initial idea to the final product. Write in {}.\n\nStep reports:\n{}",
            self.language, all_reports
        );
        let body = self.llm.ask(&prompt).await.map_err(ReportError::Llm)?;

        let path = self.project_root.join("docs").join("final_report.md");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReportError::io(parent, e))?;
        }
        tokio::fs::write(&path, format!("# Final Project Report\n\n{}\n", body))
            .await
            .map_err(|e| ReportError::io(&path, e))?;

        self.final_pending = false;
        self.final_written = true;
        tracing::info!("final report saved to {:?}", path);

        Ok(FinalReport { body, path })
    }
}

async fn fill_step_dir(
    directory: &Path,
    report_path: &Path,
    text: &str,
    extracted_files: &ExtractedFiles,
) -> Result<(), ReportError> {
    tokio::fs::write(report_path, text)
        .await
        .map_err(|e| ReportError::io(report_path, e))?;

    for (file_name, content) in extracted_files.iter() {
        let path = directory.join(file_name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ReportError::io(&path, e))?;
        tracing::debug!("saved extracted file to {:?}", path);
    }
    Ok(())
}

#[async_trait]
impl MessageObserver for ReportRecorder {
    async fn on_message(
        &mut self,
        message: &PipelineMessage,
    ) -> anyhow::Result<Option<PipelineMessage>> {
        let report = self.observe(message).await?;
        Ok(report.map(|report| {
            PipelineMessage::new(PROFILE, Cause::action("WriteStepReport"), report.body)
        }))
    }
}
