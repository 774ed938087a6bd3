//! # Step Reports
//!
//! Durable per-step documentation of a run, written by observing its message bus.

pub mod extractor;
pub mod recorder;

pub use extractor::{extract_files, ExtractedFiles};
pub use recorder::{is_completion_signal, step_name, FinalReport, ReportRecorder, StepReport};
