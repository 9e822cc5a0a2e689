use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Preparing,
    Extracting,
    Translating,
    Reassembling,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Preparing => "preparing",
            JobStatus::Extracting => "extracting",
            JobStatus::Translating => "translating",
            JobStatus::Reassembling => "reassembling",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationProgress {
    pub status: JobStatus,
    pub progress_percent: f32,
    pub current_segment: usize,
    pub total_segments: usize,
    pub current_page: usize,
    pub total_pages: usize,
    #[serde(rename = "translatedTextSoFar", skip_serializing_if = "Option::is_none")]
    pub accumulated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslationProgress {
    pub fn preparing() -> Self {
        Self {
            status: JobStatus::Preparing,
            progress_percent: 0.0,
            current_segment: 0,
            total_segments: 0,
            current_page: 0,
            total_pages: 0,
            accumulated_text: None,
            estimated_time_remaining_secs: None,
            error: None,
        }
    }
}

/// Receives progress snapshots. Called inline by the pipeline, so
/// implementations must only do bookkeeping.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &TranslationProgress);
}

impl ProgressSink for mpsc::UnboundedSender<TranslationProgress> {
    fn report(&self, progress: &TranslationProgress) {
        let _ = self.send(progress.clone());
    }
}

/// Discards every snapshot.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _progress: &TranslationProgress) {}
}

/// Builds the snapshots for one job and forwards them to its sink.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    started: Instant,
    total_pages: usize,
    total_segments: usize,
    processed: usize,
    current_page: usize,
    percent: f32,
    accumulated: Option<String>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            started: Instant::now(),
            total_pages: 0,
            total_segments: 0,
            processed: 0,
            current_page: 0,
            percent: 0.0,
            accumulated: None,
        }
    }

    fn snapshot(&self, status: JobStatus) -> TranslationProgress {
        TranslationProgress {
            status,
            progress_percent: self.percent,
            current_segment: self.processed,
            total_segments: self.total_segments,
            current_page: self.current_page,
            total_pages: self.total_pages,
            accumulated_text: self.accumulated.clone(),
            estimated_time_remaining_secs: None,
            error: None,
        }
    }

    pub(crate) fn preparing(&mut self, total_pages: usize) {
        self.total_pages = total_pages;
        self.sink.report(&self.snapshot(JobStatus::Preparing));
    }

    pub(crate) fn start_translating(&mut self, total_segments: usize) {
        self.total_segments = total_segments;
        self.sink.report(&self.snapshot(JobStatus::Translating));
    }

    pub(crate) fn segment_done(&mut self, page_number: usize, accumulated: &str) {
        self.processed += 1;
        self.current_page = page_number;
        if self.total_segments > 0 {
            self.percent = 100.0 * self.processed as f32 / self.total_segments as f32;
        }

        self.accumulated = Some(accumulated.to_string());
        let mut progress = self.snapshot(JobStatus::Translating);
        progress.estimated_time_remaining_secs = self.estimate_remaining_secs();
        self.sink.report(&progress);
    }

    pub(crate) fn reassembling(&mut self) {
        self.sink.report(&self.snapshot(JobStatus::Reassembling));
    }

    pub(crate) fn completed(&mut self, final_text: &str) {
        self.percent = 100.0;
        self.current_page = self.total_pages;
        self.accumulated = Some(final_text.to_string());
        let mut progress = self.snapshot(JobStatus::Completed);
        progress.estimated_time_remaining_secs = Some(0);
        self.sink.report(&progress);
    }

    pub(crate) fn failed(&mut self, message: &str) {
        let mut progress = self.snapshot(JobStatus::Error);
        progress.error = Some(message.to_string());
        self.sink.report(&progress);
    }

    /// Moving average of elapsed time per processed segment.
    fn estimate_remaining_secs(&self) -> Option<u64> {
        if self.processed == 0 {
            return None;
        }
        let per_segment = self.started.elapsed().as_secs_f64() / self.processed as f64;
        let remaining = self.total_segments.saturating_sub(self.processed);
        Some((per_segment * remaining as f64).round() as u64)
    }
}
