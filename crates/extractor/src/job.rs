//! Job data model and the externally visible event protocol.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle stage of one extraction job.
///
/// The path is strictly forward: `Created → Probing → Probed → Extracting`
/// ending in `Done` or `Failed` (`Failed` is reachable from either running
/// stage). A job reaches a terminal stage exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Created,
    Probing,
    Probed,
    Extracting,
    Done,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Probing => "probing",
            Self::Probed => "probed",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn can_transition_to(self, next: JobStage) -> bool {
        use JobStage::*;
        matches!(
            (self, next),
            (Created, Probing)
                | (Probing, Probed)
                | (Probing, Failed)
                | (Probed, Extracting)
                | (Extracting, Done)
                | (Extracting, Failed)
        )
    }
}

/// One end-to-end request to extract audio from one URL.
#[derive(Debug, Clone)]
pub struct Job {
    /// Opaque identifier; doubles as the scratch directory name and the
    /// later download lookup key.
    pub id: String,
    pub url: String,
    pub stage: JobStage,
    pub scratch_dir: Option<PathBuf>,
    /// Unknown until the probe succeeds.
    pub title: Option<String>,
    /// Unknown until the probe succeeds, and possibly still unknown after.
    pub duration_secs: Option<f64>,
    /// Unknown until the extract stage reports or produces it.
    pub output_filename: Option<String>,
}

impl Job {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            stage: JobStage::Created,
            scratch_dir: None,
            title: None,
            duration_secs: None,
            output_filename: None,
        }
    }

    /// Move the job forward one stage; backward or skipping transitions are
    /// rejected.
    pub fn advance(&mut self, next: JobStage) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: self.stage.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.stage = next;
        Ok(())
    }
}

/// What a stage runner observed from one subprocess.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Progress { message: String },
    Error { message: String },
    Completed { exit_code: Option<i32> },
}

/// One unit of the externally streamed protocol.
///
/// Emitted in order; exactly one `Error` or one `Done` terminates the
/// sequence and nothing follows it. Progress already streamed before a late
/// `Error` stands as informational history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
    Progress {
        message: String,
    },
    Error {
        message: String,
    },
    Done {
        id: String,
        title: String,
        /// Formatted `m:ss`.
        duration: String,
        filename: String,
    },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Format a duration in seconds as `m:ss`, truncating fractional seconds.
/// An unknown duration renders as `0:00`.
pub fn format_duration(secs: Option<f64>) -> String {
    let total = secs.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_get_distinct_identifiers() {
        let a = Job::new("https://example.com/v/1");
        let b = Job::new("https://example.com/v/1");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn stages_advance_forward_only() {
        let mut job = Job::new("https://example.com/v/1");
        job.advance(JobStage::Probing).unwrap();
        job.advance(JobStage::Probed).unwrap();
        job.advance(JobStage::Extracting).unwrap();
        job.advance(JobStage::Done).unwrap();
        assert!(job.stage.is_terminal());

        // Terminal stages cannot be left.
        assert!(job.advance(JobStage::Extracting).is_err());
        assert!(job.advance(JobStage::Failed).is_err());
    }

    #[test]
    fn failed_is_reachable_from_both_running_stages() {
        let mut probing = Job::new("u");
        probing.advance(JobStage::Probing).unwrap();
        assert!(probing.advance(JobStage::Failed).is_ok());

        let mut extracting = Job::new("u");
        extracting.advance(JobStage::Probing).unwrap();
        extracting.advance(JobStage::Probed).unwrap();
        extracting.advance(JobStage::Extracting).unwrap();
        assert!(extracting.advance(JobStage::Failed).is_ok());
    }

    #[test]
    fn skipping_stages_is_rejected() {
        let mut job = Job::new("u");
        assert!(job.advance(JobStage::Extracting).is_err());
        assert!(job.advance(JobStage::Done).is_err());
        assert_eq!(job.stage, JobStage::Created);
    }

    #[test]
    fn format_duration_minutes_and_seconds() {
        assert_eq!(format_duration(Some(125.5)), "2:05");
        assert_eq!(format_duration(Some(10.0)), "0:10");
        assert_eq!(format_duration(Some(0.0)), "0:00");
        assert_eq!(format_duration(Some(3600.0)), "60:00");
        assert_eq!(format_duration(None), "0:00");
        assert_eq!(format_duration(Some(-3.0)), "0:00");
    }

    #[test]
    fn job_event_wire_shape() {
        let progress = JobEvent::progress("Fetching video info...");
        assert_eq!(
            serde_json::to_string(&progress).unwrap(),
            r#"{"type":"progress","message":"Fetching video info..."}"#
        );

        let done = JobEvent::Done {
            id: "abc".to_string(),
            title: "Test".to_string(),
            duration: "0:10".to_string(),
            filename: "out.mp3".to_string(),
        };
        let json = serde_json::to_string(&done).unwrap();
        assert_eq!(
            json,
            r#"{"type":"done","id":"abc","title":"Test","duration":"0:10","filename":"out.mp3"}"#
        );

        let error = JobEvent::error("boom");
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"type":"error","message":"boom"}"#
        );
    }

    #[test]
    fn terminal_events_are_terminal() {
        assert!(!JobEvent::progress("x").is_terminal());
        assert!(JobEvent::error("x").is_terminal());
    }
}
