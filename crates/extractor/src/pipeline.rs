//! Job orchestration: the two-stage extraction state machine.
//!
//! A job pays for a lightweight metadata probe before the heavy
//! download+transcode stage, so an unreachable or invalid URL fails fast and
//! the user sees the title and duration before any real work starts. Each
//! stage is one yt-dlp invocation driven through [`crate::runner`]; parsed
//! progress is fanned out to the consumer as it happens.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::job::{Job, JobEvent, JobStage, ProcessEvent, format_duration};
use crate::parser::{
    DestinationRules, ExtractLine, FilenameCandidate, parse_extract_line, parse_probe_output,
};
use crate::runner::run_stage;
use crate::scratch::{ScratchDirs, list_outputs};

const PROBE_FAILED_MSG: &str = "failed to fetch video info";
const EXTRACT_FAILED_MSG: &str = "audio extraction failed";

/// Pipeline configuration. The scratch root is explicit so tests (and
/// deployments) decide where job directories land.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Path to the yt-dlp binary.
    pub ytdlp_path: String,
    /// Root under which per-job scratch directories are allocated.
    pub scratch_root: PathBuf,
    /// Target audio extension, also the output filter. Fixed best-effort
    /// quality; codec selection beyond this is out of scope.
    pub audio_format: String,
}

impl ExtractorConfig {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            scratch_root: scratch_root.into(),
            audio_format: "mp3".to_string(),
        }
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }
}

/// Runs extraction jobs. Cheap to clone; jobs are isolated by distinct
/// scratch directories keyed on distinct identifiers, so no cross-job state
/// is shared.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractorConfig,
    scratch: ScratchDirs,
    rules: DestinationRules,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let scratch = ScratchDirs::new(config.scratch_root.clone());
        let rules = DestinationRules::for_extension(&config.audio_format);
        Self {
            config,
            scratch,
            rules,
        }
    }

    pub fn scratch(&self) -> &ScratchDirs {
        &self.scratch
    }

    /// Start a job for `url`. Returns the job identifier and the event
    /// stream: progress in emission order, ended by exactly one terminal
    /// `Error` or `Done` event.
    ///
    /// The channel is unbounded so a slow or disconnected consumer never
    /// backs up into the subprocess pipes; a dropped receiver is not a
    /// cancellation signal.
    pub fn run(&self, url: impl Into<String>) -> (String, mpsc::UnboundedReceiver<JobEvent>) {
        self.run_with_cancel(url, CancellationToken::new())
    }

    /// Like [`Extractor::run`], but cancellable: triggering the token kills
    /// the running stage and the job fails with a distinct cancelled reason.
    /// The scratch directory is left intact for diagnostics.
    pub fn run_with_cancel(
        &self,
        url: impl Into<String>,
        cancel: CancellationToken,
    ) -> (String, mpsc::UnboundedReceiver<JobEvent>) {
        let job = Job::new(url);
        let id = job.id.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let this = self.clone();
        tokio::spawn(async move {
            this.drive(job, tx, cancel).await;
        });

        (id, rx)
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--print".to_string(),
            "title".to_string(),
            "--print".to_string(),
            "duration".to_string(),
            url.to_string(),
        ]
    }

    fn extract_args(&self, url: &str, scratch_dir: &Path) -> Vec<String> {
        let output_template = scratch_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .to_string();
        vec![
            "--no-playlist".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            self.config.audio_format.clone(),
            "--audio-quality".to_string(),
            "0".to_string(),
            "--embed-thumbnail".to_string(),
            "--add-metadata".to_string(),
            "--newline".to_string(),
            "-o".to_string(),
            output_template,
            url.to_string(),
        ]
    }

    async fn drive(
        self,
        mut job: Job,
        tx: mpsc::UnboundedSender<JobEvent>,
        cancel: CancellationToken,
    ) {
        info!(job_id = %job.id, url = %job.url, "starting extraction job");

        let _ = tx.send(JobEvent::progress("Fetching video info..."));
        advance(&mut job, JobStage::Probing);

        // Probe stage: stdout carries exactly the requested metadata fields.
        let mut probe_lines: Vec<String> = Vec::new();
        let probe = run_stage(
            &self.config.ytdlp_path,
            &self.probe_args(&job.url),
            &cancel,
            |line| probe_lines.push(line.to_string()),
            |_line| {},
        )
        .await;

        let info = match probe {
            Err(Error::Cancelled) => {
                return fail(&mut job, &tx, Error::Cancelled.to_string());
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "probe stage failed to launch");
                return fail(&mut job, &tx, e.to_string());
            }
            Ok(exit) if !exit.success() => {
                debug!(job_id = %job.id, ?exit.code, "probe exited non-zero");
                return fail(&mut job, &tx, exit.stderr_or(PROBE_FAILED_MSG));
            }
            Ok(exit) => {
                let completed = ProcessEvent::Completed {
                    exit_code: exit.code,
                };
                debug!(job_id = %job.id, ?completed, "probe stage finished");
                match parse_probe_output(&probe_lines) {
                    Some(info) => info,
                    // Exit 0 without a usable title is failure all the same.
                    None => {
                        warn!(job_id = %job.id, "probe produced no usable title");
                        return fail(&mut job, &tx, exit.stderr_or(PROBE_FAILED_MSG));
                    }
                }
            }
        };

        job.title = Some(info.title.clone());
        job.duration_secs = info.duration_secs;
        advance(&mut job, JobStage::Probed);

        let duration = format_duration(job.duration_secs);
        let _ = tx.send(JobEvent::progress(format!(
            "Found: {} ({})",
            info.title, duration
        )));
        let _ = tx.send(JobEvent::progress("Extracting audio in best quality..."));
        advance(&mut job, JobStage::Extracting);

        // The probe needed no directory; allocate only now that real output
        // is coming.
        let scratch_dir = match self.scratch.allocate(&job.id).await {
            Ok(dir) => dir,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to allocate scratch directory");
                return fail(&mut job, &tx, e.to_string());
            }
        };
        job.scratch_dir = Some(scratch_dir.clone());

        // Extract stage: forward every parsed progress line verbatim and
        // immediately; percentage updates must not be batched or coalesced.
        let mut candidate = FilenameCandidate::default();
        let extract = run_stage(
            &self.config.ytdlp_path,
            &self.extract_args(&job.url, &scratch_dir),
            &cancel,
            |line| {
                if let Some(event) = observe_extract_line(line, &self.rules, &mut candidate)
                    && let ProcessEvent::Progress { message } = event
                {
                    let _ = tx.send(JobEvent::Progress { message });
                }
            },
            |_line| {},
        )
        .await;

        let exit = match extract {
            Err(Error::Cancelled) => {
                return fail(&mut job, &tx, Error::Cancelled.to_string());
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "extract stage failed to launch");
                return fail(&mut job, &tx, e.to_string());
            }
            Ok(exit) => exit,
        };

        if !exit.success() {
            debug!(job_id = %job.id, ?exit.code, "extract exited non-zero");
            return fail(&mut job, &tx, exit.stderr_or(EXTRACT_FAILED_MSG));
        }

        // Exit 0 is necessary but not sufficient: the file must exist.
        let listed = match list_outputs(&scratch_dir, &self.config.audio_format).await {
            Ok(listed) => listed,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to list scratch directory");
                return fail(&mut job, &tx, e.to_string());
            }
        };

        let Some(filename) = pick_output(listed, candidate.take()) else {
            return fail(&mut job, &tx, Error::OutputNotFound.to_string());
        };

        job.output_filename = Some(filename.clone());
        advance(&mut job, JobStage::Done);
        info!(job_id = %job.id, %filename, "extraction job done");

        let _ = tx.send(JobEvent::Done {
            id: job.id,
            title: info.title,
            duration,
            filename,
        });
    }
}

/// Classify one extract-stage output line into a process event, recording
/// any destination announcement as a filename candidate.
fn observe_extract_line(
    line: &str,
    rules: &DestinationRules,
    candidate: &mut FilenameCandidate,
) -> Option<ProcessEvent> {
    match parse_extract_line(line, rules)? {
        ExtractLine::Percent(token) => Some(ProcessEvent::Progress { message: token }),
        ExtractLine::Destination { filename, priority } => {
            candidate.offer(filename.clone(), priority);
            Some(ProcessEvent::Progress {
                message: format!("Writing {filename}"),
            })
        }
    }
}

/// Choose the served filename: the directory listing is authoritative, the
/// parsed candidate only breaks ties when the listing is ambiguous. An empty
/// listing chooses nothing, whatever was parsed.
fn pick_output(listed: Vec<String>, candidate: Option<String>) -> Option<String> {
    match listed.len() {
        0 => None,
        1 => listed.into_iter().next(),
        _ => {
            if let Some(name) = candidate
                && listed.contains(&name)
            {
                return Some(name);
            }
            listed.into_iter().next()
        }
    }
}

fn advance(job: &mut Job, next: JobStage) {
    if let Err(e) = job.advance(next) {
        // Transitions are driven linearly above; this firing means a bug.
        error!(job_id = %job.id, error = %e, "job stage transition rejected");
    }
}

fn fail(job: &mut Job, tx: &mpsc::UnboundedSender<JobEvent>, message: impl Into<String>) {
    advance(job, JobStage::Failed);
    let _ = tx.send(JobEvent::error(message));
}
