//! Audio extraction pipeline driven by yt-dlp.
//!
//! One job extracts the audio track of one remote video URL in two external
//! process stages: a lightweight metadata probe, then the actual
//! download+transcode. Both stages' unstructured output is demuxed into
//! lines, classified into structured events, and streamed to a single
//! consumer while the processes run.

pub mod error;
pub mod job;
pub mod parser;
pub mod pipeline;
pub mod record_reader;
pub mod runner;
pub mod scratch;

pub use error::{Error, Result};
pub use job::{Job, JobEvent, JobStage, ProcessEvent};
pub use pipeline::{Extractor, ExtractorConfig};
pub use scratch::ScratchDirs;
