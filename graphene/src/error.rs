//! Error taxonomy for each stage of the change loop.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// The frame source failed. The loop cannot continue without frames.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The capture device could not be opened or stopped responding.
    #[error("capture device {0} is unavailable")]
    DeviceUnavailable(String),

    /// A finite source (e.g. a video file) has no more frames.
    #[error("capture stream ended")]
    EndOfStream,

    /// Reading or converting a frame failed.
    #[error("failed to read frame: {0}")]
    Read(String),

    /// The captured frame could not be written where the extractor expects it.
    #[error("failed to export frame to {path}: {reason}")]
    Export { path: PathBuf, reason: String },
}

/// One entry of the extractor output lacks a required field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("triple #{index} is missing or has an invalid `{field}`")]
pub struct MalformedTripleError {
    /// Position of the offending entry in the output array.
    pub index: usize,
    /// Dotted path of the field, e.g. `subject.xmin`.
    pub field: &'static str,
}

/// Turning a frame into triples failed. The cycle is skipped; state is kept.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("extractor exited with {status}: {stderr}")]
    ProcessFailed { status: ExitStatus, stderr: String },

    #[error("extractor did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("failed to read extractor output {path}: {source}")]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("extractor output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("extractor output is not a JSON array")]
    NotAnArray,

    #[error(transparent)]
    Malformed(#[from] MalformedTripleError),
}

/// Drawing or publishing the overlay failed. Logged; never rolls back state.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("render backend failed: {0}")]
    Backend(String),
}

/// A failed cycle, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("extraction failed for frame {frame}: {source}")]
    Extraction {
        frame: u64,
        #[source]
        source: ExtractionError,
    },
}

impl CycleError {
    /// Only acquisition failures stop the loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Acquisition(_))
    }
}
