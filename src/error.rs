use std::fmt;

/// Failures the frame pipeline distinguishes between.
///
/// Setup failures (`SourceUnavailable`, `ModelLoad`) are fatal and bubble out of
/// the binaries. `ReadFailure` is per-frame: transient for cameras, end-of-stream
/// for files. `InvalidControlState` is never surfaced to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    SourceUnavailable(String),
    ReadFailure(String),
    ModelLoad { path: String, message: String },
    InvalidControlState(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable(msg) => write!(f, "video source unavailable: {msg}"),
            Self::ReadFailure(msg) => write!(f, "frame read failed: {msg}"),
            Self::ModelLoad { path, message } => {
                write!(f, "failed to load model parameters from {path}: {message}")
            }
            Self::InvalidControlState(msg) => write!(f, "invalid control state: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    pub fn model_load(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }
}
