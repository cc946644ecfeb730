use std::path::PathBuf;
use thiserror::Error;

/// Everything the playback core reports to its caller.
///
/// None of these are fatal to the process: each one is either absorbed
/// (end of stream, no-op toggle) or leaves the controller in a state the
/// user can retry from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("cannot open {}: {reason}", path.display())]
    CannotOpen { path: PathBuf, reason: String },

    #[error("no video loaded")]
    NoVideoLoaded,

    #[error("decode failure mid-stream: {0}")]
    DecodeFailure(String),

    #[error("frame processing failed: {0}")]
    TransformFailure(String),

    #[error("failed to publish frame: {0}")]
    PublishFailure(String),
}

impl PlaybackError {
    pub(crate) fn cannot_open(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::CannotOpen {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }
}
