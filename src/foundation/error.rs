use std::path::PathBuf;

use crate::foundation::core::FrameIndex;

/// Convenience result type used across podreel.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid configuration or API usage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed subtitle input, reported with its 1-based position.
    #[error("input error at entry {position}: {message}")]
    Input {
        /// 1-based position of the offending entry.
        position: usize,
        /// What was wrong with it.
        message: String,
    },

    /// A single frame failed to render or persist.
    #[error("render error at frame {frame}: {message}")]
    Render {
        /// Frame that failed.
        frame: FrameIndex,
        /// Failure description.
        message: String,
    },

    /// Frame-store I/O failure for a specific path.
    #[error("i/o error at '{}': {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Layout construction or configuration failure.
    #[error("layout error: {0}")]
    Layout(String),

    /// The requested encoder path cannot run on this system.
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// An encoder ran and failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Input`] value.
    pub fn input(position: usize, msg: impl Into<String>) -> Self {
        Self::Input {
            position,
            message: msg.into(),
        }
    }

    /// Build a [`ReelError::Render`] value.
    pub fn render(frame: FrameIndex, msg: impl Into<String>) -> Self {
        Self::Render {
            frame,
            message: msg.into(),
        }
    }

    /// Build a [`ReelError::Io`] value.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`ReelError::Layout`] value.
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }

    /// Build a [`ReelError::EncoderUnavailable`] value.
    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable(msg.into())
    }

    /// Build a [`ReelError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
