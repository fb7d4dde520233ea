//! Error types shared by the expression engine and the renderer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing or evaluating documents and layouts.
///
/// Missing values are never errors: unresolved names, absent properties and
/// empty iteration sources all degrade to "no further resolution".
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed expression, header, or text-tree.
    #[error("format error: {0}")]
    Format(String),

    /// Applying a non-callable or calling a built-in with bad arguments.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The build was canceled while this operation was pending.
    #[error("operation canceled")]
    Canceled,

    #[error("IO error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
