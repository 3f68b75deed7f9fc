use std::path::PathBuf;
use thiserror::Error;

/// Why a renderer refused an expression.
///
/// Render failures are always recovered locally: the expression is shown
/// exactly as written, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("empty expression")]
    Empty,
    #[error("unbalanced braces at byte {0}")]
    UnbalancedBraces(usize),
    #[error("{lefts} \\left against {rights} \\right")]
    UnbalancedLeftRight { lefts: usize, rights: usize },
    #[error("renderer is not ready")]
    NotReady,
    #[error("renderer rejected expression: {0}")]
    Rejected(String),
}

/// A structural failure while reading or mutating a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("node {0} is not attached to the document")]
    Detached(String),
    #[error("node {0} does not exist")]
    Missing(String),
    #[error("node {0} cannot hold children")]
    NotAContainer(String),
}

impl DocumentError {
    pub fn detached(node: impl std::fmt::Debug) -> Self {
        Self::Detached(format!("{:?}", node))
    }

    pub fn missing(node: impl std::fmt::Debug) -> Self {
        Self::Missing(format!("{:?}", node))
    }
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
