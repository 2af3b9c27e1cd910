// modgraph-common/src/error.rs
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("cannot find module '{0}'")]
    ModuleNotFound(String),

    #[error("{message} (while resolving module {specifier}, required from {from})")]
    Resolve {
        specifier: String,
        from: String,
        message: String,
    },

    #[error("cannot find transform module {transform} while transforming {module}")]
    TransformLoad { transform: String, module: String },

    // Transform failures carry the collaborator's message verbatim so
    // callers can match on it.
    #[error("{0}")]
    Transform(String),
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
