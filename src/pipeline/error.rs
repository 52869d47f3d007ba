//! Error types and reporting for pipeline nodes.

use std::fmt;

/// Errors that can occur inside a node's lifecycle hooks.
#[derive(Debug, Clone)]
pub enum NodeError {
    /// Recoverable error that allows the node to keep running.
    Recoverable(String),
    /// Fatal error that shuts the node down.
    Fatal(String),
}

impl NodeError {
    /// True when the error must end the node's loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Fatal(_))
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            NodeError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for NodeError {}

/// Trait for reporting node errors.
///
/// Run-time faults inside a node loop are routed here instead of dying with
/// the thread, so the pipeline driver can observe and react to them.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a node.
    fn report(&self, node: &str, error: &NodeError);
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, node: &str, error: &NodeError) {
        eprintln!("[{}] {}", node, error);
    }
}
