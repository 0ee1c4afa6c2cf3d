// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host errors.

use atlas_graph::{GraphError, LinkError, NodeUpdateError, SnapshotError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the host
#[derive(Debug, Error)]
pub enum HostError {
    /// A snapshot file could not be read or written
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Snapshot encoding or import failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// A node could not be created or configured
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Node settings could not be encoded
    #[error("Invalid node settings: {0}")]
    Settings(#[from] NodeUpdateError),

    /// A link was rejected
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// The configured log filter does not parse
    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;
