//! Error types for pharos-core.

use thiserror::Error;
use uuid::Uuid;

/// Registry error type.
#[derive(Debug, Error)]
pub enum Error {
    /// An agent with this id is already registered.
    ///
    /// Should not occur under v4 id generation, but the store guards it.
    #[error("agent {agent_id} is already registered")]
    DuplicateAgent {
        /// The already-registered agent id
        agent_id: Uuid,
    },

    /// No agent with this id is registered.
    #[error("agent {agent_id} not found")]
    NotFound {
        /// The unknown agent id
        agent_id: Uuid,
    },

    /// Mutating call attempted after `shutdown()` was initiated.
    #[error("registry is shutting down")]
    ShutdownInProgress,

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
