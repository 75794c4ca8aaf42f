//! Error types for the ordering engine.

use crate::{ContainerId, Principal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All possible errors surfaced by the ordering engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A referenced container or item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The authorization collaborator denied a write.
    #[error("principal '{principal}' may not write container '{container}'")]
    Forbidden {
        principal: Principal,
        container: ContainerId,
    },

    /// Malformed input, e.g. a reorder list that does not match membership.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// A position collision survived the retry budget.
    #[error("position conflict in container '{container}' after {attempts} attempt(s)")]
    Conflict {
        container: ContainerId,
        attempts: u32,
    },

    /// I/O failure or interrupted multi-write; the caller may retry.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl Error {
    /// The discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::Invalid(_) => ErrorKind::Invalid,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Transient(_) => ErrorKind::Transient,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Transient)
    }
}

/// Error discriminant, shared with the wire format and the client cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Invalid,
    Conflict,
    Transient,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "notFound",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
