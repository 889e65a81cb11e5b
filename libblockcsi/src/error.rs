//! CSI error types.
//!
//! Every failure surfaced by the controller is a [`CsiError`].  Each variant
//! maps onto exactly one [`Code`], mirroring the gRPC status codes the
//! orchestrator expects from a CSI plugin.  Errors are
//! [`Serialize`]/[`Deserialize`] so they can travel inside a
//! [`CsiMessage`](crate::message::CsiMessage).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code attached to every [`CsiError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Code {
    /// A required field is missing or malformed, or a constraint such as the
    /// capacity limit cannot be honoured.
    InvalidArgument,
    /// A referenced volume, snapshot or instance does not exist.
    NotFound,
    /// The name is taken by a resource that does not match the request.
    AlreadyExists,
    /// Backend failure or an inconsistent backend state.
    Internal,
    /// The operation is intentionally not supported.
    Unimplemented,
}

/// Unified error type for CSI operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum CsiError {
    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A resource required by the request was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource with the same name but different attributes exists, or the
    /// volume is attached elsewhere.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An unclassified internal or backend error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The RPC is not implemented by this plugin.
    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

impl CsiError {
    /// Status code of this error.
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::NotFound(_) => Code::NotFound,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::Internal(_) => Code::Internal,
            Self::Unimplemented(_) => Code::Unimplemented,
        }
    }

    /// Create a [`CsiError::InvalidArgument`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn invalid_argument<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidArgument(e.to_string())
    }

    /// Create a [`CsiError::NotFound`].
    pub fn not_found<E: std::fmt::Display>(e: E) -> Self {
        Self::NotFound(e.to_string())
    }

    /// Create a [`CsiError::AlreadyExists`].
    pub fn already_exists<E: std::fmt::Display>(e: E) -> Self {
        Self::AlreadyExists(e.to_string())
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    pub(crate) fn unimplemented(rpc: &str) -> Self {
        Self::Unimplemented(rpc.to_owned())
    }
}
