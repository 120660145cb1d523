//! Error types for editlock-core

use thiserror::Error;

use crate::lock::ResourceId;

/// Core error type for lock coordination.
///
/// Lock contention is deliberately absent: a denied acquire or a refused
/// release is a normal outcome, not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The resource to lock does not exist in the owning domain.
    #[error("Resource {0} not found")]
    NotFound(ResourceId),

    /// The lock store could not be reached or rejected the operation.
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored lock record could not be decoded.
    #[error("Corrupt lock record: {0}")]
    CorruptRecord(String),

    /// Configuration could not be parsed or failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be read.
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "RESOURCE_NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::CorruptRecord(_) => "CORRUPT_RECORD",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Process exit code for this error.
    ///
    /// - 1: configuration / IO problems
    /// - 4: store failures
    /// - 5: unknown resource
    ///
    /// 2 is left to argument parsing and 3 to lock contention.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) | Self::Io(_) => 1,
            Self::NotFound(_) => 5,
            Self::StoreUnavailable(_) | Self::CorruptRecord(_) => 4,
        }
    }
}

/// Result type alias for editlock-core operations
pub type Result<T> = std::result::Result<T, Error>;
