//! Crate-wide error type.
//!
//! Domain modules define their own `thiserror` enums (see
//! [`crate::container::ContainerError`], [`crate::forcefield::ForcefieldError`]) and convert
//! into this one at the crate boundary via `From`, keeping the domain-specific variants out
//! of code that only needs to propagate a failure upward.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error that originates in this crate.
    #[error("{0}")]
    General(String),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
