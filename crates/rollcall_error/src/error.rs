//! Top-level error wrapper types.

use crate::{ConfigError, DatabaseError, GatewayError};

/// Union of the error classes produced by Rollcall crates.
///
/// # Examples
///
/// ```
/// use rollcall_error::{ConfigError, RollcallError};
///
/// let err: RollcallError = ConfigError::new("missing field").into();
/// assert!(format!("{}", err).contains("Configuration"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum RollcallErrorKind {
    /// Configuration error (fatal at startup)
    #[from(ConfigError)]
    Config(ConfigError),
    /// Database error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Gateway error
    #[from(GatewayError)]
    Gateway(GatewayError),
}

/// Rollcall error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Rollcall Error: {}", _0)]
pub struct RollcallError(Box<RollcallErrorKind>);

impl RollcallError {
    /// Create a new error from a kind.
    pub fn new(kind: RollcallErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RollcallErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to RollcallErrorKind
impl<T> From<T> for RollcallError
where
    T: Into<RollcallErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Rollcall operations.
pub type RollcallResult<T> = std::result::Result<T, RollcallError>;
