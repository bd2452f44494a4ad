//! Chat-gateway error types.
//!
//! The scan engine classifies platform failures into these kinds to decide
//! between skipping a channel, skipping a reaction, or ending an attempt.

use derive_getters::Getters;

/// Gateway error variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum GatewayErrorKind {
    /// The bot cannot see the requested channel or resource.
    #[display("Access forbidden")]
    Forbidden,

    /// The requested channel or resource does not exist.
    #[display("Resource not found")]
    NotFound,

    /// The platform asked us to back off.
    #[display("Rate limited")]
    RateLimited,

    /// Connection to the gateway failed.
    #[display("Connection failed: {_0}")]
    Connection(String),

    /// Any other API-reported failure.
    #[display("API error: {_0}")]
    Api(String),
}

impl GatewayErrorKind {
    /// True when the resource is permanently unreadable for this bot, i.e.
    /// the channel should be abandoned rather than retried.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Forbidden | Self::NotFound)
    }
}

/// Gateway error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error, Getters)]
#[display("Gateway Error: {} at line {} in {}", kind, line, file)]
pub struct GatewayError {
    kind: GatewayErrorKind,
    line: u32,
    file: &'static str,
}

impl GatewayError {
    /// Create a new GatewayError with automatic location tracking.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollcall_error::{GatewayError, GatewayErrorKind};
    ///
    /// let err = GatewayError::new(GatewayErrorKind::Forbidden);
    /// assert!(err.kind().is_access_denied());
    /// ```
    #[track_caller]
    pub fn new(kind: GatewayErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
