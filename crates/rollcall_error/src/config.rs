//! Configuration error types.

/// Configuration error with source location.
///
/// Configuration problems (missing credential, unparseable guild id) are the
/// only fatal error class in Rollcall; everything else is recovered locally.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollcall_error::ConfigError;
    ///
    /// let err = ConfigError::new("DISCORD_TOKEN not set");
    /// assert!(err.message.contains("DISCORD_TOKEN"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
