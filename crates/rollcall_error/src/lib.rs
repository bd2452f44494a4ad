//! Error types for the Rollcall user tracker.
//!
//! This crate provides the foundation error types used throughout the
//! Rollcall workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use rollcall_error::{ConfigError, RollcallResult};
//!
//! fn load_token() -> RollcallResult<String> {
//!     Err(ConfigError::new("DISCORD_TOKEN not set"))?
//! }
//!
//! assert!(load_token().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod gateway;

pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind, DatabaseResult};
pub use error::{RollcallError, RollcallErrorKind, RollcallResult};
pub use gateway::{GatewayError, GatewayErrorKind, GatewayResult};
