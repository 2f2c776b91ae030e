//! Qizx Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient concerns shared by every Qizx workspace member.
//!
//! # Overview
//!
//! - **Logging**: subscriber configuration for the `qizx` binary and the
//!   bulk transfer workers
//!
//! # Example
//!
//! ```no_run
//! use qizx_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! let config = LogConfig::builder().level(LogLevel::Info).build();
//! init_logging(&config).ok();
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
