//! PCX Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared logging and input sanitization for the PCX workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all PCX workspace members:
//!
//! - **Logging**: centralized `tracing` initialization ([`logging`])
//! - **Sanitization**: filters for untrusted catalog data ([`sanitize`])
//!
//! # Example
//!
//! ```
//! use pcx_common::sanitize::{clean_value, defuse_formula};
//!
//! let cell = clean_value("Widget <script>\u{0007}");
//! assert_eq!(cell, "Widget script");
//!
//! let exported = defuse_formula("=1+1");
//! assert_eq!(exported, "'=1+1");
//! ```

pub mod logging;
pub mod sanitize;
