//! stepr Common Library
//!
//! This crate provides shared constants, configuration loading and the
//! hardware boundary traits for all stepr workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide limits and timing defaults
//! - [`config`] - Configuration loading traits and engine configuration
//! - [`hal`] - Hardware boundary: GPIO and free-running counter traits
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use stepr_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
