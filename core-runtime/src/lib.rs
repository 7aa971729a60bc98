//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the upload engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the other core crates
//! depend on. It establishes the logging conventions, the validated
//! configuration handed to the service facade, and the event broadcasting
//! used to report queue progress to hosts.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
