//! Workspace placeholder crate.
//!
//! This crate exposes the feature flags that map to the individual workspace
//! crates. Host applications can depend on `clipstudio-workspace`, enable
//! `desktop-shims`, and reach the upload engine through the re-exported
//! `core_service` facade without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;
