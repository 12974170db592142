//! reapi SDK - Native Type Definitions
//!
//! This crate contains the type definitions shared by every other crate:
//! opaque native records handed to hooks, script VM identifiers, and the
//! optional addon interfaces. It has no dependencies and compiles quickly,
//! allowing parallel compilation of dependent crates.
//!
//! # Modules
//!
//! - [`interfaces`] - Opaque native record types
//! - [`types`] - Script VM cells and identifiers
//! - [`addons`] - Optional addon API interfaces

pub mod addons;
pub mod interfaces;
pub mod types;

pub use addons::*;
pub use interfaces::*;
pub use types::*;
