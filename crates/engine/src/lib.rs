//! reapi Engine - Host API Discovery and Global Storage
//!
//! This crate handles:
//! - Discovering which optional host APIs are present (and recent enough)
//! - Storing them in thread-safe global statics
//! - Routing script-facing diagnostics
//!
//! # Architecture
//!
//! APIs are probed once during plugin load via [`loader::load_apis`]
//! and stored in [`globals::EngineGlobals`]. Access is provided via the
//! [`try_engine()`] function.

pub mod apis;
pub mod diagnostics;
pub mod error;
pub mod globals;
pub mod loader;

pub use apis::{ApiFlags, ApiVersion};
pub use diagnostics::{DiagnosticCode, DiagnosticSink, HookIdentity, TracingSink};
pub use error::EngineError;
pub use globals::{init_engine, try_engine, EngineGlobals};
pub use loader::{load_apis, ApiProvider};
