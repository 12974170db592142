//! reapi - Core Logic
//!
//! This crate contains the hook chain engine, the script-facing natives and
//! the configuration system.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - native record types, script VM ids and addon interfaces
//! - [`engine`] - host API discovery, globals and diagnostics

use tracing::info;

pub use reapi_engine as engine;
pub use reapi_sdk as sdk;

pub mod config;
pub mod hookchain;
pub mod natives;

pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use hookchain::{
    CallContext, FunctionId, HookChain, HookChainError, HookChainState, HookGroup, HookKey, ScriptVm, WireType,
    Word,
};

/// Shutdown the core
///
/// Called from the FFI layer when the host unloads the plugin.
pub fn shutdown() {
    info!("reapi shutting down...");
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_sdk_types_exist() {
        use crate::sdk::CBaseEntity;
        let _: *const CBaseEntity = std::ptr::null();
    }
}
