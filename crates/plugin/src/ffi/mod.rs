//! FFI boundary with the host

pub mod exports;
pub mod host;

pub use exports::hook_chain;
pub use host::HostApi;
