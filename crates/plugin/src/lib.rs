//! ReAPI Plugin - FFI Layer
//!
//! This crate provides the FFI boundary between the host's C interface
//! and the Rust core logic. It compiles to a cdylib (.so/.dll).

pub mod ffi;

pub use ffi::hook_chain;
pub use reapi_core::shutdown;
