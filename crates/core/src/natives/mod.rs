//! Script-facing natives
//!
//! - [`hookchain`] - reading and rewriting the current hooked call
//! - [`addons`] - voice transcoder and Reunion tables

pub mod addons;
pub mod hookchain;

pub use addons::{register_addon_natives, reunion_natives, vtc_natives, MaxClients};
pub use hookchain::{
    get_hookchain_arg, get_hookchain_arg_count, get_hookchain_arg_handle, get_hookchain_arg_string,
    get_hookchain_return, is_original_called, set_hookchain_arg, set_hookchain_return, NativeCaller, ScriptValue,
};
