//! Script VM boundary

use std::fmt;
use std::sync::Arc;

use reapi_sdk::{Cell, ForwardRef, ScriptId};

use super::context::CallContext;
use super::wire::WireType;

/// Native callable from scripts: `(calling script, raw params) -> result`
pub type NativeFn = Arc<dyn Fn(ScriptId, &[Cell]) -> Cell + Send + Sync>;

/// Named native exposed to scripts
#[derive(Clone)]
pub struct NativeInfo {
    pub name: &'static str,
    pub func: NativeFn,
}

impl NativeInfo {
    pub fn new<F>(name: &'static str, func: F) -> Self
    where
        F: Fn(ScriptId, &[Cell]) -> Cell + Send + Sync + 'static,
    {
        Self {
            name,
            func: Arc::new(func),
        }
    }

    pub fn call(&self, script: ScriptId, params: &[Cell]) -> Cell {
        (self.func)(script, params)
    }
}

impl fmt::Debug for NativeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeInfo").field("name", &self.name).finish()
    }
}

/// The external script virtual machine
///
/// `execute` may re-enter the hook chain synchronously, so implementations
/// must not hold locks across it.
pub trait ScriptVm: Send + Sync {
    /// Resolve a public callback of `script` taking `params`
    fn register_forward(&self, script: ScriptId, callback: &str, params: &[WireType]) -> Option<ForwardRef>;

    fn unregister_forward(&self, forward: ForwardRef);

    /// Run a callback and return its raw hook chain code
    fn execute(&self, forward: ForwardRef, ctx: &mut CallContext<'_>) -> Cell;

    /// Make natives callable from scripts
    fn add_natives(&self, natives: Vec<NativeInfo>) {
        let _ = natives;
    }
}
