//! Test doubles for the script VM and the diagnostic sink

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use reapi_engine::{ApiFlags, DiagnosticCode, DiagnosticSink, HookIdentity};
use reapi_sdk::{Cell, ForwardRef, ScriptId};

use super::context::CallContext;
use super::dispatch::HookChain;
use super::state::HookChainState;
use super::vm::{NativeInfo, ScriptVm};
use super::wire::WireType;
use crate::config::CoreConfig;

type Callback = Arc<dyn Fn(&mut CallContext<'_>) -> Cell + Send + Sync>;

/// Script VM whose public functions are Rust closures
#[derive(Default)]
pub(crate) struct ScriptedVm {
    defined: Mutex<HashMap<(ScriptId, String), Callback>>,
    forwards: Mutex<Vec<Option<(String, Callback)>>>,
    calls: Mutex<Vec<String>>,
    unregistered: Mutex<Vec<ForwardRef>>,
    natives: Mutex<Vec<NativeInfo>>,
}

impl ScriptVm for ScriptedVm {
    fn register_forward(&self, script: ScriptId, callback: &str, _params: &[WireType]) -> Option<ForwardRef> {
        let func = self.defined.lock().get(&(script, callback.to_string())).cloned()?;
        let mut forwards = self.forwards.lock();
        forwards.push(Some((callback.to_string(), func)));
        Some(ForwardRef(forwards.len() as i32 - 1))
    }

    fn unregister_forward(&self, forward: ForwardRef) {
        if let Some(slot) = self.forwards.lock().get_mut(forward.index() as usize) {
            *slot = None;
        }
        self.unregistered.lock().push(forward);
    }

    fn execute(&self, forward: ForwardRef, ctx: &mut CallContext<'_>) -> Cell {
        // Clone out of the lock: callbacks may dispatch again
        let entry = self
            .forwards
            .lock()
            .get(forward.index() as usize)
            .cloned()
            .flatten();
        let Some((name, func)) = entry else {
            return HookChainState::Continue.code();
        };

        self.calls.lock().push(name);
        func(ctx)
    }

    fn add_natives(&self, natives: Vec<NativeInfo>) {
        self.natives.lock().extend(natives);
    }
}

impl ScriptedVm {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Define a public function of `script`
    pub(crate) fn define<F>(&self, script: ScriptId, name: &str, func: F)
    where
        F: Fn(&mut CallContext<'_>) -> HookChainState + Send + Sync + 'static,
    {
        self.define_raw(script, name, move |ctx| func(ctx).code());
    }

    /// Define a public function returning a raw code
    pub(crate) fn define_raw<F>(&self, script: ScriptId, name: &str, func: F)
    where
        F: Fn(&mut CallContext<'_>) -> Cell + Send + Sync + 'static,
    {
        self.defined
            .lock()
            .insert((script, name.to_string()), Arc::new(func));
    }

    /// Names of executed callbacks, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn unregistered(&self) -> Vec<ForwardRef> {
        self.unregistered.lock().clone()
    }

    /// Call a native added through `add_natives`
    pub(crate) fn call_native(&self, name: &str, script: ScriptId, params: &[Cell]) -> Option<Cell> {
        let native = self.natives.lock().iter().find(|n| n.name == name).cloned()?;
        Some(native.call(script, params))
    }

    pub(crate) fn native_names(&self) -> Vec<&'static str> {
        self.natives.lock().iter().map(|n| n.name).collect()
    }
}

/// One captured diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Report {
    pub script: ScriptId,
    pub callback: String,
    pub function: String,
    pub code: DiagnosticCode,
    pub message: String,
}

/// Sink that keeps every diagnostic
#[derive(Default)]
pub(crate) struct RecordingSink {
    reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, hook: &HookIdentity<'_>, code: DiagnosticCode, message: &str) {
        self.reports.lock().push(Report {
            script: hook.script,
            callback: hook.callback.to_string(),
            function: hook.function.to_string(),
            code,
            message: message.to_string(),
        });
    }
}

/// Engine with every API available, wired to a scripted VM and a recording sink
pub(crate) fn test_chain() -> (HookChain, Arc<ScriptedVm>, Arc<RecordingSink>) {
    let vm = ScriptedVm::new();
    let sink = RecordingSink::new();
    let chain = HookChain::new(vm.clone(), &CoreConfig::default())
        .with_diagnostics(sink.clone())
        .with_apis(ApiFlags::all());
    (chain, vm, sink)
}
