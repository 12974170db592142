//! Dispatch engine - walks a hook point's callback chain around the original call
//!
//! ```text
//! pre-hooks ──▶ original (unless superceded) ──▶ post-hooks ──▶ return slot
//!     │ BREAK
//!     └────────────────────────────────────────────────────────▶ return slot
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use reapi_engine::{ApiFlags, DiagnosticCode, DiagnosticSink, TracingSink};
use reapi_sdk::ScriptId;

use super::context::{CallContext, HookArgs};
use super::error::HookChainError;
use super::record::HookRecord;
use super::registry::{FunctionId, HookKey, HookPoint, HookRegistry, HookSignature};
use super::stack::{ContextStack, Frame, Phase};
use super::state::HookChainState;
use super::strings::TempStringArena;
use super::vm::ScriptVm;
use super::wire::{ArgSpec, WireValue};
use crate::config::CoreConfig;

/// Reported when a callback asks to skip the original without a return value
pub const PROTOCOL_VIOLATION: &str =
    "cannot suppress the original call without a return value set; call set_hookchain_return first";

/// The hook chain engine
///
/// Shared by reference: dispatch, registration and natives may all be
/// re-entered from inside a callback or an original function.
pub struct HookChain {
    registry: RwLock<HookRegistry>,
    vm: Arc<dyn ScriptVm>,
    diagnostics: Arc<dyn DiagnosticSink>,
    arena: TempStringArena,
    frames: ContextStack,
    apis: ApiFlags,
}

impl HookChain {
    /// Create an engine with no declared hook points
    ///
    /// Available APIs are taken from the engine globals when initialized.
    pub fn new(vm: Arc<dyn ScriptVm>, config: &CoreConfig) -> Self {
        let apis = reapi_engine::try_engine()
            .map(|engine| engine.apis)
            .unwrap_or_else(ApiFlags::all);

        Self {
            registry: RwLock::new(HookRegistry::new()),
            vm,
            diagnostics: Arc::new(TracingSink),
            arena: TempStringArena::new(config.temp_strings.count, config.temp_strings.size),
            frames: ContextStack::new(),
            apis,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Override the set of available host APIs
    pub fn with_apis(mut self, apis: ApiFlags) -> Self {
        self.apis = apis;
        self
    }

    pub fn vm(&self) -> &Arc<dyn ScriptVm> {
        &self.vm
    }

    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }

    pub fn arena(&self) -> &TempStringArena {
        &self.arena
    }

    pub fn apis(&self) -> ApiFlags {
        self.apis
    }

    /// Declare a value-returning hook point
    ///
    /// A string return type requires at least one string argument; otherwise
    /// scripts would have nowhere to keep an override.
    pub fn declare<A: HookArgs, R: WireValue>(&self, function: FunctionId, name: &str) -> Result<(), HookChainError> {
        self.registry
            .write()
            .declare(function, name, HookSignature::of::<A, R>())
    }

    /// Declare a hook point without a return value
    pub fn declare_void<A: HookArgs>(&self, function: FunctionId, name: &str) -> Result<(), HookChainError> {
        self.registry
            .write()
            .declare(function, name, HookSignature::void::<A>())
    }

    /// Register a script callback at a hook point
    ///
    /// The callback runs before the original function, or after it when
    /// `post` is set.
    pub fn register_hook(
        &self,
        function: FunctionId,
        script: ScriptId,
        callback: &str,
        post: bool,
    ) -> Result<HookKey, HookChainError> {
        let point = self
            .resolve(function)
            .ok_or(HookChainError::UnknownFunction(function))?;

        if let Some(required) = function.group().map(|group| group.required_api()) {
            if !self.apis.contains(required) {
                return Err(HookChainError::FeatureUnavailable {
                    function: point.name.clone(),
                    api: required.api_name(),
                });
            }
        }

        let forward = self
            .vm
            .register_forward(script, callback, &point.signature.params())
            .ok_or_else(|| HookChainError::ForwardNotFound {
                callback: callback.to_string(),
            })?;

        let registered = self
            .registry
            .write()
            .register(function, script, callback, forward, post);
        match registered {
            Ok((key, _)) => Ok(key),
            Err(e) => {
                self.vm.unregister_forward(forward);
                Err(e)
            }
        }
    }

    /// Record behind a registration key
    pub fn hook(&self, key: HookKey) -> Option<Arc<HookRecord>> {
        self.registry.read().hook(key).cloned()
    }

    /// Resume a paused hook
    pub fn enable_hook(&self, key: HookKey) -> Result<(), HookChainError> {
        self.hook(key).ok_or(HookChainError::HookNotFound)?.enable()
    }

    /// Pause a hook without removing it
    pub fn disable_hook(&self, key: HookKey) -> Result<(), HookChainError> {
        self.hook(key).ok_or(HookChainError::HookNotFound)?.pause()
    }

    /// Permanently stop every hook owned by `script`, returning how many
    pub fn stop_script_hooks(&self, script: ScriptId) -> usize {
        let registry = self.registry.read();
        let mut count = 0;
        for record in registry.script_hooks(script) {
            record.stop();
            count += 1;
        }
        count
    }

    /// Remove every hook owned by `script` and release its forwards
    pub fn unload_script(&self, script: ScriptId) -> usize {
        let removed = self.registry.write().remove_script(script);
        for record in &removed {
            self.vm.unregister_forward(record.forward());
        }

        if !removed.is_empty() {
            tracing::info!("Unloaded {} hooks owned by {}", removed.len(), script);
        }
        removed.len()
    }

    /// Snapshot of a declared hook point
    pub fn resolve(&self, function: FunctionId) -> Option<Arc<HookPoint>> {
        self.registry.read().resolve(function)
    }

    /// Number of registered hooks
    pub fn hook_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Number of dispatches in flight
    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// Innermost dispatch whose callbacks are running
    pub fn active_frame(&self) -> Option<Frame> {
        self.frames.active()
    }

    /// Run a value-returning hooked call
    ///
    /// `original` receives the argument values as left by the pre-hooks.
    pub fn call_forward<A, R, F>(&self, function: FunctionId, mut args: A, original: F) -> R
    where
        A: HookArgs,
        R: WireValue,
        F: FnOnce(A) -> R,
    {
        let Some(point) = self.prepare(function, A::SIGNATURE, Some(ArgSpec::of::<R>())) else {
            return original(args);
        };

        let frame = self.frames.enter(function);
        let mut ctx = CallContext::capture(&mut args, &self.arena);
        ctx.reset(Some(R::WIRE_TYPE));

        match self.walk_pre(&point, &mut ctx, true) {
            HookChainState::Break => return ctx.finish::<R>(),
            HookChainState::Supercede => {}
            HookChainState::Continue => {
                let call_args = ctx.load_args::<A>();
                frame.set_phase(Phase::Original);
                let result = original(call_args);
                ctx.mark_original_called();
                ctx.capture_original(result);
            }
        }

        frame.set_phase(Phase::Post);
        self.walk_post(&point, &mut ctx);
        ctx.finish::<R>()
    }

    /// Run a hooked call without a return value
    pub fn call_void_forward<A, F>(&self, function: FunctionId, mut args: A, original: F)
    where
        A: HookArgs,
        F: FnOnce(A),
    {
        let Some(point) = self.prepare(function, A::SIGNATURE, None) else {
            original(args);
            return;
        };

        let frame = self.frames.enter(function);
        let mut ctx = CallContext::capture(&mut args, &self.arena);
        ctx.reset(None);

        match self.walk_pre(&point, &mut ctx, false) {
            HookChainState::Break => return,
            HookChainState::Supercede => {}
            HookChainState::Continue => {
                let call_args = ctx.load_args::<A>();
                frame.set_phase(Phase::Original);
                original(call_args);
                ctx.mark_original_called();
            }
        }

        frame.set_phase(Phase::Post);
        self.walk_post(&point, &mut ctx);
    }

    /// Resolve the hook point, `None` when the call should go straight to the original
    fn prepare(&self, function: FunctionId, args: &[ArgSpec], ret: Option<ArgSpec>) -> Option<Arc<HookPoint>> {
        let point = self.resolve(function)?;

        if !point.signature.matches(args, ret) {
            tracing::error!(
                "Call to {} ({}) does not match its declared signature, hooks skipped",
                point.name,
                function
            );
            return None;
        }

        if point.is_empty() {
            return None;
        }
        Some(point)
    }

    /// Walk the pre-hooks and return the accumulated state
    fn walk_pre(&self, point: &HookPoint, ctx: &mut CallContext<'_>, has_return: bool) -> HookChainState {
        let mut state = HookChainState::Continue;

        for record in &point.pre {
            if !record.is_enabled() {
                continue;
            }

            let ret = HookChainState::from_code(self.vm.execute(record.forward(), ctx));
            tracing::trace!("{} pre {} -> {:?}", point.name, record.callback_name(), ret);

            if ret == HookChainState::Continue {
                continue;
            }

            if has_return && !ctx.is_return_set() {
                self.diagnostics
                    .report(&record.identity(), DiagnosticCode::Assert, PROTOCOL_VIOLATION);
                continue;
            }

            if ret == HookChainState::Break {
                return HookChainState::Break;
            }
            state = state.max(ret);
        }

        state
    }

    fn walk_post(&self, point: &HookPoint, ctx: &mut CallContext<'_>) {
        for record in &point.post {
            if !record.is_enabled() {
                continue;
            }

            let ret = HookChainState::from_code(self.vm.execute(record.forward(), ctx));
            tracing::trace!("{} post {} -> {:?}", point.name, record.callback_name(), ret);

            if ret == HookChainState::Break {
                break;
            }
        }
    }
}
