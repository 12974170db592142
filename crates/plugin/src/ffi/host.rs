//! Host bridge - the script VM and API probes reached through C callbacks

use std::ffi::{c_char, c_void, CString};

use parking_lot::Mutex;

use reapi_core::hookchain::{CallContext, NativeInfo, ScriptVm, WireType};
use reapi_sdk::{Cell, ForwardRef, ScriptId};
use reapi_engine::{ApiFlags, ApiProvider, ApiVersion, DiagnosticCode, DiagnosticSink, HookIdentity};

/// Callback table supplied by the host on load
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostApi {
    /// Report the version of an optional API (`ApiFlags` bit); false when absent
    pub api_version: unsafe extern "C" fn(api: u32, major: *mut u32, minor: *mut u32) -> bool,

    /// Resolve a public script function; negative when not found
    pub register_forward:
        unsafe extern "C" fn(script: u32, callback: *const c_char, params: *const u8, count: usize) -> i32,

    pub unregister_forward: unsafe extern "C" fn(forward: i32),

    /// Run a forward; `ctx` is valid for the `reapi_ctx_*` exports during the call
    pub execute_forward: unsafe extern "C" fn(forward: i32, ctx: *mut c_void) -> Cell,

    /// Expose a native to scripts; calls come back through `reapi_call_native(id, ..)`
    pub add_native: unsafe extern "C" fn(name: *const c_char, id: u32),

    /// Raise a script runtime error
    pub log_error: unsafe extern "C" fn(script: u32, code: i32, message: *const c_char),
}

/// API discovery through [`HostApi::api_version`]
pub struct HostApiProvider(pub HostApi);

impl ApiProvider for HostApiProvider {
    fn version(&self, api: ApiFlags) -> Option<ApiVersion> {
        let (mut major, mut minor) = (0u32, 0u32);
        // SAFETY: the host guarantees its callbacks stay valid while loaded
        let found = unsafe { (self.0.api_version)(api.bits(), &mut major, &mut minor) };
        found.then(|| ApiVersion::new(major, minor))
    }
}

/// Script VM implemented by the host
pub struct FfiScriptVm {
    host: HostApi,
    natives: Mutex<Vec<NativeInfo>>,
}

impl FfiScriptVm {
    pub fn new(host: HostApi) -> Self {
        Self {
            host,
            natives: Mutex::new(Vec::new()),
        }
    }

    /// Native previously handed to the host
    pub fn native(&self, id: u32) -> Option<NativeInfo> {
        self.natives.lock().get(id as usize).cloned()
    }
}

impl ScriptVm for FfiScriptVm {
    fn register_forward(&self, script: ScriptId, callback: &str, params: &[WireType]) -> Option<ForwardRef> {
        let name = CString::new(callback).ok()?;
        let params: Vec<u8> = params.iter().map(|&ty| ty as u8).collect();

        // SAFETY: name and params outlive the call
        let forward = unsafe { (self.host.register_forward)(script.0, name.as_ptr(), params.as_ptr(), params.len()) };
        (forward >= 0).then_some(ForwardRef(forward))
    }

    fn unregister_forward(&self, forward: ForwardRef) {
        unsafe { (self.host.unregister_forward)(forward.index()) }
    }

    fn execute(&self, forward: ForwardRef, ctx: &mut CallContext<'_>) -> Cell {
        let ptr = ctx as *mut CallContext<'_> as *mut c_void;
        // SAFETY: the host only touches ctx through reapi_ctx_* during this call
        unsafe { (self.host.execute_forward)(forward.index(), ptr) }
    }

    fn add_natives(&self, natives: Vec<NativeInfo>) {
        // The host may call a native back from add_native, so it is told only
        // after the table lock is released
        let announced: Vec<(CString, u32)> = {
            let mut table = self.natives.lock();
            natives
                .into_iter()
                .filter_map(|native| {
                    let name = CString::new(native.name).ok()?;
                    let id = table.len() as u32;
                    table.push(native);
                    Some((name, id))
                })
                .collect()
        };

        for (name, id) in announced {
            unsafe { (self.host.add_native)(name.as_ptr(), id) };
        }
    }
}

/// Diagnostics raised as script runtime errors by the host
pub struct HostSink(pub HostApi);

impl DiagnosticSink for HostSink {
    fn report(&self, hook: &HookIdentity<'_>, code: DiagnosticCode, message: &str) {
        tracing::error!("[{}] {}: {}", code, hook, message);

        let text = format!("{}: {}", hook.callback, message);
        let Ok(text) = CString::new(text) else {
            return;
        };
        let code = match code {
            DiagnosticCode::Assert => 2,
            DiagnosticCode::Native => 10,
        };
        unsafe { (self.0.log_error)(hook.script.0, code, text.as_ptr()) }
    }
}
