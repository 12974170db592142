//! C-compatible exports called by the host bridge

use std::ffi::{c_char, c_void, CStr};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use slotmap::{Key, KeyData};
use tracing::instrument;
use tracing_subscriber::EnvFilter;

use reapi_core::config::{base_dir_from_binary, init_base_dir};
use reapi_core::hookchain::{CallContext, FunctionId, HookChain, HookKey, Word};
use reapi_core::natives::{self, NativeCaller, ScriptValue};
use reapi_sdk::{cell_to_float, float_to_cell, Cell, ScriptId};
use reapi_core::CoreConfig;
use reapi_engine::{init_engine, load_apis, try_engine, DiagnosticCode, DiagnosticSink, HookIdentity};

use super::host::{FfiScriptVm, HostApi, HostApiProvider, HostSink};

// Plugin metadata - static strings with null terminators for C compatibility
static AUTHOR: &[u8] = b"reapi-rs contributors\0";
static NAME: &[u8] = b"ReAPI\0";
static DESCRIPTION: &[u8] = b"Hook chains and natives for scripts on ReHLDS/ReGameDLL servers\0";
static URL: &[u8] = b"https://github.com/reapi-rs/reapi-rs\0";
static LICENSE: &[u8] = b"GPL-3.0\0";
static VERSION: &[u8] = b"0.1.0\0";
static LOG_TAG: &[u8] = b"REAPI\0";

static VM: OnceLock<Arc<FfiScriptVm>> = OnceLock::new();
static CHAIN: OnceLock<HookChain> = OnceLock::new();

/// Hook chain engine, once the plugin is loaded
///
/// Call sites declare their hook points and dispatch through this.
pub fn hook_chain() -> Option<&'static HookChain> {
    CHAIN.get()
}

/// Called when the host loads the plugin
///
/// `binary_path` is the location of this library and is used to find the
/// config directory; pass null to derive it from the process.
///
/// # Safety
/// - `host` must point to a valid callback table that outlives the plugin
/// - `binary_path` must be a valid null-terminated C string or null
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn reapi_plugin_load(
    host: *const HostApi,
    binary_path: *const c_char,
    error: *mut c_char,
    maxlen: usize,
) -> bool {
    if !binary_path.is_null() {
        let binary = PathBuf::from(CStr::from_ptr(binary_path).to_string_lossy().into_owned());
        if let Some(base) = base_dir_from_binary(&binary) {
            init_base_dir(base);
        }
    }

    let (config, config_error) = match CoreConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (CoreConfig::default(), Some(e)),
    };

    // Initialize tracing subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_directive()))
        .try_init();

    tracing::info!("ReAPI loading...");
    if let Some(e) = config_error {
        tracing::warn!("Failed to load core config, using defaults: {}", e);
    }

    let Some(host) = host.as_ref().copied() else {
        write_error(error, maxlen, "Host API table is null");
        return false;
    };

    let globals = load_apis(&HostApiProvider(host));
    globals.set_max_clients(config.max_clients);
    if let Err(e) = init_engine(globals) {
        tracing::error!("Failed to init engine: {}", e);
        write_error(error, maxlen, &e.to_string());
        return false;
    }

    let vm = Arc::new(FfiScriptVm::new(host));
    let sink: Arc<dyn DiagnosticSink> = Arc::new(HostSink(host));
    let chain = HookChain::new(vm.clone(), &config).with_diagnostics(Arc::clone(&sink));

    if let Some(engine) = try_engine() {
        natives::register_addon_natives(&*vm, engine, sink);
    }

    if VM.set(vm).is_err() || CHAIN.set(chain).is_err() {
        write_error(error, maxlen, "ReAPI is already loaded");
        return false;
    }

    tracing::info!("ReAPI loaded successfully!");

    true
}

/// Called when the host unloads the plugin
///
/// # Safety
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn reapi_plugin_unload(error: *mut c_char, maxlen: usize) -> bool {
    tracing::info!("ReAPI unloading...");

    match std::panic::catch_unwind(reapi_core::shutdown) {
        Ok(()) => true,
        Err(_) => {
            write_error(error, maxlen, "Panic during shutdown");
            false
        }
    }
}

// Metadata exports - static strings for the host to display

#[no_mangle]
pub extern "C" fn reapi_get_author() -> *const c_char {
    AUTHOR.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn reapi_get_name() -> *const c_char {
    NAME.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn reapi_get_description() -> *const c_char {
    DESCRIPTION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn reapi_get_url() -> *const c_char {
    URL.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn reapi_get_license() -> *const c_char {
    LICENSE.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn reapi_get_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn reapi_get_log_tag() -> *const c_char {
    LOG_TAG.as_ptr() as *const c_char
}

// === Server state ===

/// Called from the host when a map activates with the real player slot count
#[no_mangle]
pub extern "C" fn reapi_set_max_clients(max_clients: u32) {
    if let Some(engine) = try_engine() {
        engine.set_max_clients(max_clients as usize);
    }
}

// === Hook registration ===

/// RegisterHookChain
///
/// Returns the hook handle, or 0 on failure (reported to the script).
///
/// # Safety
/// - `callback` must be a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn reapi_register_hook(function: u32, script: u32, callback: *const c_char, post: bool) -> u64 {
    let (Some(chain), false) = (CHAIN.get(), callback.is_null()) else {
        return 0;
    };
    let callback = CStr::from_ptr(callback).to_string_lossy();

    match chain.register_hook(FunctionId(function), ScriptId(script), &callback, post) {
        Ok(key) => key.data().as_ffi(),
        Err(e) => {
            let identity = HookIdentity::native(ScriptId(script), "RegisterHookChain");
            chain
                .diagnostics()
                .report(&identity, DiagnosticCode::Native, &e.to_string());
            0
        }
    }
}

fn hook_key(handle: u64) -> HookKey {
    HookKey::from(KeyData::from_ffi(handle))
}

/// EnableHookChain
#[no_mangle]
pub extern "C" fn reapi_enable_hook(handle: u64) -> bool {
    CHAIN
        .get()
        .is_some_and(|chain| chain.enable_hook(hook_key(handle)).is_ok())
}

/// DisableHookChain
#[no_mangle]
pub extern "C" fn reapi_disable_hook(handle: u64) -> bool {
    CHAIN
        .get()
        .is_some_and(|chain| chain.disable_hook(hook_key(handle)).is_ok())
}

/// Called from the host when a script stops running
#[no_mangle]
pub extern "C" fn reapi_script_unloaded(script: u32) {
    if let Some(chain) = CHAIN.get() {
        chain.unload_script(ScriptId(script));
    }
}

/// Entry point for every native handed out through `HostApi::add_native`
///
/// # Safety
/// - `params` must point to `count` cells, or be null when `count` is 0
#[no_mangle]
pub unsafe extern "C" fn reapi_call_native(id: u32, script: u32, params: *const Cell, count: usize) -> Cell {
    let Some(native) = VM.get().and_then(|vm| vm.native(id)) else {
        return 0;
    };

    let params = if params.is_null() || count == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(params, count)
    };
    native.call(ScriptId(script), params)
}

// === Context natives ===
// `ctx` is the pointer passed to `HostApi::execute_forward` and is only
// valid until that call returns.

unsafe fn with_ctx<R: Default>(ctx: *mut c_void, f: impl FnOnce(&mut CallContext<'_>) -> R) -> R {
    match (ctx as *mut CallContext<'_>).as_mut() {
        Some(ctx) => f(ctx),
        None => R::default(),
    }
}

fn caller(script: u32) -> Option<NativeCaller<'static>> {
    CHAIN
        .get()
        .map(|chain| NativeCaller::new(ScriptId(script), chain.diagnostics()))
}

/// Raw cell of a word, as scripts see it
fn word_to_cell(word: Word) -> Cell {
    match word {
        Word::Integer(v) => v,
        Word::Float(v) => float_to_cell(v),
        Word::Bool(v) => v as Cell,
        // Handles and strings are not cells; scripts read them through typed natives
        _ => 0,
    }
}

/// GetHookChainArgCount
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_arg_count(ctx: *mut c_void) -> Cell {
    with_ctx(ctx, |ctx| natives::get_hookchain_arg_count(ctx))
}

/// GetHookChainArg for cell-typed arguments (0-based index)
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_get_arg_cell(ctx: *mut c_void, script: u32, index: u32) -> Cell {
    let Some(caller) = caller(script) else {
        return 0;
    };
    with_ctx(ctx, |ctx| {
        natives::get_hookchain_arg(ctx, caller, index as usize).map_or(0, word_to_cell)
    })
}

/// GetHookChainArg for string arguments (0-based index)
///
/// Copies the string into `buffer`, truncated to `maxlen - 1` bytes, and
/// returns the number of bytes written.
///
/// # Safety
/// - `ctx` must be a live context pointer or null
/// - `buffer` must be a valid pointer to at least `maxlen` bytes, or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_get_arg_string(
    ctx: *mut c_void,
    script: u32,
    index: u32,
    buffer: *mut c_char,
    maxlen: usize,
) -> Cell {
    let Some(caller) = caller(script) else {
        return 0;
    };
    with_ctx(ctx, |ctx| {
        natives::get_hookchain_arg_string(ctx, caller, index as usize)
            .and_then(|s| s.as_cstr())
            .map_or(0, |s| copy_to_buffer(buffer, maxlen, s.to_bytes()) as Cell)
    })
}

/// GetHookChainArg for entity, edict and entvars arguments (0-based index)
///
/// Returns the address of the record, 0 when the argument is not a handle.
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_get_arg_handle(ctx: *mut c_void, script: u32, index: u32) -> usize {
    let Some(caller) = caller(script) else {
        return 0;
    };
    with_ctx(ctx, |ctx| {
        natives::get_hookchain_arg_handle(ctx, caller, index as usize).map_or(0, |p| p as usize)
    })
}

/// SetHookChainArg for cell-typed arguments (0-based index)
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_set_arg_cell(ctx: *mut c_void, script: u32, index: u32, value: Cell) -> bool {
    let Some(caller) = caller(script) else {
        return false;
    };
    with_ctx(ctx, |ctx| {
        natives::set_hookchain_arg(ctx, caller, index as usize, ScriptValue::Cell(value))
    })
}

/// SetHookChainArg for string arguments; the string is copied
///
/// # Safety
/// - `ctx` must be a live context pointer or null
/// - `value` must be a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_set_arg_string(
    ctx: *mut c_void,
    script: u32,
    index: u32,
    value: *const c_char,
) -> bool {
    let (Some(caller), false) = (caller(script), value.is_null()) else {
        return false;
    };
    let value = CStr::from_ptr(value).to_string_lossy();
    with_ctx(ctx, |ctx| {
        natives::set_hookchain_arg(ctx, caller, index as usize, ScriptValue::String(&value))
    })
}

/// SetHookChainReturn for cell-typed return values
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_set_return_cell(ctx: *mut c_void, script: u32, value: Cell) -> bool {
    let Some(caller) = caller(script) else {
        return false;
    };
    with_ctx(ctx, |ctx| {
        natives::set_hookchain_return(ctx, caller, ScriptValue::Cell(value))
    })
}

/// SetHookChainReturn for float return values
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_set_return_float(ctx: *mut c_void, script: u32, value: f32) -> bool {
    let Some(caller) = caller(script) else {
        return false;
    };
    with_ctx(ctx, |ctx| {
        natives::set_hookchain_return(ctx, caller, ScriptValue::Float(value))
    })
}

/// GetHookChainReturn for cell-typed return values
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_get_return_cell(ctx: *mut c_void, script: u32) -> Cell {
    let Some(caller) = caller(script) else {
        return 0;
    };
    with_ctx(ctx, |ctx| {
        natives::get_hookchain_return(ctx, caller).map_or(0, word_to_cell)
    })
}

/// GetHookChainReturn for float return values
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_get_return_float(ctx: *mut c_void, script: u32) -> f32 {
    cell_to_float(reapi_ctx_get_return_cell(ctx, script))
}

/// IsReapiHookOriginalWasCalled
///
/// # Safety
/// - `ctx` must be a live context pointer or null
#[no_mangle]
pub unsafe extern "C" fn reapi_ctx_is_original_called(ctx: *mut c_void) -> bool {
    with_ctx(ctx, |ctx| natives::is_original_called(ctx))
}

/// Copy `bytes` into a C buffer with a NUL terminator, truncating to fit
///
/// Returns the number of bytes copied, terminator excluded.
///
/// # Safety
/// - `buffer` must be a valid pointer or null
/// - `maxlen` must accurately reflect the buffer size
unsafe fn copy_to_buffer(buffer: *mut c_char, maxlen: usize, bytes: &[u8]) -> usize {
    if buffer.is_null() || maxlen == 0 {
        return 0;
    }
    let len = bytes.len().min(maxlen - 1);
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer as *mut u8, len);
    *buffer.add(len) = 0;
    len
}

/// Helper to write an error message to a C buffer
///
/// # Safety
/// Same as [`copy_to_buffer`].
unsafe fn write_error(error: *mut c_char, maxlen: usize, msg: &str) {
    copy_to_buffer(error, maxlen, msg.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_truncates() {
        let mut buffer = [0x7f as c_char; 8];
        unsafe { write_error(buffer.as_mut_ptr(), buffer.len(), "Host API table is null") };

        let written = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        assert_eq!(written.to_str().unwrap(), "Host AP");
    }

    #[test]
    fn test_copy_to_buffer_counts_bytes() {
        let mut buffer = [0x7f as c_char; 16];
        let written = unsafe { copy_to_buffer(buffer.as_mut_ptr(), buffer.len(), b"say hi") };
        assert_eq!(written, 6);
        assert_eq!(unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_bytes(), b"say hi");

        assert_eq!(unsafe { copy_to_buffer(std::ptr::null_mut(), 16, b"x") }, 0);
        assert_eq!(unsafe { copy_to_buffer(buffer.as_mut_ptr(), 0, b"x") }, 0);
    }

    #[test]
    fn test_word_to_cell() {
        assert_eq!(word_to_cell(Word::Integer(-4)), -4);
        assert_eq!(word_to_cell(Word::Bool(true)), 1);
        assert_eq!(word_to_cell(Word::Float(1.0)), 0x3F80_0000);
    }

    #[test]
    fn test_null_context_is_harmless() {
        let count = unsafe { reapi_ctx_arg_count(std::ptr::null_mut()) };
        assert_eq!(count, 0);
        assert!(!unsafe { reapi_ctx_is_original_called(std::ptr::null_mut()) });
        assert_eq!(unsafe { reapi_ctx_get_arg_handle(std::ptr::null_mut(), 1, 0) }, 0);

        let mut buffer = [0 as c_char; 4];
        let written = unsafe { reapi_ctx_get_arg_string(std::ptr::null_mut(), 1, 0, buffer.as_mut_ptr(), buffer.len()) };
        assert_eq!(written, 0);
    }
}
