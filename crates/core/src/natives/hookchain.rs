//! Hook chain natives - scripts reading and rewriting the current call
//!
//! A VM binding calls these with the context it received in
//! [`ScriptVm::execute`](crate::hookchain::ScriptVm::execute). Misuse is
//! reported against the calling script and the native returns a zero value.

use std::ffi::c_void;

use reapi_engine::{DiagnosticCode, DiagnosticSink, HookIdentity};
use reapi_sdk::{cell_to_float, Cell, ScriptId};

use crate::hookchain::{CallContext, HookChainError, NativeStr, WireType, Word};

/// Value passed by a script to a setter native
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptValue<'s> {
    /// Raw cell, interpreted through the slot's type
    Cell(Cell),
    Float(f32),
    String(&'s str),
    /// Already typed value, e.g. a handle resolved by the VM binding
    Word(Word),
}

/// Calling script plus where to send its errors
#[derive(Clone, Copy)]
pub struct NativeCaller<'a> {
    pub script: ScriptId,
    pub sink: &'a dyn DiagnosticSink,
}

impl<'a> NativeCaller<'a> {
    pub fn new(script: ScriptId, sink: &'a dyn DiagnosticSink) -> Self {
        Self { script, sink }
    }

    fn fail(&self, native: &str, err: &HookChainError) {
        self.sink
            .report(&HookIdentity::native(self.script, native), DiagnosticCode::Native, &err.to_string());
    }
}

/// Convert a script value to a word of type `ty`
///
/// Strings are copied into the temp string arena of the call.
fn to_word(
    ctx: &mut CallContext<'_>,
    caller: NativeCaller<'_>,
    ty: WireType,
    value: ScriptValue<'_>,
) -> Result<Word, HookChainError> {
    let mismatch = |found| HookChainError::TypeMismatch { expected: ty, found };

    match (ty, value) {
        (_, ScriptValue::Word(word)) if word.wire_type() == ty => Ok(word),
        (_, ScriptValue::Word(word)) => Err(mismatch(word.wire_type())),
        (WireType::Integer, ScriptValue::Cell(c)) => Ok(Word::Integer(c)),
        (WireType::Bool, ScriptValue::Cell(c)) => Ok(Word::Bool(c != 0)),
        (WireType::Float, ScriptValue::Cell(c)) => Ok(Word::Float(cell_to_float(c))),
        (WireType::Float, ScriptValue::Float(f)) => Ok(Word::Float(f)),
        (WireType::String, ScriptValue::String(s)) => Ok(Word::String(ctx.temp_string(caller.script, s)?)),
        (_, ScriptValue::Cell(_)) => Err(mismatch(WireType::Integer)),
        (_, ScriptValue::Float(_)) => Err(mismatch(WireType::Float)),
        (_, ScriptValue::String(_)) => Err(mismatch(WireType::String)),
    }
}

/// Set the value used when the callback overrides the original
pub fn set_hookchain_return(ctx: &mut CallContext<'_>, caller: NativeCaller<'_>, value: ScriptValue<'_>) -> bool {
    let result = ctx
        .return_type()
        .ok_or(HookChainError::VoidReturn)
        .and_then(|ty| to_word(ctx, caller, ty, value))
        .and_then(|word| ctx.set_return(word));

    match result {
        Ok(()) => true,
        Err(e) => {
            caller.fail("SetHookChainReturn", &e);
            false
        }
    }
}

/// Current return value; zero of the declared type when not yet set
pub fn get_hookchain_return(ctx: &CallContext<'_>, caller: NativeCaller<'_>) -> Option<Word> {
    let Some(ty) = ctx.return_type() else {
        caller.fail("GetHookChainReturn", &HookChainError::VoidReturn);
        return None;
    };
    Some(ctx.return_value().unwrap_or_else(|| Word::zero(ty)))
}

/// Overwrite argument `index` (0-based) for the rest of the chain and the original
pub fn set_hookchain_arg(
    ctx: &mut CallContext<'_>,
    caller: NativeCaller<'_>,
    index: usize,
    value: ScriptValue<'_>,
) -> bool {
    let count = ctx.args_count();
    let result = ctx
        .arg_type(index)
        .ok_or(HookChainError::ArgumentOutOfRange { index, count })
        .and_then(|ty| to_word(ctx, caller, ty, value))
        .and_then(|word| ctx.set_arg(index, word));

    match result {
        Ok(()) => true,
        Err(e) => {
            caller.fail("SetHookChainArg", &e);
            false
        }
    }
}

/// Value of argument `index` (0-based)
pub fn get_hookchain_arg(ctx: &CallContext<'_>, caller: NativeCaller<'_>, index: usize) -> Option<Word> {
    let arg = ctx.arg(index);
    if arg.is_none() {
        let err = HookChainError::ArgumentOutOfRange {
            index,
            count: ctx.args_count(),
        };
        caller.fail("GetHookChainArg", &err);
    }
    arg
}

/// String argument `index`; other types are reported as a mismatch
pub fn get_hookchain_arg_string(ctx: &CallContext<'_>, caller: NativeCaller<'_>, index: usize) -> Option<NativeStr> {
    match get_hookchain_arg(ctx, caller, index)? {
        Word::String(s) => Some(s),
        word => {
            let err = HookChainError::TypeMismatch {
                expected: WireType::String,
                found: word.wire_type(),
            };
            caller.fail("GetHookChainArg", &err);
            None
        }
    }
}

/// Address behind handle argument `index`
pub fn get_hookchain_arg_handle(ctx: &CallContext<'_>, caller: NativeCaller<'_>, index: usize) -> Option<*mut c_void> {
    match get_hookchain_arg(ctx, caller, index)? {
        Word::EntityHandle(p) => Some(p.as_ptr().cast()),
        Word::EdictHandle(p) => Some(p.as_ptr().cast()),
        Word::EntVarsHandle(p) => Some(p.as_ptr().cast()),
        word => {
            let err = HookChainError::TypeMismatch {
                expected: WireType::EntityHandle,
                found: word.wire_type(),
            };
            caller.fail("GetHookChainArg", &err);
            None
        }
    }
}

pub fn get_hookchain_arg_count(ctx: &CallContext<'_>) -> Cell {
    ctx.args_count() as Cell
}

/// Whether the original function already ran for the current call
pub fn is_original_called(ctx: &CallContext<'_>) -> bool {
    ctx.original_called()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hookchain::testing::RecordingSink;
    use crate::hookchain::{EntityPtr, NativeStr, TempStringArena};
    use reapi_sdk::float_to_cell;

    const SCRIPT: ScriptId = ScriptId(4);

    #[test]
    fn test_return_natives() {
        let sink = RecordingSink::new();
        let caller = NativeCaller::new(SCRIPT, sink.as_ref());
        let arena = TempStringArena::new(2, 16);
        let mut args = (EntityPtr::null(), 1.5f32);
        let mut ctx = CallContext::capture(&mut args, &arena);
        ctx.reset(Some(WireType::Float));

        assert_eq!(get_hookchain_return(&ctx, caller), Some(Word::Float(0.0)));
        assert!(set_hookchain_return(&mut ctx, caller, ScriptValue::Cell(float_to_cell(2.0))));
        assert_eq!(get_hookchain_return(&ctx, caller), Some(Word::Float(2.0)));

        assert!(!set_hookchain_return(&mut ctx, caller, ScriptValue::String("x")));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].callback, "SetHookChainReturn");
        assert_eq!(reports[0].code, DiagnosticCode::Native);
    }

    #[test]
    fn test_void_return_reported() {
        let sink = RecordingSink::new();
        let caller = NativeCaller::new(SCRIPT, sink.as_ref());
        let arena = TempStringArena::new(0, 16);
        let mut args = ();
        let mut ctx = CallContext::capture(&mut args, &arena);

        assert!(!set_hookchain_return(&mut ctx, caller, ScriptValue::Cell(1)));
        assert_eq!(get_hookchain_return(&ctx, caller), None);
        assert_eq!(sink.reports().len(), 2);
    }

    #[test]
    fn test_arg_natives() {
        let sink = RecordingSink::new();
        let caller = NativeCaller::new(SCRIPT, sink.as_ref());
        let arena = TempStringArena::new(2, 16);
        let mut args = (3i32, true, NativeStr::from_static(c"de_dust2"));
        {
            let mut ctx = CallContext::capture(&mut args, &arena);
            assert_eq!(get_hookchain_arg_count(&ctx), 3);
            assert!(!is_original_called(&ctx));

            assert!(set_hookchain_arg(&mut ctx, caller, 0, ScriptValue::Cell(8)));
            assert!(set_hookchain_arg(&mut ctx, caller, 1, ScriptValue::Cell(0)));
            assert!(set_hookchain_arg(&mut ctx, caller, 2, ScriptValue::String("de_inferno")));
            assert_eq!(get_hookchain_arg(&ctx, caller, 0), Some(Word::Integer(8)));

            assert!(!set_hookchain_arg(&mut ctx, caller, 3, ScriptValue::Cell(1)));
            assert_eq!(get_hookchain_arg(&ctx, caller, 7), None);
            assert_eq!(sink.reports().len(), 2);
        }

        assert_eq!(args.0, 8);
        assert!(!args.1);
        assert_eq!(unsafe { args.2.to_string_lossy() }, "de_inferno");
        assert_eq!(arena.in_use(), 0);
    }

    #[test]
    fn test_typed_arg_getters() {
        let sink = RecordingSink::new();
        let caller = NativeCaller::new(SCRIPT, sink.as_ref());
        let arena = TempStringArena::new(1, 16);
        let victim = EntityPtr::from_ptr(0x40 as *mut _);
        let mut args = (victim, NativeStr::from_static(c"say hi"), 2i32);
        let ctx = CallContext::capture(&mut args, &arena);

        let command = get_hookchain_arg_string(&ctx, caller, 1).unwrap();
        assert_eq!(unsafe { command.to_string_lossy() }, "say hi");
        assert_eq!(get_hookchain_arg_handle(&ctx, caller, 0), Some(victim.as_ptr().cast::<c_void>()));
        assert!(sink.reports().is_empty());

        assert_eq!(get_hookchain_arg_string(&ctx, caller, 2), None);
        assert_eq!(get_hookchain_arg_handle(&ctx, caller, 1), None);
        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].callback, "GetHookChainArg");
    }

    #[test]
    fn test_handle_requires_typed_word() {
        let sink = RecordingSink::new();
        let caller = NativeCaller::new(SCRIPT, sink.as_ref());
        let arena = TempStringArena::new(0, 16);
        let mut args = (EntityPtr::null(),);
        let mut ctx = CallContext::capture(&mut args, &arena);

        assert!(!set_hookchain_arg(&mut ctx, caller, 0, ScriptValue::Cell(1)));
        assert!(set_hookchain_arg(
            &mut ctx,
            caller,
            0,
            ScriptValue::Word(Word::EntityHandle(EntityPtr::null()))
        ));
    }
}
