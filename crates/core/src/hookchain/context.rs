//! Per-call marshaling state
//!
//! A [`CallContext`] is built for every dispatched call. It borrows the
//! call site's arguments through tagged [`ArgumentHandle`]s, owns the tagged
//! [`ReturnSlot`], and counts temp strings allocated on behalf of this call.
//! Handles cannot outlive the context, and the context cannot outlive the
//! dispatch that created it.

use std::fmt;

use reapi_sdk::ScriptId;

use super::error::HookChainError;
use super::strings::{TempStringArena, EXHAUSTED_SENTINEL};
use super::wire::{ArgSpec, NativeStr, WireCell, WireType, WireValue, Word};

/// Maximum number of arguments a hook point may have
pub const MAX_HOOKCHAIN_ARGS: usize = 12;

/// Borrowed, tagged reference to one argument's storage
pub struct ArgumentHandle<'a> {
    cell: &'a mut dyn WireCell,
    ty: WireType,
}

impl<'a> ArgumentHandle<'a> {
    /// Borrow a native value
    pub fn new<T: WireValue>(value: &'a mut T) -> Self {
        Self {
            cell: value,
            ty: T::WIRE_TYPE,
        }
    }

    pub fn wire_type(&self) -> WireType {
        self.ty
    }

    /// Current value
    pub fn get(&self) -> Word {
        self.cell.load()
    }

    /// Overwrite the value; the word must carry this argument's type
    pub fn set(&mut self, word: Word) -> Result<(), HookChainError> {
        if word.wire_type() != self.ty || !self.cell.store(word) {
            return Err(HookChainError::TypeMismatch {
                expected: self.ty,
                found: word.wire_type(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ArgumentHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentHandle")
            .field("ty", &self.ty)
            .field("value", &self.get())
            .finish()
    }
}

/// Fixed-capacity ordered list of argument handles
#[derive(Debug)]
pub struct ArgList<'a> {
    handles: Vec<ArgumentHandle<'a>>,
}

impl<'a> ArgList<'a> {
    pub fn new() -> Self {
        Self {
            handles: Vec::with_capacity(MAX_HOOKCHAIN_ARGS),
        }
    }

    /// Append a handle; arguments past the capacity are dropped
    pub fn push(&mut self, handle: ArgumentHandle<'a>) {
        if self.handles.len() < MAX_HOOKCHAIN_ARGS {
            self.handles.push(handle);
        } else {
            tracing::error!("Hook chain argument {} dropped, limit is {}", self.handles.len(), MAX_HOOKCHAIN_ARGS);
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArgumentHandle<'a>> {
        self.handles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ArgumentHandle<'a>> {
        self.handles.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgumentHandle<'a>> {
        self.handles.iter()
    }

    /// Whether any argument is a string
    pub fn has_strings(&self) -> bool {
        self.handles.iter().any(|h| h.ty == WireType::String)
    }

    /// Read an argument as a native type, zero when missing or mistyped
    pub fn value_as<T: WireValue>(&self, index: usize) -> T {
        self.handles
            .get(index)
            .and_then(|h| T::from_word(h.get()))
            .unwrap_or_default()
    }
}

impl Default for ArgList<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A native argument tuple that can be exposed to hook callbacks
pub trait HookArgs: Copy {
    /// Wire type and width of every argument, in order
    const SIGNATURE: &'static [ArgSpec];

    /// Borrow every argument
    fn capture(&mut self) -> ArgList<'_>;

    /// Rebuild the tuple from the (possibly hook-modified) handles
    fn load(args: &ArgList<'_>) -> Self;
}

macro_rules! impl_hook_args {
    ($($idx:tt $T:ident $v:ident),*) => {
        impl<$($T: WireValue),*> HookArgs for ($($T,)*) {
            const SIGNATURE: &'static [ArgSpec] = &[$(ArgSpec::of::<$T>()),*];

            #[allow(unused_mut)]
            fn capture(&mut self) -> ArgList<'_> {
                let mut list = ArgList::new();
                let ($($v,)*) = self;
                $( list.push(ArgumentHandle::new($v)); )*
                list
            }

            #[allow(unused_variables, clippy::unused_unit)]
            fn load(args: &ArgList<'_>) -> Self {
                ($(args.value_as::<$T>($idx),)*)
            }
        }
    };
}

impl_hook_args!();
impl_hook_args!(0 A0 a0);
impl_hook_args!(0 A0 a0, 1 A1 a1);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5, 6 A6 a6);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5, 6 A6 a6, 7 A7 a7);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5, 6 A6 a6, 7 A7 a7, 8 A8 a8);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5, 6 A6 a6, 7 A7 a7, 8 A8 a8, 9 A9 a9);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5, 6 A6 a6, 7 A7 a7, 8 A8 a8, 9 A9 a9, 10 A10 a10);
impl_hook_args!(0 A0 a0, 1 A1 a1, 2 A2 a2, 3 A3 a3, 4 A4 a4, 5 A5 a5, 6 A6 a6, 7 A7 a7, 8 A8 a8, 9 A9 a9, 10 A10 a10, 11 A11 a11);

/// Tagged return value of one call
#[derive(Debug, Clone, Copy)]
pub struct ReturnSlot {
    set: bool,
    ty: Option<WireType>,
    storage: Word,
}

impl ReturnSlot {
    /// Slot for a hook point returning `ty`, or `None` for void
    pub fn new(ty: Option<WireType>) -> Self {
        Self {
            set: false,
            ty,
            storage: Word::zero(ty.unwrap_or(WireType::Integer)),
        }
    }

    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Declared return type, `None` for void hook points
    pub fn wire_type(&self) -> Option<WireType> {
        self.ty
    }

    /// Current value, if any callback or the original populated it
    pub fn get(&self) -> Option<Word> {
        self.set.then_some(self.storage)
    }

    /// Store a value of the declared type
    pub fn set(&mut self, word: Word) -> Result<(), HookChainError> {
        let Some(ty) = self.ty else {
            return Err(HookChainError::VoidReturn);
        };
        if word.wire_type() != ty {
            return Err(HookChainError::TypeMismatch {
                expected: ty,
                found: word.wire_type(),
            });
        }

        self.storage = word;
        self.set = true;
        Ok(())
    }

    /// Clear and re-declare before a chain walk
    pub fn reset(&mut self, ty: Option<WireType>) {
        *self = Self::new(ty);
    }

    /// Read back as the declared native type
    pub fn value_as<R: WireValue>(&self) -> R {
        self.get().and_then(R::from_word).unwrap_or_default()
    }
}

/// Per-invocation marshaling state handed to every callback
pub struct CallContext<'a> {
    args: ArgList<'a>,
    ret: ReturnSlot,
    temp_strings_used: Option<usize>,
    arena: &'a TempStringArena,
    original_called: bool,
}

impl<'a> CallContext<'a> {
    /// Build a context over already captured arguments
    ///
    /// Temp string tracking is enabled only when an argument is a string;
    /// otherwise this call never touches the arena.
    pub fn new(args: ArgList<'a>, arena: &'a TempStringArena) -> Self {
        let temp_strings_used = args.has_strings().then_some(0);
        Self {
            args,
            ret: ReturnSlot::new(None),
            temp_strings_used,
            arena,
            original_called: false,
        }
    }

    /// Build a context borrowing a native argument tuple
    pub fn capture<A: HookArgs>(args: &'a mut A, arena: &'a TempStringArena) -> Self {
        Self::new(args.capture(), arena)
    }

    /// Clear the return slot and declare its type
    pub fn reset(&mut self, ret: Option<WireType>) {
        self.ret.reset(ret);
    }

    pub fn args(&self) -> &ArgList<'a> {
        &self.args
    }

    pub fn args_count(&self) -> usize {
        self.args.len()
    }

    /// Type of argument `index`
    pub fn arg_type(&self, index: usize) -> Option<WireType> {
        self.args.get(index).map(ArgumentHandle::wire_type)
    }

    /// Value of argument `index`
    pub fn arg(&self, index: usize) -> Option<Word> {
        self.args.get(index).map(ArgumentHandle::get)
    }

    /// Overwrite argument `index`; the original receives the new value
    pub fn set_arg(&mut self, index: usize, word: Word) -> Result<(), HookChainError> {
        let count = self.args.len();
        self.args
            .get_mut(index)
            .ok_or(HookChainError::ArgumentOutOfRange { index, count })?
            .set(word)
    }

    /// Replace string argument `index` with a copy of `value`
    pub fn set_arg_string(&mut self, index: usize, owner: ScriptId, value: &str) -> Result<NativeStr, HookChainError> {
        let count = self.args.len();
        match self.args.get(index).map(ArgumentHandle::wire_type) {
            None => return Err(HookChainError::ArgumentOutOfRange { index, count }),
            Some(WireType::String) => {}
            Some(other) => {
                return Err(HookChainError::TypeMismatch {
                    expected: other,
                    found: WireType::String,
                })
            }
        }

        let s = self.temp_string(owner, value)?;
        self.set_arg(index, Word::String(s))?;
        Ok(s)
    }

    pub fn return_slot(&self) -> &ReturnSlot {
        &self.ret
    }

    pub fn return_type(&self) -> Option<WireType> {
        self.ret.wire_type()
    }

    pub fn is_return_set(&self) -> bool {
        self.ret.is_set()
    }

    pub fn return_value(&self) -> Option<Word> {
        self.ret.get()
    }

    /// Set the value used when a callback overrides the original
    pub fn set_return(&mut self, word: Word) -> Result<(), HookChainError> {
        self.ret.set(word)
    }

    /// Set a string return value, copied into the temp string arena
    pub fn set_return_string(&mut self, owner: ScriptId, value: &str) -> Result<NativeStr, HookChainError> {
        match self.ret.wire_type() {
            None => return Err(HookChainError::VoidReturn),
            Some(WireType::String) => {}
            Some(other) => {
                return Err(HookChainError::TypeMismatch {
                    expected: other,
                    found: WireType::String,
                })
            }
        }

        let s = self.temp_string(owner, value)?;
        self.ret.set(Word::String(s))?;
        Ok(s)
    }

    /// Whether the original function already ran for this call
    pub fn original_called(&self) -> bool {
        self.original_called
    }

    /// Temp strings allocated by this call, `None` when tracking is disabled
    pub fn temp_strings_used(&self) -> Option<usize> {
        self.temp_strings_used
    }

    /// Copy `value` into a scratch buffer owned by this call
    ///
    /// When the arena is exhausted the fixed sentinel string is returned
    /// instead, so the script still receives a valid string.
    pub fn temp_string(&mut self, owner: ScriptId, value: &str) -> Result<NativeStr, HookChainError> {
        let Some(used) = self.temp_strings_used.as_mut() else {
            return Err(HookChainError::TempStringsDisabled);
        };

        match self.arena.acquire(owner, value) {
            Some(s) => {
                *used += 1;
                Ok(s)
            }
            None => Ok(NativeStr::from_static(EXHAUSTED_SENTINEL)),
        }
    }

    /// Current argument values as the call site's tuple
    pub(crate) fn load_args<A: HookArgs>(&self) -> A {
        A::load(&self.args)
    }

    pub(crate) fn mark_original_called(&mut self) {
        self.original_called = true;
    }

    /// Store the original's result unless a callback already set one
    pub(crate) fn capture_original<R: WireValue>(&mut self, value: R) {
        if self.ret.is_set() {
            return;
        }
        if let Err(e) = self.ret.set(value.into_word()) {
            tracing::error!("Failed to capture original return value: {}", e);
        }
    }

    /// Final result converted to the declared type
    pub(crate) fn finish<R: WireValue>(&self) -> R {
        self.ret.value_as::<R>()
    }
}

impl Drop for CallContext<'_> {
    fn drop(&mut self) {
        if let Some(used) = self.temp_strings_used {
            self.arena.release(used);
        }
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("args", &self.args)
            .field("ret", &self.ret)
            .field("temp_strings_used", &self.temp_strings_used)
            .field("original_called", &self.original_called)
            .finish()
    }
}
