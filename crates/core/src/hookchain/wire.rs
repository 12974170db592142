//! Wire types - uniform tagging of native hook values
//!
//! Every native value a hook point passes around is described by one
//! [`WireType`] and travels in a [`Word`], a tagged variant with exactly one
//! case per wire type. Reads and writes always go through the tag, so a slot
//! declared as `Float` can never be read back as an integer.
//!
//! # Word width
//!
//! ```text
//! Integer / Float / Bool                    -> one script cell (4 bytes)
//! String / EntityHandle / EdictHandle /
//! EntVarsHandle                             -> one native pointer
//! ```
//!
//! Types wider than their word (`i64`, `u64`, `f64`) are still tagged so a
//! signature containing them can be described - and then rejected when the
//! hook point is declared.

use std::ffi::{c_char, CStr};
use std::fmt;

use reapi_sdk::{CBaseEntity, Cell, Edict, EntVars};

/// Closed set of value kinds exchanged with script callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Integer = 0,
    Float,
    String,
    /// Game entity object (`CBaseEntity*`)
    EntityHandle,
    /// Engine entity slot (`edict_t*`)
    EdictHandle,
    /// Entity variables record (`entvars_t*`)
    EntVarsHandle,
    Bool,
}

impl WireType {
    /// Widest native value (in bytes) that fits in one word of this type
    pub const fn max_width(self) -> usize {
        match self {
            Self::Integer | Self::Float | Self::Bool => std::mem::size_of::<Cell>(),
            Self::String | Self::EntityHandle | Self::EdictHandle | Self::EntVarsHandle => {
                std::mem::size_of::<usize>()
            }
        }
    }

    /// Whether scripts see this value as an opaque reference
    pub const fn is_handle(self) -> bool {
        matches!(
            self,
            Self::EntityHandle | Self::EdictHandle | Self::EntVarsHandle
        )
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::EntityHandle => "entity",
            Self::EdictHandle => "edict",
            Self::EntVarsHandle => "entvars",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Pointer to a NUL-terminated native string
///
/// Strings are borrowed from the host (or from the temp string arena) and
/// only valid for the duration of the hooked call.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct NativeStr(*const c_char);

impl NativeStr {
    /// Null string pointer
    pub const fn null() -> Self {
        Self(std::ptr::null())
    }

    /// Wrap a raw string pointer
    pub const fn from_ptr(ptr: *const c_char) -> Self {
        Self(ptr)
    }

    /// Wrap a string with static storage
    pub const fn from_static(s: &'static CStr) -> Self {
        Self(s.as_ptr())
    }

    pub fn as_ptr(self) -> *const c_char {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Borrow the string contents
    ///
    /// # Safety
    /// The pointer must be null or point to a NUL-terminated string that
    /// outlives the returned reference.
    pub unsafe fn as_cstr<'s>(self) -> Option<&'s CStr> {
        if self.0.is_null() {
            None
        } else {
            Some(CStr::from_ptr(self.0))
        }
    }

    /// Copy the string contents, replacing invalid UTF-8
    ///
    /// # Safety
    /// Same as [`NativeStr::as_cstr`].
    pub unsafe fn to_string_lossy(self) -> String {
        self.as_cstr()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Default for NativeStr {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for NativeStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeStr({:p})", self.0)
    }
}

macro_rules! native_record_ptr {
    ($(#[$meta:meta])* $name:ident => $record:ty) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(*mut $record);

        impl $name {
            pub const fn null() -> Self {
                Self(std::ptr::null_mut())
            }

            pub const fn from_ptr(ptr: *mut $record) -> Self {
                Self(ptr)
            }

            pub fn as_ptr(self) -> *mut $record {
                self.0
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::null()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), self.0)
            }
        }
    };
}

native_record_ptr!(
    /// Pointer to a game entity object
    EntityPtr => CBaseEntity
);
native_record_ptr!(
    /// Pointer to an engine entity slot
    EdictPtr => Edict
);
native_record_ptr!(
    /// Pointer to an entity variables record
    EntVarsPtr => EntVars
);

/// One word of hook data, tagged with its wire type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Word {
    Integer(Cell),
    Float(f32),
    String(NativeStr),
    EntityHandle(EntityPtr),
    EdictHandle(EdictPtr),
    EntVarsHandle(EntVarsPtr),
    Bool(bool),
}

impl Word {
    /// Tag of the value held
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Integer(_) => WireType::Integer,
            Self::Float(_) => WireType::Float,
            Self::String(_) => WireType::String,
            Self::EntityHandle(_) => WireType::EntityHandle,
            Self::EdictHandle(_) => WireType::EdictHandle,
            Self::EntVarsHandle(_) => WireType::EntVarsHandle,
            Self::Bool(_) => WireType::Bool,
        }
    }

    /// Zero value of a wire type
    pub fn zero(ty: WireType) -> Self {
        match ty {
            WireType::Integer => Self::Integer(0),
            WireType::Float => Self::Float(0.0),
            WireType::String => Self::String(NativeStr::null()),
            WireType::EntityHandle => Self::EntityHandle(EntityPtr::null()),
            WireType::EdictHandle => Self::EdictHandle(EdictPtr::null()),
            WireType::EntVarsHandle => Self::EntVarsHandle(EntVarsPtr::null()),
            WireType::Bool => Self::Bool(false),
        }
    }
}

/// A native type that can cross the hook chain boundary
pub trait WireValue: Copy + Default {
    /// Tag describing this type
    const WIRE_TYPE: WireType;

    /// Native byte width
    const WIDTH: usize = std::mem::size_of::<Self>();

    /// Store into a word, keeping exactly `WIDTH` bytes of information
    fn into_word(self) -> Word;

    /// Read back from a word; `None` when the tag does not match
    fn from_word(word: Word) -> Option<Self>;
}

macro_rules! integer_wire_value {
    ($($ty:ty),*) => {
        $(
            impl WireValue for $ty {
                const WIRE_TYPE: WireType = WireType::Integer;

                #[inline]
                fn into_word(self) -> Word {
                    Word::Integer(self as Cell)
                }

                #[inline]
                fn from_word(word: Word) -> Option<Self> {
                    match word {
                        Word::Integer(v) => Some(v as $ty),
                        _ => None,
                    }
                }
            }
        )*
    };
}

// i64/u64 get tagged too; their width fails declaration
integer_wire_value!(i8, i16, i32, u8, u16, u32, i64, u64);

impl WireValue for f32 {
    const WIRE_TYPE: WireType = WireType::Float;

    fn into_word(self) -> Word {
        Word::Float(self)
    }

    fn from_word(word: Word) -> Option<Self> {
        match word {
            Word::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl WireValue for f64 {
    const WIRE_TYPE: WireType = WireType::Float;

    fn into_word(self) -> Word {
        Word::Float(self as f32)
    }

    fn from_word(word: Word) -> Option<Self> {
        match word {
            Word::Float(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl WireValue for bool {
    const WIRE_TYPE: WireType = WireType::Bool;

    fn into_word(self) -> Word {
        Word::Bool(self)
    }

    fn from_word(word: Word) -> Option<Self> {
        match word {
            Word::Bool(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! pointer_wire_value {
    ($($ty:ident => $variant:ident),*) => {
        $(
            impl WireValue for $ty {
                const WIRE_TYPE: WireType = WireType::$variant;

                fn into_word(self) -> Word {
                    Word::$variant(self)
                }

                fn from_word(word: Word) -> Option<Self> {
                    match word {
                        Word::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

pointer_wire_value!(
    NativeStr => String,
    EntityPtr => EntityHandle,
    EdictPtr => EdictHandle,
    EntVarsPtr => EntVarsHandle
);

/// Signature entry for one argument or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgSpec {
    pub ty: WireType,
    pub width: usize,
}

impl ArgSpec {
    /// Describe a wire value type
    pub const fn of<T: WireValue>() -> Self {
        Self {
            ty: T::WIRE_TYPE,
            width: T::WIDTH,
        }
    }

    /// Whether the native value fits in one word of its type
    pub const fn fits_word(&self) -> bool {
        self.width <= self.ty.max_width()
    }
}

/// Type-erased mutable access to one argument's storage
pub trait WireCell {
    fn wire_type(&self) -> WireType;
    fn load(&self) -> Word;
    /// Returns `false` (and leaves the value untouched) on a tag mismatch
    fn store(&mut self, word: Word) -> bool;
}

impl<T: WireValue> WireCell for T {
    fn wire_type(&self) -> WireType {
        T::WIRE_TYPE
    }

    fn load(&self) -> Word {
        self.into_word()
    }

    fn store(&mut self, word: Word) -> bool {
        match T::from_word(word) {
            Some(value) => {
                *self = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_width_exact() {
        // 1-byte values never pick up garbage in the high bytes
        assert_eq!(7u8.into_word(), Word::Integer(7));
        assert_eq!(0xFFu8.into_word(), Word::Integer(0xFF));
        assert_eq!((-1i8).into_word(), Word::Integer(-1));
        assert_eq!(0xFFFFu16.into_word(), Word::Integer(0xFFFF));

        // Reading back truncates to the native width
        assert_eq!(u8::from_word(Word::Integer(0x1234)), Some(0x34));
        assert_eq!(u32::from_word(Word::Integer(-1)), Some(u32::MAX));
    }

    #[test]
    fn test_tags_are_exclusive() {
        assert_eq!(f32::from_word(Word::Integer(1)), None);
        assert_eq!(i32::from_word(Word::Float(1.0)), None);
        assert_eq!(bool::from_word(Word::Integer(1)), None);
        assert_eq!(EntityPtr::from_word(Word::EdictHandle(EdictPtr::null())), None);
    }

    #[test]
    fn test_handles_distinguished_from_integers() {
        assert_eq!(EntityPtr::WIRE_TYPE, WireType::EntityHandle);
        assert!(EntityPtr::WIRE_TYPE.is_handle());
        assert!(!i32::WIRE_TYPE.is_handle());
        assert_ne!(EdictPtr::WIRE_TYPE, EntVarsPtr::WIRE_TYPE);
    }

    #[test]
    fn test_word_fit() {
        assert!(ArgSpec::of::<i32>().fits_word());
        assert!(ArgSpec::of::<u8>().fits_word());
        assert!(ArgSpec::of::<EntityPtr>().fits_word());
        assert!(ArgSpec::of::<NativeStr>().fits_word());
        assert!(!ArgSpec::of::<i64>().fits_word());
        assert!(!ArgSpec::of::<f64>().fits_word());
    }

    #[test]
    fn test_wire_cell_store() {
        let mut value = 3i16;
        assert!(value.store(Word::Integer(-9)));
        assert_eq!(value, -9);
        assert!(!value.store(Word::Float(2.0)));
        assert_eq!(value, -9);
        assert_eq!(WireCell::wire_type(&value), WireType::Integer);
    }

    #[test]
    fn test_native_str_contents() {
        let s = NativeStr::from_static(c"weapon_ak47");
        assert_eq!(unsafe { s.to_string_lossy() }, "weapon_ak47");
        assert_eq!(unsafe { NativeStr::null().to_string_lossy() }, "");
    }
}
