//! Native record type definitions
//!
//! These are opaque types representing records owned by the game server.
//! We never look inside them - hooks only pass pointers around, and scripts
//! treat them as handles.

/// Opaque type for CBaseEntity
/// Base class of every game entity (players, weapons, grenades, ...)
#[repr(C)]
pub struct CBaseEntity {
    _opaque: [u8; 0],
}

/// Opaque type for edict_t
/// Engine-side entity dictionary slot
#[repr(C)]
pub struct Edict {
    _opaque: [u8; 0],
}

/// Opaque type for entvars_t
/// Entity variables shared between engine and game library
#[repr(C)]
pub struct EntVars {
    _opaque: [u8; 0],
}
