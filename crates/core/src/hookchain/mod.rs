//! Hook chain engine
//!
//! Hooked host functions are routed through [`HookChain::call_forward`] (or
//! [`HookChain::call_void_forward`]). Each call walks the hook point's
//! pre-hooks, runs the original unless a callback superceded it, then walks
//! the post-hooks.
//!
//! # Example
//!
//! ```ignore
//! use reapi_core::hookchain::{FunctionId, HookGroup, EntityPtr};
//!
//! const TAKE_DAMAGE: FunctionId = FunctionId::new(HookGroup::Player, 13);
//!
//! chain.declare::<(EntityPtr, EntityPtr, f32, i32), bool>(TAKE_DAMAGE, "CBasePlayer_TakeDamage")?;
//!
//! // At the hooked call site
//! let killed = chain.call_forward(TAKE_DAMAGE, (this, attacker, damage, bits), |(this, attacker, damage, bits)| {
//!     original_take_damage(this, attacker, damage, bits)
//! });
//! ```

mod context;
mod dispatch;
mod error;
mod record;
mod registry;
mod stack;
mod state;
mod strings;
mod vm;
mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{ArgList, ArgumentHandle, CallContext, HookArgs, ReturnSlot, MAX_HOOKCHAIN_ARGS};
pub use dispatch::{HookChain, PROTOCOL_VIOLATION};
pub use error::HookChainError;
pub use record::{ForwardState, HookRecord, MAX_CALLBACK_NAME};
pub use registry::{FunctionId, HookGroup, HookKey, HookPoint, HookRegistry, HookSignature, REGION_RANGE};
pub use stack::{ContextStack, Frame, FrameGuard, Phase};
pub use state::HookChainState;
pub use strings::{ArenaStats, TempStringArena, DEFAULT_TEMP_STRINGS, DEFAULT_TEMP_STRING_SIZE, EXHAUSTED_SENTINEL};
pub use vm::{NativeFn, NativeInfo, ScriptVm};
pub use wire::{ArgSpec, EdictPtr, EntVarsPtr, EntityPtr, NativeStr, WireCell, WireType, WireValue, Word};
