//! Hook records - one registered script callback at one hook point
//!
//! # Lifecycle
//!
//! ```text
//! Invalid ──wire──▶ Enabled ◀──enable/pause──▶ Paused
//!                      │                          │
//!                      └──────────stop────────────┴──▶ Stopped
//! ```
//!
//! Only `Enabled` records run. Paused and stopped records stay in their list
//! so toggling never needs re-registration; removal is the registry's job.

use std::sync::atomic::{AtomicU8, Ordering};

use reapi_engine::HookIdentity;
use reapi_sdk::{ForwardRef, ScriptId};

use super::error::HookChainError;
use super::registry::FunctionId;

/// Longest callback name kept for diagnostics
pub const MAX_CALLBACK_NAME: usize = 63;

/// Lifecycle state of a hook record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ForwardState {
    /// Constructed but not yet wired into a hook point list
    Invalid = 0,
    Enabled = 1,
    Paused = 2,
    /// Permanently skipped, waiting for removal
    Stopped = 3,
}

impl ForwardState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Enabled,
            2 => Self::Paused,
            3 => Self::Stopped,
            _ => Self::Invalid,
        }
    }
}

/// A registered script callback
#[derive(Debug)]
pub struct HookRecord {
    forward: ForwardRef,
    slot_index: usize,
    callback_name: String,
    owner: ScriptId,
    function: FunctionId,
    function_name: String,
    post: bool,
    state: AtomicU8,
}

impl HookRecord {
    /// Create a record in the `Invalid` state
    pub fn new(
        owner: ScriptId,
        callback_name: &str,
        forward: ForwardRef,
        function: FunctionId,
        function_name: &str,
        post: bool,
    ) -> Self {
        let mut callback_name = callback_name.to_string();
        if callback_name.len() > MAX_CALLBACK_NAME {
            let mut end = MAX_CALLBACK_NAME;
            while !callback_name.is_char_boundary(end) {
                end -= 1;
            }
            callback_name.truncate(end);
        }

        Self {
            forward,
            slot_index: 0,
            callback_name,
            owner,
            function,
            function_name: function_name.to_string(),
            post,
            state: AtomicU8::new(ForwardState::Invalid as u8),
        }
    }

    pub fn forward(&self) -> ForwardRef {
        self.forward
    }

    /// Position of this record in its hook point list when it was wired
    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    pub fn callback_name(&self) -> &str {
        &self.callback_name
    }

    pub fn owner(&self) -> ScriptId {
        self.owner
    }

    pub fn function(&self) -> FunctionId {
        self.function
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Whether this record runs after the original function
    pub fn is_post(&self) -> bool {
        self.post
    }

    pub fn state(&self) -> ForwardState {
        ForwardState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == ForwardState::Enabled
    }

    /// Identity used when reporting diagnostics against this record
    pub fn identity(&self) -> HookIdentity<'_> {
        HookIdentity::hook(self.owner, &self.callback_name, &self.function_name)
    }

    /// Wire the record into its list at `slot_index`
    pub(crate) fn wire(&mut self, slot_index: usize) {
        self.slot_index = slot_index;
        self.state.store(ForwardState::Enabled as u8, Ordering::Release);
    }

    /// Resume a paused record
    pub fn enable(&self) -> Result<(), HookChainError> {
        self.transition(ForwardState::Enabled, &[ForwardState::Paused, ForwardState::Enabled])
    }

    /// Skip the record without removing it
    pub fn pause(&self) -> Result<(), HookChainError> {
        self.transition(ForwardState::Paused, &[ForwardState::Enabled, ForwardState::Paused])
    }

    /// Permanently skip the record
    pub fn stop(&self) {
        self.state.store(ForwardState::Stopped as u8, Ordering::Release);
    }

    fn transition(&self, to: ForwardState, allowed_from: &[ForwardState]) -> Result<(), HookChainError> {
        let from = self.state();
        if !allowed_from.contains(&from) {
            return Err(HookChainError::InvalidTransition { from, to });
        }

        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| HookChainError::InvalidTransition {
                from: ForwardState::from_u8(actual),
                to,
            })
    }
}
