//! Hook chain error types

use super::registry::FunctionId;
use super::record::ForwardState;
use super::wire::WireType;

/// Error type for hook chain operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookChainError {
    #[error("{function}: {count} arguments exceed the hook chain limit of {max}")]
    TooManyArguments {
        function: String,
        count: usize,
        max: usize,
    },

    #[error("{function}: argument {index} ({ty}) is {width} bytes, wider than one word")]
    ArgumentTooWide {
        function: String,
        index: usize,
        ty: WireType,
        width: usize,
    },

    #[error("{function}: return type ({ty}) is {width} bytes, wider than one word")]
    ReturnTooWide {
        function: String,
        ty: WireType,
        width: usize,
    },

    #[error("{function}: string return needs a string argument to be overridable")]
    StringReturnWithoutStringArgs { function: String },

    #[error("Hook point {0} already declared")]
    AlreadyDeclared(FunctionId),

    #[error("Unknown hook point {0}")]
    UnknownFunction(FunctionId),

    #[error("Function ({function}) is not available, {api} required")]
    FeatureUnavailable {
        function: String,
        api: &'static str,
    },

    #[error("Public function \"{callback}\" not found")]
    ForwardNotFound { callback: String },

    #[error("Hook not found")]
    HookNotFound,

    #[error("Invalid hook state transition {from:?} -> {to:?}")]
    InvalidTransition { from: ForwardState, to: ForwardState },

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: WireType, found: WireType },

    #[error("Argument {index} out of range (count {count})")]
    ArgumentOutOfRange { index: usize, count: usize },

    #[error("Hook point has no return value")]
    VoidReturn,

    #[error("Temp strings are only available in hooks with string arguments")]
    TempStringsDisabled,
}

impl HookChainError {
    /// Errors raised when a hook point signature cannot be hooked at all
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::TooManyArguments { .. }
                | Self::ArgumentTooWide { .. }
                | Self::ReturnTooWide { .. }
                | Self::StringReturnWithoutStringArgs { .. }
        )
    }
}
