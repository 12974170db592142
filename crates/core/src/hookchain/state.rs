//! Hook chain control codes

use reapi_sdk::Cell;

/// What a hook callback asks the chain to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum HookChainState {
    /// Callback took no action
    Continue = 0,

    /// Skip the original function and use the return value set by the callback,
    /// remaining hooks still run
    Supercede = 1,

    /// Skip remaining hooks and the original function, use the return value
    /// set by the callback
    ///
    /// Warning: this also skips hooks registered by every following script.
    Break = 2,
}

impl HookChainState {
    /// Interpret a code returned by the script VM
    ///
    /// Unknown codes mean the callback did not take any action.
    pub fn from_code(code: Cell) -> Self {
        match code {
            1 => Self::Supercede,
            2 => Self::Break,
            0 => Self::Continue,
            other => {
                tracing::trace!("Unknown hook chain code {}, treating as continue", other);
                Self::Continue
            }
        }
    }

    /// Raw code as seen by scripts
    pub fn code(self) -> Cell {
        self as Cell
    }

    /// Whether the callback asked to replace the original call
    pub fn overrides(self) -> bool {
        self != Self::Continue
    }
}

impl Default for HookChainState {
    fn default() -> Self {
        Self::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(HookChainState::from_code(0), HookChainState::Continue);
        assert_eq!(HookChainState::from_code(1), HookChainState::Supercede);
        assert_eq!(HookChainState::from_code(2), HookChainState::Break);
        assert_eq!(HookChainState::from_code(7), HookChainState::Continue);
        assert_eq!(HookChainState::from_code(-1), HookChainState::Continue);
    }

    #[test]
    fn test_ordering_is_escalation() {
        assert!(HookChainState::Continue < HookChainState::Supercede);
        assert!(HookChainState::Supercede < HookChainState::Break);
        assert_eq!(HookChainState::Supercede.max(HookChainState::Continue), HookChainState::Supercede);
    }
}
