//! Script-facing diagnostics
//!
//! Errors caused by a script (a hook breaking the override protocol, a native
//! called with bad arguments) are reported against the script and never abort
//! the host call that triggered them.

use std::fmt;

use reapi_sdk::ScriptId;

/// Diagnostic category, mirrors the script VM's runtime error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A hook callback violated the override protocol
    Assert,
    /// A native was called with invalid arguments or is unavailable
    Native,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assert => f.write_str("assert"),
            Self::Native => f.write_str("native"),
        }
    }
}

/// Who a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookIdentity<'a> {
    /// Script owning the callback or calling the native
    pub script: ScriptId,
    /// Callback or native name
    pub callback: &'a str,
    /// Hooked function name, or `"native"` for native calls
    pub function: &'a str,
}

impl<'a> HookIdentity<'a> {
    /// Identity of a hook callback registered at a hook point
    pub fn hook(script: ScriptId, callback: &'a str, function: &'a str) -> Self {
        Self {
            script,
            callback,
            function,
        }
    }

    /// Identity of a native invoked by a script
    pub fn native(script: ScriptId, name: &'a str) -> Self {
        Self {
            script,
            callback: name,
            function: "native",
        }
    }
}

impl fmt::Display for HookIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({})", self.script, self.callback, self.function)
    }
}

/// Receiver for script diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, hook: &HookIdentity<'_>, code: DiagnosticCode, message: &str);
}

/// Sink that writes diagnostics to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, hook: &HookIdentity<'_>, code: DiagnosticCode, message: &str) {
        tracing::error!("[{}] {}: {}", code, hook, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        let id = HookIdentity::hook(ScriptId(2), "OnTakeDamage", "CBasePlayer_TakeDamage");
        assert_eq!(id.to_string(), "script#2 OnTakeDamage(CBasePlayer_TakeDamage)");

        let native = HookIdentity::native(ScriptId(2), "VTC_MuteClient");
        assert_eq!(native.function, "native");
    }
}
