//! Global host API storage
//!
//! Host APIs are discovered once during plugin load and stored here.
//! Access is thread-safe via OnceLock.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use reapi_sdk::{ReunionApi, VoiceTranscoderApi};

use crate::apis::ApiFlags;
use crate::error::EngineError;

/// Default player slot count until the server reports the real one
pub const DEFAULT_MAX_CLIENTS: usize = 32;

/// Global engine state containing all discovered APIs
pub struct EngineGlobals {
    /// Which optional host APIs are usable
    pub apis: ApiFlags,

    /// Voice transcoder addon (optional)
    pub voice_transcoder: Option<Arc<dyn VoiceTranscoderApi>>,

    /// Reunion addon (optional)
    pub reunion: Option<Arc<dyn ReunionApi>>,

    /// Player slot count - updated on server activation
    max_clients: RwLock<usize>,
}

/// Global engine state storage
static ENGINE: OnceLock<EngineGlobals> = OnceLock::new();

/// Initialize engine globals
///
/// Called once during plugin load. Returns error if already initialized.
pub fn init_engine(globals: EngineGlobals) -> Result<(), EngineError> {
    ENGINE
        .set(globals)
        .map_err(|_| EngineError::AlreadyInitialized)
}

/// Engine globals, `None` before `init_engine`
pub fn try_engine() -> Option<&'static EngineGlobals> {
    ENGINE.get()
}

impl EngineGlobals {
    /// Create new EngineGlobals
    pub fn new(apis: ApiFlags) -> Self {
        Self {
            apis,
            voice_transcoder: None,
            reunion: None,
            max_clients: RwLock::new(DEFAULT_MAX_CLIENTS),
        }
    }

    /// Check whether every API in `required` is available
    pub fn has(&self, required: ApiFlags) -> bool {
        self.apis.contains(required)
    }

    /// Current player slot count
    pub fn max_clients(&self) -> usize {
        *self.max_clients.read()
    }

    /// Set player slot count
    ///
    /// Called from the host when the server activates a map
    pub fn set_max_clients(&self, max_clients: usize) {
        *self.max_clients.write() = max_clients;
        tracing::debug!("max_clients set to {}", max_clients);
    }

    /// Set optional voice transcoder addon
    pub fn with_voice_transcoder(mut self, api: Option<Arc<dyn VoiceTranscoderApi>>) -> Self {
        if api.is_some() {
            self.apis |= ApiFlags::VTC;
        } else {
            self.apis.remove(ApiFlags::VTC);
        }
        self.voice_transcoder = api;
        self
    }

    /// Set optional reunion addon
    pub fn with_reunion(mut self, api: Option<Arc<dyn ReunionApi>>) -> Self {
        if api.is_some() {
            self.apis |= ApiFlags::REUNION;
        } else {
            self.apis.remove(ApiFlags::REUNION);
        }
        self.reunion = api;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoVoice;

    impl VoiceTranscoderApi for NoVoice {
        fn is_client_speaking(&self, _client_index: usize) -> bool {
            false
        }
        fn mute_client(&self, _client_index: usize) {}
        fn unmute_client(&self, _client_index: usize) {}
    }

    #[test]
    fn test_addon_flags_follow_interfaces() {
        let globals = EngineGlobals::new(ApiFlags::REHLDS)
            .with_voice_transcoder(Some(Arc::new(NoVoice)))
            .with_reunion(None);

        assert!(globals.has(ApiFlags::REHLDS | ApiFlags::VTC));
        assert!(!globals.has(ApiFlags::REUNION));
    }

    #[test]
    fn test_engine_initialized_once() {
        assert!(init_engine(EngineGlobals::new(ApiFlags::REHLDS)).is_ok());
        let second = init_engine(EngineGlobals::new(ApiFlags::empty()));
        assert!(matches!(second, Err(EngineError::AlreadyInitialized)));
        assert_eq!(try_engine().map(|g| g.apis), Some(ApiFlags::REHLDS));
    }

    #[test]
    fn test_max_clients_update() {
        let globals = EngineGlobals::new(ApiFlags::empty());
        assert_eq!(globals.max_clients(), DEFAULT_MAX_CLIENTS);
        globals.set_max_clients(12);
        assert_eq!(globals.max_clients(), 12);
    }
}
