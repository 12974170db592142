//! Host API discovery

use std::sync::Arc;

use reapi_sdk::{ReunionApi, VoiceTranscoderApi};

use crate::apis::{ApiFlags, ApiVersion};
use crate::error::EngineError;
use crate::globals::EngineGlobals;

/// Versions this build was written against
pub const REQUIRED_VERSIONS: &[(ApiFlags, ApiVersion)] = &[
    (ApiFlags::REHLDS, ApiVersion::new(3, 13)),
    (ApiFlags::REGAMEDLL, ApiVersion::new(5, 26)),
    (ApiFlags::RECHECKER, ApiVersion::new(2, 7)),
    (ApiFlags::VTC, ApiVersion::new(3, 0)),
    (ApiFlags::REUNION, ApiVersion::new(1, 1)),
];

/// Source of host APIs
///
/// Implemented by the host bridge; every method has a "not present" default.
pub trait ApiProvider {
    /// Version exported by a single API, or `None` when it is not loaded
    fn version(&self, api: ApiFlags) -> Option<ApiVersion>;

    /// Voice transcoder interface
    fn voice_transcoder(&self) -> Option<Arc<dyn VoiceTranscoderApi>> {
        None
    }

    /// Reunion interface
    fn reunion(&self) -> Option<Arc<dyn ReunionApi>> {
        None
    }
}

/// Check one API against its required version
fn probe(provider: &dyn ApiProvider, api: ApiFlags, required: ApiVersion) -> Result<bool, EngineError> {
    let Some(found) = provider.version(api) else {
        return Ok(false);
    };

    if found.satisfies(required) {
        Ok(true)
    } else {
        Err(EngineError::VersionMismatch {
            api: api.api_name(),
            required,
            found,
        })
    }
}

/// Discover every optional host API
///
/// Missing or outdated APIs are logged but never fail the load; the hook
/// groups and natives that depend on them report themselves unavailable.
#[tracing::instrument(skip_all)]
pub fn load_apis(provider: &dyn ApiProvider) -> EngineGlobals {
    let mut apis = ApiFlags::empty();

    for &(api, required) in REQUIRED_VERSIONS {
        match probe(provider, api, required) {
            Ok(true) => {
                apis |= api;
                tracing::info!("{}: available", api.api_name());
            }
            Ok(false) => tracing::debug!("{}: not available", api.api_name()),
            Err(e) => tracing::error!("{}", e),
        }
    }

    let voice_transcoder = if apis.contains(ApiFlags::VTC) {
        provider.voice_transcoder()
    } else {
        None
    };

    let reunion = if apis.contains(ApiFlags::REUNION) {
        provider.reunion()
    } else {
        None
    };

    EngineGlobals::new(apis)
        .with_voice_transcoder(voice_transcoder)
        .with_reunion(reunion)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(Vec<(ApiFlags, ApiVersion)>);

    impl ApiProvider for FixedProvider {
        fn version(&self, api: ApiFlags) -> Option<ApiVersion> {
            self.0.iter().find(|(a, _)| *a == api).map(|(_, v)| *v)
        }
    }

    #[test]
    fn test_load_accepts_compatible_versions() {
        let provider = FixedProvider(vec![
            (ApiFlags::REHLDS, ApiVersion::new(3, 14)),
            (ApiFlags::REGAMEDLL, ApiVersion::new(5, 26)),
        ]);

        let globals = load_apis(&provider);
        assert!(globals.has(ApiFlags::REHLDS | ApiFlags::REGAMEDLL));
        assert!(!globals.has(ApiFlags::RECHECKER));
    }

    #[test]
    fn test_load_rejects_major_mismatch() {
        let provider = FixedProvider(vec![(ApiFlags::REHLDS, ApiVersion::new(2, 99))]);

        let globals = load_apis(&provider);
        assert!(!globals.has(ApiFlags::REHLDS));
    }

    #[test]
    fn test_addon_without_interface_is_unavailable() {
        // Version reported, but the provider hands out no interface
        let provider = FixedProvider(vec![(ApiFlags::VTC, ApiVersion::new(3, 0))]);

        let globals = load_apis(&provider);
        assert!(!globals.has(ApiFlags::VTC));
        assert!(globals.voice_transcoder.is_none());
    }
}
