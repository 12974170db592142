//! Addon natives - voice transcoder and Reunion
//!
//! Both addons are optional. When one is missing, every native of its table
//! is registered as a stub that reports "<Addon>: isn't available" and
//! returns 0, so scripts using them still load.
//!
//! Params are the native's arguments in order (`params[0]` is the first one).

use std::sync::Arc;

use reapi_engine::{DiagnosticCode, DiagnosticSink, EngineGlobals, HookIdentity};
use reapi_sdk::{AuthType, Cell, ReunionApi, ScriptId, VoiceTranscoderApi};

use crate::hookchain::{NativeInfo, ScriptVm};

/// Size of the buffer Reunion writes authentication data into
const AUTHDATA_BUFFER_SIZE: usize = 256;

pub const VTC_NATIVES: [&str; 3] = ["VTC_IsClientSpeaking", "VTC_MuteClient", "VTC_UnmuteClient"];

pub const REUNION_NATIVES: [&str; 4] = [
    "REU_GetProtocol",
    "REU_GetAuthtype",
    "REU_IsUserSteam",
    "REU_IsRevemuWithoutAdminRights",
];

/// Source of the current player slot count
pub type MaxClients = Arc<dyn Fn() -> usize + Send + Sync>;

/// Player slot count read from the engine globals
pub fn engine_max_clients() -> MaxClients {
    Arc::new(|| {
        reapi_engine::try_engine()
            .map(EngineGlobals::max_clients)
            .unwrap_or(reapi_engine::globals::DEFAULT_MAX_CLIENTS)
    })
}

/// Shared state of every addon native
#[derive(Clone)]
struct NativeEnv {
    sink: Arc<dyn DiagnosticSink>,
    max_clients: MaxClients,
}

impl NativeEnv {
    fn error(&self, script: ScriptId, native: &str, message: &str) {
        self.sink
            .report(&HookIdentity::native(script, native), DiagnosticCode::Native, message);
    }

    /// Validate the player index in `params[0]`
    fn player(&self, script: ScriptId, native: &str, params: &[Cell]) -> Option<usize> {
        let index = params.first().copied().unwrap_or(0);
        let max = (self.max_clients)();

        match usize::try_from(index) {
            Ok(i) if (1..=max).contains(&i) => Some(i),
            _ => {
                self.error(script, native, &format!("invalid player index {}", index));
                None
            }
        }
    }
}

fn unavailable(env: &NativeEnv, names: &[&'static str], addon: &'static str) -> Vec<NativeInfo> {
    names
        .iter()
        .map(|&name| {
            let env = env.clone();
            NativeInfo::new(name, move |script, _| {
                env.error(script, name, &format!("{}: isn't available", addon));
                0
            })
        })
        .collect()
}

/// Voice transcoder natives, or stubs when the addon is missing
pub fn vtc_natives(
    api: Option<Arc<dyn VoiceTranscoderApi>>,
    sink: Arc<dyn DiagnosticSink>,
    max_clients: MaxClients,
) -> Vec<NativeInfo> {
    let env = NativeEnv { sink, max_clients };
    let Some(api) = api else {
        return unavailable(&env, &VTC_NATIVES, "VTC");
    };

    let speaking = {
        let (env, api) = (env.clone(), Arc::clone(&api));
        NativeInfo::new("VTC_IsClientSpeaking", move |script, params| {
            env.player(script, "VTC_IsClientSpeaking", params)
                .map_or(0, |index| api.is_client_speaking(index) as Cell)
        })
    };

    let mute = {
        let (env, api) = (env.clone(), Arc::clone(&api));
        NativeInfo::new("VTC_MuteClient", move |script, params| {
            if let Some(index) = env.player(script, "VTC_MuteClient", params) {
                api.mute_client(index);
            }
            0
        })
    };

    let unmute = NativeInfo::new("VTC_UnmuteClient", move |script, params| {
        if let Some(index) = env.player(script, "VTC_UnmuteClient", params) {
            api.unmute_client(index);
        }
        0
    });

    vec![speaking, mute, unmute]
}

/// Reunion indexes clients from 0
fn client_id(env: &NativeEnv, script: ScriptId, native: &str, params: &[Cell]) -> Option<usize> {
    env.player(script, native, params).map(|index| index - 1)
}

/// Whether RevEmu auth data is a plain numeric id
fn is_numeric_authdata(data: &[u8]) -> bool {
    data.iter().all(u8::is_ascii_digit)
}

/// Reunion natives, or stubs when the addon is missing
pub fn reunion_natives(
    api: Option<Arc<dyn ReunionApi>>,
    sink: Arc<dyn DiagnosticSink>,
    max_clients: MaxClients,
) -> Vec<NativeInfo> {
    let env = NativeEnv { sink, max_clients };
    let Some(api) = api else {
        return unavailable(&env, &REUNION_NATIVES, "Reunion");
    };

    let protocol = {
        let (env, api) = (env.clone(), Arc::clone(&api));
        NativeInfo::new("REU_GetProtocol", move |script, params| {
            client_id(&env, script, "REU_GetProtocol", params).map_or(0, |id| api.client_protocol(id))
        })
    };

    let authtype = {
        let (env, api) = (env.clone(), Arc::clone(&api));
        NativeInfo::new("REU_GetAuthtype", move |script, params| {
            client_id(&env, script, "REU_GetAuthtype", params).map_or(AuthType::Unknown.as_cell(), |id| {
                api.client_authtype(id).as_cell()
            })
        })
    };

    let steam = {
        let (env, api) = (env.clone(), Arc::clone(&api));
        NativeInfo::new("REU_IsUserSteam", move |script, params| {
            client_id(&env, script, "REU_IsUserSteam", params)
                .map_or(0, |id| (api.client_authtype(id) == AuthType::Steam) as Cell)
        })
    };

    let revemu = NativeInfo::new("REU_IsRevemuWithoutAdminRights", move |script, params| {
        let Some(id) = client_id(&env, script, "REU_IsRevemuWithoutAdminRights", params) else {
            return 0;
        };
        if api.client_authtype(id) != AuthType::RevEmu {
            return 0;
        }

        let mut buffer = [0u8; AUTHDATA_BUFFER_SIZE];
        let size = api.client_authdata(id, &mut buffer).min(AUTHDATA_BUFFER_SIZE);
        is_numeric_authdata(&buffer[..size]) as Cell
    });

    vec![protocol, authtype, steam, revemu]
}

/// Hand both addon tables to the script VM
pub fn register_addon_natives(vm: &dyn ScriptVm, globals: &EngineGlobals, sink: Arc<dyn DiagnosticSink>) {
    let max_clients = engine_max_clients();

    if globals.voice_transcoder.is_none() {
        tracing::info!("VTC not found, its natives are disabled");
    }
    if globals.reunion.is_none() {
        tracing::info!("Reunion not found, its natives are disabled");
    }

    vm.add_natives(vtc_natives(
        globals.voice_transcoder.clone(),
        Arc::clone(&sink),
        Arc::clone(&max_clients),
    ));
    vm.add_natives(reunion_natives(globals.reunion.clone(), sink, max_clients));
}
