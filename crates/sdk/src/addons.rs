//! Optional addon interfaces
//!
//! Addons are separate server modules that may or may not be loaded.
//! Their natives degrade to "isn't available" stubs when missing.

/// Client authentication provider as reported by Reunion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AuthType {
    Unknown = 0,
    HltvProxy = 1,
    NoSteam = 2,
    Steam = 3,
    SteamEmu = 4,
    RevEmu = 5,
    OldRevEmu = 6,
}

impl AuthType {
    /// Raw value handed to scripts
    pub fn as_cell(self) -> i32 {
        self as i32
    }
}

/// Voice transcoder addon (VTC)
///
/// Client indices are 1-based, matching player indices seen by scripts.
pub trait VoiceTranscoderApi: Send + Sync {
    /// Whether the client is talking right now
    fn is_client_speaking(&self, client_index: usize) -> bool;

    /// Block voice data from this client
    fn mute_client(&self, client_index: usize);

    /// Allow voice data from this client again
    fn unmute_client(&self, client_index: usize);
}

/// Reunion addon (non-steam client support)
///
/// Client ids are 0-based slots.
pub trait ReunionApi: Send + Sync {
    /// Network protocol the client connected with
    fn client_protocol(&self, client_id: usize) -> i32;

    /// How the client authenticated
    fn client_authtype(&self, client_id: usize) -> AuthType;

    /// Copy raw authentication data into `buffer`, returning the number of bytes written
    fn client_authdata(&self, client_id: usize, buffer: &mut [u8]) -> usize;
}
