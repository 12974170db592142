//! Optional host API flags and versions

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Host APIs that were found at load time
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ApiFlags: u32 {
        /// Reverse-engineered engine (engine hook chains)
        const REHLDS = 0x01;
        /// Reverse-engineered game library (game hook chains)
        const REGAMEDLL = 0x02;
        /// Resource checker (file consistency hook chains)
        const RECHECKER = 0x04;
        /// Voice transcoder addon
        const VTC = 0x08;
        /// Reunion addon
        const REUNION = 0x10;
    }
}

impl ApiFlags {
    /// Human readable name of a single flag
    pub fn api_name(self) -> &'static str {
        match self {
            f if f == Self::REHLDS => "ReHLDS",
            f if f == Self::REGAMEDLL => "ReGameDLL",
            f if f == Self::RECHECKER => "Rechecker",
            f if f == Self::VTC => "VTC",
            f if f == Self::REUNION => "Reunion",
            _ => "<multiple>",
        }
    }
}

/// Interface version exported by a host API
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// A provided version satisfies a requirement when the major matches
    /// and the minor is at least the required one.
    pub fn satisfies(self, required: ApiVersion) -> bool {
        self.major == required.major && self.minor >= required.minor
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_satisfies() {
        let required = ApiVersion::new(3, 1);
        assert!(ApiVersion::new(3, 1).satisfies(required));
        assert!(ApiVersion::new(3, 7).satisfies(required));
        assert!(!ApiVersion::new(3, 0).satisfies(required));
        assert!(!ApiVersion::new(4, 1).satisfies(required));
    }

    #[test]
    fn test_api_names() {
        assert_eq!(ApiFlags::REHLDS.api_name(), "ReHLDS");
        assert_eq!(ApiFlags::REUNION.api_name(), "Reunion");
        assert_eq!((ApiFlags::VTC | ApiFlags::REUNION).api_name(), "<multiple>");
    }
}
