//! Process configuration read once at startup.
//!
//! Secrets are only consumed by the download and publishing collaborators;
//! the filtering core takes no configuration.

use std::fmt;

use crate::error::{Error, Result};

pub const BUNNY_STORAGE_KEY: &str = "BUNNY_STORAGE_KEY";
pub const BUNNY_KEY: &str = "BUNNY_KEY";
pub const DFT_BUS_DATA_USERNAME: &str = "DFT_BUS_DATA_USERNAME";
pub const DFT_BUS_DATA_PASSWORD: &str = "DFT_BUS_DATA_PASSWORD";

/// Login for the bus-data timetable portal.
#[derive(Clone)]
pub struct PortalCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Keys for the CDN storage zone and the purge API.
#[derive(Clone)]
pub struct CdnKeys {
    pub storage_key: String,
    pub api_key: String,
}

impl fmt::Debug for CdnKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdnKeys")
            .field("storage_key", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cdn: CdnKeys,
    /// Present only when the timetable feed has to be downloaded.
    pub portal: Option<PortalCredentials>,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing variable.
    pub fn from_env(need_portal: bool) -> Result<Self> {
        Self::from_lookup(need_portal, |name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup. Empty values
    /// count as missing.
    pub fn from_lookup<F>(need_portal: bool, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .ok_or(Error::Config { var })
        };

        let cdn = CdnKeys {
            storage_key: require(BUNNY_STORAGE_KEY)?,
            api_key: require(BUNNY_KEY)?,
        };

        let portal = if need_portal {
            Some(PortalCredentials {
                username: require(DFT_BUS_DATA_USERNAME)?,
                password: require(DFT_BUS_DATA_PASSWORD)?,
            })
        } else {
            None
        };

        Ok(Self { cdn, portal })
    }
}
