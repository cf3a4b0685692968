use core::fmt::{Debug, Display};
use std::net::{Ipv4Addr, SocketAddr};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "hostel.toml";
pub const ENV_PREFIX: &str = "HOSTEL_";

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OpenIdConnectConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BookingConfig {
    /// How often a booking that lost a race is retried before the conflict
    /// is reported to the user.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

const fn default_conflict_retries() -> u32 {
    3
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000))
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Public base url, used for the OpenID Connect redirect.
    pub url: String,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    pub database_url: String,
    /// Login is disabled when unset.
    pub openidconnect: Option<OpenIdConnectConfig>,
    #[serde(default)]
    pub booking: BookingConfig,
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// `hostel.toml` overridden by `HOSTEL_` variables, nested keys are
/// separated by `__` (`HOSTEL_BOOKING__CONFLICT_RETRIES`).
#[must_use]
pub fn figment() -> Figment {
    Figment::new()
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(figment().extract()?)
}
