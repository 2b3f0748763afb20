//! Raw, serde-level shape of the configuration document. Kept separate from
//! the validated [`crate::Config`] the rest of the system consumes: this
//! layer only knows how to deserialize, not what a valid chain name or
//! confirmation count is.

use {
    serde::Deserialize,
    std::{collections::HashMap, path::PathBuf, time::Duration},
};

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawConfig {
    pub chains: HashMap<String, RawChainConfig>,
    #[serde(default)]
    pub server: RawServerConfig,
    #[serde(default)]
    pub outputs: RawOutputsConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawChainConfig {
    pub rpc: url::Url,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    pub contracts: HashMap<String, RawContractConfig>,
}

fn default_confirmations() -> u64 {
    3
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawContractConfig {
    pub abi: PathBuf,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct RawServerConfig {
    pub port: u16,
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct RawOutputsConfig {
    pub console: Option<RawConsoleConfig>,
    pub postgres: Option<RawPostgresConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct RawConsoleConfig {
    pub disabled: bool,
}

impl Default for RawConsoleConfig {
    fn default() -> Self {
        Self { disabled: false }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawPostgresConfig {
    pub url: String,
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,
}

fn default_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
