//! Loads and validates the daemon's YAML configuration: chain/contract
//! topology, interface definitions, and sink settings. Deliberately kept
//! free of any I/O beyond reading the config file and the interface-
//! definition files it references; building RPC clients or database pools
//! from the validated [`Config`] happens in the daemon crate.

pub mod env;
pub mod error;
pub mod interface;
pub mod schema;

use {
    error::ConfigError,
    indexer_core::contract::{ChainContracts, ContractDescriptor},
    schema::RawConfig,
    std::{
        collections::HashSet,
        path::{Path, PathBuf},
        sync::{Arc, LazyLock},
        time::Duration,
    },
};

static CHAIN_NAME_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z]+(_[A-Za-z0-9]+)*$").expect("valid regex"));

const MAX_CONFIRMATIONS: u64 = 10_000;
const MIN_RETENTION: Duration = Duration::from_secs(60 * 60);

pub struct Config {
    pub chains: Vec<ChainConfig>,
    pub server: ServerConfig,
    pub console: ConsoleConfig,
    pub postgres: Option<PostgresConfig>,
}

pub struct ChainConfig {
    pub name: String,
    pub rpc: url::Url,
    pub confirmations: u64,
    pub contracts: ChainContracts,
}

pub struct ServerConfig {
    pub port: u16,
}

pub struct ConsoleConfig {
    pub disabled: bool,
}

pub struct PostgresConfig {
    pub url: String,
    pub retention: Duration,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &"<redacted>")
            .field("retention", &self.retention)
            .finish()
    }
}

/// Load, expand, parse, and validate the configuration at `path`. Interface-
/// definition files referenced by `abi:` fields are resolved relative to
/// `path`'s parent directory.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw_text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let expanded = env::expand(&raw_text)?;
    let raw: RawConfig = serde_yaml::from_str(&expanded)?;

    if raw.chains.is_empty() {
        return Err(ConfigError::NoChains);
    }

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut chains = Vec::new();
    for (name, raw_chain) in raw.chains {
        if !CHAIN_NAME_PATTERN.is_match(&name) {
            return Err(ConfigError::InvalidChainName(name));
        }
        if raw_chain.confirmations > MAX_CONFIRMATIONS {
            return Err(ConfigError::ConfirmationsOutOfRange {
                chain: name,
                value: raw_chain.confirmations,
                max: MAX_CONFIRMATIONS,
            });
        }

        let mut descriptors = Vec::new();
        for (contract_name, raw_contract) in raw_chain.contracts {
            descriptors.push(build_contract(&name, &contract_name, raw_contract, &base_dir)?);
        }

        let contracts = ChainContracts::build(name.clone(), descriptors)
            .map_err(|_| ConfigError::DuplicateAddress(name.clone()))?;

        chains.push(ChainConfig {
            name,
            rpc: raw_chain.rpc,
            confirmations: raw_chain.confirmations,
            contracts,
        });
    }

    let postgres = raw
        .outputs
        .postgres
        .map(|raw_postgres| -> Result<PostgresConfig, ConfigError> {
            if raw_postgres.retention < MIN_RETENTION {
                return Err(ConfigError::RetentionTooShort {
                    chain: String::new(),
                    value: raw_postgres.retention,
                    min: MIN_RETENTION,
                });
            }
            Ok(PostgresConfig {
                url: raw_postgres.url,
                retention: raw_postgres.retention,
            })
        })
        .transpose()?;

    Ok(Config {
        chains,
        server: ServerConfig {
            port: raw.server.port,
        },
        console: ConsoleConfig {
            disabled: raw.outputs.console.map(|c| c.disabled).unwrap_or(false),
        },
        postgres,
    })
}

fn build_contract(
    chain: &str,
    contract_name: &str,
    raw: schema::RawContractConfig,
    base_dir: &Path,
) -> Result<Arc<ContractDescriptor>, ConfigError> {
    let addresses = resolve_addresses(chain, contract_name, &raw)?;
    let abi_path: PathBuf = if raw.abi.is_absolute() {
        raw.abi.clone()
    } else {
        base_dir.join(&raw.abi)
    };
    let events = interface::load(&abi_path)?;
    let whitelist: HashSet<String> = raw.events.into_iter().flatten().collect();

    Ok(Arc::new(ContractDescriptor {
        chain_name: chain.to_string(),
        contract_name: contract_name.to_string(),
        addresses,
        events,
        whitelist,
    }))
}

fn resolve_addresses(
    chain: &str,
    contract_name: &str,
    raw: &schema::RawContractConfig,
) -> Result<HashSet<alloy_primitives::Address>, ConfigError> {
    let single = raw.address.as_ref().map(|s| vec![s.clone()]);
    let many = raw.addresses.clone();
    let candidates = match (single, many) {
        (Some(one), None) => one,
        (None, Some(several)) if !several.is_empty() => several,
        _ => {
            return Err(ConfigError::AmbiguousAddress {
                chain: chain.to_string(),
                contract: contract_name.to_string(),
            })
        }
    };

    candidates
        .into_iter()
        .map(|text| {
            text.parse::<alloy_primitives::Address>()
                .map_err(|err| ConfigError::InvalidAddress {
                    chain: chain.to_string(),
                    contract: contract_name.to_string(),
                    address: text,
                    reason: err.to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_abi(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"[{"type":"event","name":"Transfer","anonymous":false,"inputs":[
                {"indexed":true,"name":"from","type":"address"},
                {"indexed":true,"name":"to","type":"address"},
                {"indexed":false,"name":"value","type":"uint256"}
            ]}]"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn loads_a_minimal_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        write_abi(dir.path(), "token.json");
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
chains:
  ethereum_mainnet:
    rpc: "wss://example.invalid/ws"
    confirmations: 5
    contracts:
      token:
        abi: token.json
        address: "0x0000000000000000000000000000000000000001"
server:
  port: 9090
"#,
        )
        .unwrap();

        let config = load(&config_path).unwrap();
        assert_eq!(config.chains.len(), 1);
        assert_eq!(config.chains[0].name, "ethereum_mainnet");
        assert_eq!(config.chains[0].confirmations, 5);
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn rejects_invalid_chain_name() {
        let dir = tempfile::tempdir().unwrap();
        write_abi(dir.path(), "token.json");
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
chains:
  "1invalid":
    rpc: "wss://example.invalid/ws"
    contracts:
      token:
        abi: token.json
        address: "0x0000000000000000000000000000000000000001"
"#,
        )
        .unwrap();

        assert!(matches!(load(&config_path), Err(ConfigError::InvalidChainName(_))));
    }

    #[test]
    fn rejects_ambiguous_address_config() {
        let dir = tempfile::tempdir().unwrap();
        write_abi(dir.path(), "token.json");
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
chains:
  ethereum_mainnet:
    rpc: "wss://example.invalid/ws"
    contracts:
      token:
        abi: token.json
        address: "0x0000000000000000000000000000000000000001"
        addresses: ["0x0000000000000000000000000000000000000002"]
"#,
        )
        .unwrap();

        assert!(matches!(load(&config_path), Err(ConfigError::AmbiguousAddress { .. })));
    }
}
