#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("environment variable {0:?} referenced in configuration is not set")]
    MissingEnvVar(String),

    #[error("failed to parse configuration as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("chain name {0:?} does not match ^[A-Za-z]+(_[A-Za-z0-9]+)*$")]
    InvalidChainName(String),

    #[error("chain {chain:?}: confirmations {value} exceeds the maximum of {max}")]
    ConfirmationsOutOfRange { chain: String, value: u64, max: u64 },

    #[error("chain {chain:?} contract {contract:?}: exactly one of `address` or `addresses` must be set")]
    AmbiguousAddress { chain: String, contract: String },

    #[error("chain {chain:?} contract {contract:?}: invalid address {address:?}: {reason}")]
    InvalidAddress {
        chain: String,
        contract: String,
        address: String,
        reason: String,
    },

    #[error("retention {value:?} for chain {chain:?} is below the minimum of {min:?}")]
    RetentionTooShort {
        chain: String,
        value: std::time::Duration,
        min: std::time::Duration,
    },

    #[error("failed to read interface definition file {path}: {source}")]
    InterfaceFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse interface definition file {path}: {source}")]
    InterfaceFileJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("interface definition file {path} declares no usable events")]
    EmptyInterface { path: String },

    #[error("chain {0:?}: two contracts configure the same address")]
    DuplicateAddress(String),

    #[error("no chains configured")]
    NoChains,
}
