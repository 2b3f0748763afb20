//! Loads an interface-definition file (a standard ABI JSON array) into the
//! event definitions a [`indexer_core::contract::ContractDescriptor`] needs.
//! Only `"type": "event"` entries are kept; everything else (functions,
//! constructor, errors) is ignored.

use {
    crate::error::ConfigError,
    indexer_core::contract::{EventDefinition, EventParam},
    serde::Deserialize,
    std::{collections::HashMap, path::Path},
};

#[derive(Deserialize)]
struct AbiEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    anonymous: bool,
    #[serde(default)]
    inputs: Vec<AbiInput>,
}

#[derive(Deserialize)]
struct AbiInput {
    indexed: bool,
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

/// Load every event entry in the ABI JSON at `path`, keyed by topic-0.
pub fn load(path: &Path) -> Result<HashMap<alloy_primitives::B256, EventDefinition>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::InterfaceFileIo {
        path: path.display().to_string(),
        source,
    })?;
    let entries: Vec<AbiEntry> =
        serde_json::from_str(&text).map_err(|source| ConfigError::InterfaceFileJson {
            path: path.display().to_string(),
            source,
        })?;

    let mut events = HashMap::new();
    for entry in entries {
        if entry.kind != "event" {
            continue;
        }
        let inputs = entry
            .inputs
            .into_iter()
            .map(|i| EventParam {
                name: i.name,
                ty: i.ty,
                indexed: i.indexed,
            })
            .collect();
        let definition = EventDefinition::new(entry.name, entry.anonymous, inputs);
        events.insert(definition.topic0, definition);
    }

    if events.is_empty() {
        return Err(ConfigError::EmptyInterface {
            path: path.display().to_string(),
        });
    }
    Ok(events)
}
