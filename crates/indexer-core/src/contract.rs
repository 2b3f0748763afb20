use {
    alloy_primitives::{keccak256, Address, B256},
    std::collections::{HashMap, HashSet},
};

/// One parameter of an event definition, as declared in an interface-definition file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventParam {
    pub name: String,
    /// The Solidity type string, e.g. `uint256`, `address`, `bytes32`.
    pub ty: String,
    pub indexed: bool,
}

/// A decoded event descriptor: name, ordered parameter layout, and the
/// topic-0 selector derived from its canonical signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDefinition {
    pub name: String,
    pub anonymous: bool,
    pub inputs: Vec<EventParam>,
    pub topic0: B256,
}

impl EventDefinition {
    pub fn new(name: String, anonymous: bool, inputs: Vec<EventParam>) -> Self {
        let signature = format!(
            "{name}({})",
            inputs.iter().map(|i| i.ty.as_str()).collect::<Vec<_>>().join(",")
        );
        let topic0 = keccak256(signature.as_bytes());
        Self {
            name,
            anonymous,
            inputs,
            topic0,
        }
    }

    pub fn indexed_params(&self) -> impl Iterator<Item = &EventParam> {
        self.inputs.iter().filter(|p| p.indexed)
    }

    pub fn data_params(&self) -> impl Iterator<Item = &EventParam> {
        self.inputs.iter().filter(|p| !p.indexed)
    }
}

/// Configuration plus decoded interface definition for one logical contract on one chain.
///
/// Invariant: a descriptor belongs to exactly one chain (`chain_name`); within that chain,
/// address-to-contract routing built from a [`ChainContracts`] is a partial function.
#[derive(Clone, Debug)]
pub struct ContractDescriptor {
    pub chain_name: String,
    pub contract_name: String,
    pub addresses: HashSet<Address>,
    /// topic-0 -> event definition.
    pub events: HashMap<B256, EventDefinition>,
    /// If non-empty, only these event names are accepted; others are filtered.
    pub whitelist: HashSet<String>,
}

impl ContractDescriptor {
    pub fn event_for_topic0(&self, topic0: &B256) -> Option<&EventDefinition> {
        self.events.get(topic0)
    }

    pub fn is_whitelisted(&self, event_name: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.contains(event_name)
    }
}

/// Error raised while building the address routing table for a chain: two
/// contracts on the same chain must not share an address.
#[derive(Debug, thiserror::Error)]
#[error("address {address} is configured for both {first} and {second} on chain {chain}")]
pub struct DuplicateAddressError {
    pub chain: String,
    pub address: Address,
    pub first: String,
    pub second: String,
}

/// The deduplicated address set and address->contract routing table for one chain,
/// computed once at startup before the chain pipeline's loop starts.
#[derive(Clone, Debug)]
pub struct ChainContracts {
    pub chain_name: String,
    pub contracts: Vec<std::sync::Arc<ContractDescriptor>>,
    routing: HashMap<Address, std::sync::Arc<ContractDescriptor>>,
}

impl ChainContracts {
    pub fn build(
        chain_name: String,
        contracts: Vec<std::sync::Arc<ContractDescriptor>>,
    ) -> Result<Self, DuplicateAddressError> {
        let mut routing = HashMap::new();
        for contract in &contracts {
            for address in &contract.addresses {
                if let Some(existing) = routing.insert(*address, contract.clone()) {
                    return Err(DuplicateAddressError {
                        chain: chain_name,
                        address: *address,
                        first: existing.contract_name.clone(),
                        second: contract.contract_name.clone(),
                    });
                }
            }
        }
        Ok(Self {
            chain_name,
            contracts,
            routing,
        })
    }

    /// The deduplicated set of addresses to subscribe to on this chain.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.routing.keys()
    }

    pub fn route(&self, address: &Address) -> Option<&std::sync::Arc<ContractDescriptor>> {
        self.routing.get(address)
    }
}
