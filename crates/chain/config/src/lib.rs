//! Chain configurations and hardfork schedules.
//!
//! A [`ChainConfig`] is an immutable value. Known chains are built on demand
//! by [`ChainConfig::from_chain_id`]; other chains are parsed from the genesis
//! configuration stored alongside the chain data.

mod chains;
mod genesis;

use retrace_primitives::{B256, SpecId};

pub use self::{
    chains::{GOERLI_CHAIN_ID, MAINNET_CHAIN_ID, SEPOLIA_CHAIN_ID},
    genesis::ChainConfigError,
};

/// Fork condition for a hardfork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ForkCondition {
    /// Activation based on block number.
    Block(u64),
    /// Activation based on UNIX timestamp.
    Timestamp(u64),
}

/// A type representing the activation of a hardfork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardforkActivation {
    /// The condition for the hardfork activation.
    pub condition: ForkCondition,
    /// The hardfork to be activated.
    pub hardfork: SpecId,
}

/// Hardfork activations of a chain, in activation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct HardforkActivations {
    hardforks: Vec<HardforkActivation>,
}

impl HardforkActivations {
    /// Constructs a new instance with the provided hardforks.
    pub fn new(hardforks: Vec<HardforkActivation>) -> Self {
        Self { hardforks }
    }

    /// Creates a new instance for a chain that starts at the provided hardfork.
    pub fn with_spec_id(hardfork: SpecId) -> Self {
        Self {
            hardforks: vec![HardforkActivation {
                condition: ForkCondition::Block(0),
                hardfork,
            }],
        }
    }

    /// Whether no hardforks activations are present.
    pub fn is_empty(&self) -> bool {
        self.hardforks.is_empty()
    }

    /// Returns the hardfork active at the provided block.
    pub fn hardfork_at_block(&self, block_number: u64, timestamp: u64) -> Option<SpecId> {
        self.hardforks
            .iter()
            .rev()
            .find(|HardforkActivation { condition, .. }| match condition {
                ForkCondition::Block(activation) => block_number >= *activation,
                ForkCondition::Timestamp(activation) => timestamp >= *activation,
            })
            .map(|activation| activation.hardfork)
    }
}

impl From<&[HardforkActivation]> for HardforkActivations {
    fn from(hardforks: &[HardforkActivation]) -> Self {
        Self {
            hardforks: hardforks.to_vec(),
        }
    }
}

/// Consensus engine securing the chain before the merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsensusEngine {
    /// Proof of work
    Ethash,
    /// Proof of authority
    Clique {
        /// Seconds between blocks
        period: u64,
        /// Blocks per checkpoint
        epoch: u64,
    },
    /// No pre-merge consensus
    NoProof,
}

/// Configuration of a chain.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Chain ID
    pub chain_id: u64,
    /// Chain name
    pub name: String,
    /// Hash of the genesis block, if known
    pub genesis_hash: Option<B256>,
    /// Hardfork activations for the chain
    pub hardfork_activations: HardforkActivations,
    /// Pre-merge consensus engine
    pub consensus: ConsensusEngine,
}

impl ChainConfig {
    /// Returns the configuration of a well-known chain.
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        chains::known_chain(chain_id)
    }

    /// Parses the genesis configuration JSON stored for a chain.
    pub fn from_genesis_json(
        genesis_hash: Option<B256>,
        json: &[u8],
    ) -> Result<Self, ChainConfigError> {
        genesis::parse(genesis_hash, json)
    }

    /// Returns the revision active at the provided block.
    pub fn revision(&self, block_number: u64, timestamp: u64) -> SpecId {
        self.hardfork_activations
            .hardfork_at_block(block_number, timestamp)
            .unwrap_or(SpecId::FRONTIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardfork_at_block_picks_latest_activation() {
        let activations = HardforkActivations::new(vec![
            HardforkActivation {
                condition: ForkCondition::Block(0),
                hardfork: SpecId::BERLIN,
            },
            HardforkActivation {
                condition: ForkCondition::Block(10),
                hardfork: SpecId::LONDON,
            },
            HardforkActivation {
                condition: ForkCondition::Timestamp(1_000),
                hardfork: SpecId::SHANGHAI,
            },
        ]);

        assert_eq!(activations.hardfork_at_block(9, 0), Some(SpecId::BERLIN));
        assert_eq!(activations.hardfork_at_block(10, 999), Some(SpecId::LONDON));
        assert_eq!(activations.hardfork_at_block(11, 1_000), Some(SpecId::SHANGHAI));
    }

    #[test]
    fn empty_activations_default_to_frontier() {
        let config = ChainConfig {
            chain_id: 1337,
            name: "Local".to_owned(),
            genesis_hash: None,
            hardfork_activations: HardforkActivations::default(),
            consensus: ConsensusEngine::NoProof,
        };

        assert_eq!(config.revision(100, 100), SpecId::FRONTIER);
    }
}
