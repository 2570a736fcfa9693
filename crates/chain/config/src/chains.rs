//! Configurations for well-known Ethereum chains.

use retrace_primitives::{SpecId, b256};

use crate::{ChainConfig, ConsensusEngine, ForkCondition, HardforkActivation};

/// Mainnet chain ID
pub const MAINNET_CHAIN_ID: u64 = 0x1;

const MAINNET_HARDFORKS: &[HardforkActivation] = &[
    HardforkActivation {
        condition: ForkCondition::Block(0),
        hardfork: SpecId::FRONTIER,
    },
    HardforkActivation {
        condition: ForkCondition::Block(200_000),
        hardfork: SpecId::FRONTIER_THAWING,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_150_000),
        hardfork: SpecId::HOMESTEAD,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_920_000),
        hardfork: SpecId::DAO_FORK,
    },
    HardforkActivation {
        condition: ForkCondition::Block(2_463_000),
        hardfork: SpecId::TANGERINE,
    },
    HardforkActivation {
        condition: ForkCondition::Block(2_675_000),
        hardfork: SpecId::SPURIOUS_DRAGON,
    },
    HardforkActivation {
        condition: ForkCondition::Block(4_370_000),
        hardfork: SpecId::BYZANTIUM,
    },
    HardforkActivation {
        condition: ForkCondition::Block(7_280_000),
        hardfork: SpecId::PETERSBURG,
    },
    HardforkActivation {
        condition: ForkCondition::Block(9_069_000),
        hardfork: SpecId::ISTANBUL,
    },
    HardforkActivation {
        condition: ForkCondition::Block(9_200_000),
        hardfork: SpecId::MUIR_GLACIER,
    },
    HardforkActivation {
        condition: ForkCondition::Block(12_244_000),
        hardfork: SpecId::BERLIN,
    },
    HardforkActivation {
        condition: ForkCondition::Block(12_965_000),
        hardfork: SpecId::LONDON,
    },
    HardforkActivation {
        condition: ForkCondition::Block(13_773_000),
        hardfork: SpecId::ARROW_GLACIER,
    },
    HardforkActivation {
        condition: ForkCondition::Block(15_050_000),
        hardfork: SpecId::GRAY_GLACIER,
    },
    HardforkActivation {
        condition: ForkCondition::Block(15_537_394),
        hardfork: SpecId::MERGE,
    },
    HardforkActivation {
        condition: ForkCondition::Block(17_034_870),
        hardfork: SpecId::SHANGHAI,
    },
    HardforkActivation {
        condition: ForkCondition::Block(19_426_589),
        hardfork: SpecId::CANCUN,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_746_612_311),
        hardfork: SpecId::PRAGUE,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_764_798_551),
        hardfork: SpecId::OSAKA,
    },
];

/// Goerli chain ID
pub const GOERLI_CHAIN_ID: u64 = 0x5;

const GOERLI_HARDFORKS: &[HardforkActivation] = &[
    HardforkActivation {
        condition: ForkCondition::Block(0),
        hardfork: SpecId::PETERSBURG,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_561_651),
        hardfork: SpecId::ISTANBUL,
    },
    HardforkActivation {
        condition: ForkCondition::Block(4_460_644),
        hardfork: SpecId::BERLIN,
    },
    HardforkActivation {
        condition: ForkCondition::Block(5_062_605),
        hardfork: SpecId::LONDON,
    },
    HardforkActivation {
        condition: ForkCondition::Block(7_382_819),
        hardfork: SpecId::MERGE,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_678_832_736),
        hardfork: SpecId::SHANGHAI,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_705_473_120),
        hardfork: SpecId::CANCUN,
    },
];

/// Sepolia chain ID
pub const SEPOLIA_CHAIN_ID: u64 = 0xaa36a7;

const SEPOLIA_HARDFORKS: &[HardforkActivation] = &[
    HardforkActivation {
        condition: ForkCondition::Block(0),
        hardfork: SpecId::LONDON,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_450_409),
        hardfork: SpecId::MERGE,
    },
    HardforkActivation {
        condition: ForkCondition::Block(2_990_908),
        hardfork: SpecId::SHANGHAI,
    },
    HardforkActivation {
        condition: ForkCondition::Block(5_187_023),
        hardfork: SpecId::CANCUN,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_741_159_776),
        hardfork: SpecId::PRAGUE,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_760_427_360),
        hardfork: SpecId::OSAKA,
    },
];

pub(crate) fn known_chain(chain_id: u64) -> Option<ChainConfig> {
    let config = match chain_id {
        MAINNET_CHAIN_ID => ChainConfig {
            chain_id,
            name: "Mainnet".to_owned(),
            genesis_hash: Some(b256!(
                "0xd4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3"
            )),
            hardfork_activations: MAINNET_HARDFORKS.into(),
            consensus: ConsensusEngine::Ethash,
        },
        GOERLI_CHAIN_ID => ChainConfig {
            chain_id,
            name: "Goerli".to_owned(),
            genesis_hash: Some(b256!(
                "0xbf7e331f7f7c1dd2e05159666b3bf8bc7a8a3a9eb1d518969eab529dd9b88c1a"
            )),
            hardfork_activations: GOERLI_HARDFORKS.into(),
            consensus: ConsensusEngine::Clique {
                period: 15,
                epoch: 30_000,
            },
        },
        SEPOLIA_CHAIN_ID => ChainConfig {
            chain_id,
            name: "Sepolia".to_owned(),
            genesis_hash: Some(b256!(
                "0x25a5cc106eea7138acab33231d7160d69cb777ee0c2c553fcddf5138993e6dd9"
            )),
            hardfork_activations: SEPOLIA_HARDFORKS.into(),
            consensus: ConsensusEngine::Ethash,
        },
        _ => return None,
    };

    Some(config)
}
