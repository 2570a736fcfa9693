use retrace_primitives::{B256, SpecId};

use crate::{
    ChainConfig, ConsensusEngine, ForkCondition, HardforkActivation, HardforkActivations,
    chains::known_chain,
};

/// Errors that can occur while parsing a stored chain configuration.
#[derive(Debug, thiserror::Error)]
pub enum ChainConfigError {
    /// The stored configuration is not valid JSON or has unexpected types
    #[error("invalid chain config: {0}")]
    Json(#[from] serde_json::Error),
    /// The configuration lacks a chain identifier
    #[error("missing chainId in chain config")]
    MissingChainId,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliqueConfig {
    #[serde(default)]
    period: u64,
    #[serde(default)]
    epoch: u64,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenesisConfig {
    chain_id: Option<u64>,
    homestead_block: Option<u64>,
    dao_fork_block: Option<u64>,
    eip150_block: Option<u64>,
    eip155_block: Option<u64>,
    byzantium_block: Option<u64>,
    constantinople_block: Option<u64>,
    petersburg_block: Option<u64>,
    istanbul_block: Option<u64>,
    muir_glacier_block: Option<u64>,
    berlin_block: Option<u64>,
    london_block: Option<u64>,
    arrow_glacier_block: Option<u64>,
    gray_glacier_block: Option<u64>,
    terminal_total_difficulty: Option<serde_json::Number>,
    merge_netsplit_block: Option<u64>,
    shanghai_time: Option<u64>,
    cancun_time: Option<u64>,
    prague_time: Option<u64>,
    osaka_time: Option<u64>,
    ethash: Option<serde_json::Value>,
    clique: Option<CliqueConfig>,
}

impl GenesisConfig {
    fn merge_block(&self) -> Option<u64> {
        self.merge_netsplit_block.or_else(|| {
            let ttd = self.terminal_total_difficulty.as_ref()?;
            if ttd.as_u64() == Some(0) {
                Some(0)
            } else {
                log::debug!("merge block not derivable from terminal total difficulty {ttd}");
                None
            }
        })
    }

    fn hardfork_activations(&self) -> HardforkActivations {
        let by_block = [
            (Some(0), SpecId::FRONTIER),
            (self.homestead_block, SpecId::HOMESTEAD),
            (self.dao_fork_block, SpecId::DAO_FORK),
            (self.eip150_block, SpecId::TANGERINE),
            (self.eip155_block, SpecId::SPURIOUS_DRAGON),
            (self.byzantium_block, SpecId::BYZANTIUM),
            (self.constantinople_block, SpecId::CONSTANTINOPLE),
            (self.petersburg_block, SpecId::PETERSBURG),
            (self.istanbul_block, SpecId::ISTANBUL),
            (self.muir_glacier_block, SpecId::MUIR_GLACIER),
            (self.berlin_block, SpecId::BERLIN),
            (self.london_block, SpecId::LONDON),
            (self.arrow_glacier_block, SpecId::ARROW_GLACIER),
            (self.gray_glacier_block, SpecId::GRAY_GLACIER),
            (self.merge_block(), SpecId::MERGE),
        ];
        let by_timestamp = [
            (self.shanghai_time, SpecId::SHANGHAI),
            (self.cancun_time, SpecId::CANCUN),
            (self.prague_time, SpecId::PRAGUE),
            (self.osaka_time, SpecId::OSAKA),
        ];

        let block_activations = by_block.into_iter().filter_map(|(block, hardfork)| {
            block.map(|block| HardforkActivation {
                condition: ForkCondition::Block(block),
                hardfork,
            })
        });
        let timestamp_activations = by_timestamp.into_iter().filter_map(|(timestamp, hardfork)| {
            timestamp.map(|timestamp| HardforkActivation {
                condition: ForkCondition::Timestamp(timestamp),
                hardfork,
            })
        });

        HardforkActivations::new(block_activations.chain(timestamp_activations).collect())
    }

    fn consensus(&self) -> ConsensusEngine {
        match (&self.clique, &self.ethash) {
            (Some(clique), _) => ConsensusEngine::Clique {
                period: clique.period,
                epoch: clique.epoch,
            },
            (None, Some(_)) => ConsensusEngine::Ethash,
            (None, None) => ConsensusEngine::NoProof,
        }
    }
}

pub(crate) fn parse(genesis_hash: Option<B256>, json: &[u8]) -> Result<ChainConfig, ChainConfigError> {
    let genesis: GenesisConfig = serde_json::from_slice(json)?;
    let chain_id = genesis.chain_id.ok_or(ChainConfigError::MissingChainId)?;

    let name = known_chain(chain_id).map_or_else(|| format!("Chain {chain_id}"), |known| known.name);

    Ok(ChainConfig {
        chain_id,
        name,
        genesis_hash,
        hardfork_activations: genesis.hardfork_activations(),
        consensus: genesis.consensus(),
    })
}
