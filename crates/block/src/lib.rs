//! Blocks, block identifiers and receipts.

mod block_id;
mod receipt;

pub use alloy_consensus::Header;
use alloy_rlp::{RlpDecodable, RlpEncodable};
use retrace_primitives::B256;
use retrace_transaction::Transaction;

pub use self::{
    block_id::{BlockNumberOrHash, BlockTag, ParseBlockIdError},
    receipt::{BlockReceipts, Receipt},
};

/// Transactions and ommers of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockBody {
    /// Transactions, in execution order
    pub transactions: Vec<Transaction>,
    /// Ommer headers
    pub ommers: Vec<Header>,
}

/// Body descriptor as stored in the chain data. Transactions are stored
/// separately under consecutive ids starting at `base_tx_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, RlpDecodable, RlpEncodable)]
pub struct BodyForStorage {
    /// Id of the block's first transaction
    pub base_tx_id: u64,
    /// Number of transactions
    pub tx_count: u64,
    /// Ommer headers
    pub ommers: Vec<Header>,
}

/// A block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// Header
    pub header: Header,
    /// Body
    pub body: BlockBody,
}

impl Block {
    /// Block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Transactions, in execution order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.body.transactions
    }
}

/// A block alongside its hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockWithHash {
    /// The block
    pub block: Block,
    /// Hash of the block's header
    pub hash: B256,
}

impl BlockWithHash {
    /// Constructs a new instance, hashing the header.
    pub fn new(block: Block) -> Self {
        let hash = block.header.hash_slow();
        Self { block, hash }
    }

    /// Block number.
    pub fn number(&self) -> u64 {
        self.block.number()
    }
}

#[cfg(test)]
mod tests {
    use alloy_rlp::Decodable as _;
    use retrace_primitives::hex;

    use super::*;

    #[test]
    fn decode_body_for_storage() -> anyhow::Result<()> {
        let raw = hex::decode("c68369e45a03c0")?;
        let body = BodyForStorage::decode(&mut raw.as_slice())?;

        assert_eq!(body.base_tx_id, 0x69e45a);
        assert_eq!(body.tx_count, 3);
        assert!(body.ommers.is_empty());
        assert_eq!(alloy_rlp::encode(&body), raw);
        Ok(())
    }
}
