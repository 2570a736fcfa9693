use alloy_primitives::{Bloom, logs_bloom};
use retrace_primitives::Log;
use retrace_transaction::TransactionType;

use crate::BlockWithHash;

/// Outcome of a transaction as stored by the node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Type of the transaction that produced the receipt
    pub transaction_type: TransactionType,
    /// Whether execution succeeded
    pub success: bool,
    /// Gas used by the block up to and including this transaction
    pub cumulative_gas_used: u64,
    /// Emitted logs
    pub logs: Vec<Log>,
    /// Bloom filter over the logs
    pub bloom: Bloom,
}

impl Receipt {
    /// Constructs a receipt, computing the bloom filter from its logs.
    pub fn new(
        transaction_type: TransactionType,
        success: bool,
        cumulative_gas_used: u64,
        logs: Vec<Log>,
    ) -> Self {
        let bloom = logs_bloom(&logs);
        Self {
            transaction_type,
            success,
            cumulative_gas_used,
            logs,
            bloom,
        }
    }

    /// Gas used by this transaction alone, given the previous receipt of the
    /// block.
    pub fn gas_used(&self, previous: Option<&Receipt>) -> u64 {
        self.cumulative_gas_used
            .saturating_sub(previous.map_or(0, |receipt| receipt.cumulative_gas_used))
    }
}

/// Receipts of a block, in transaction order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockReceipts {
    /// The block the receipts belong to
    pub block_number: u64,
    /// Receipts, one per transaction
    pub receipts: Vec<Receipt>,
}

impl BlockReceipts {
    /// Whether the receipts line up one to one with the block's transactions.
    pub fn matches(&self, block: &BlockWithHash) -> bool {
        self.block_number == block.number()
            && self.receipts.len() == block.block.transactions().len()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::BloomInput;
    use retrace_primitives::{Address, B256, Bytes, LogData};

    use super::*;

    #[test]
    fn bloom_covers_logs() {
        let address = Address::repeat_byte(0x11);
        let topic = B256::repeat_byte(0x22);
        let log = Log {
            address,
            data: LogData::new_unchecked(vec![topic], Bytes::new()),
        };

        let receipt = Receipt::new(TransactionType::DynamicFee, true, 21_000, vec![log]);
        assert!(receipt.bloom.contains_input(BloomInput::Raw(address.as_slice())));
        assert!(receipt.bloom.contains_input(BloomInput::Raw(topic.as_slice())));
        assert_eq!(Receipt::default().bloom, Bloom::ZERO);
    }

    #[test]
    fn gas_used_from_cumulative() {
        let first = Receipt::new(TransactionType::Legacy, true, 21_000, Vec::new());
        let second = Receipt::new(TransactionType::Legacy, false, 50_000, Vec::new());

        assert_eq!(first.gas_used(None), 21_000);
        assert_eq!(second.gas_used(Some(&first)), 29_000);
    }
}
