use alloy_eips::eip2718::Encodable2718 as _;
use retrace_block::{Block, BlockBody, BlockWithHash, BodyForStorage, Header, Receipt};
use retrace_kv::{
    keys::{
        account_history_key, block_key, header_key, log_key, storage_change_set_key,
        storage_history_key, storage_key,
    },
    memory::MemoryDatabase,
    tables,
};
use retrace_primitives::{
    Address, B256, Bytes, EMPTY_OMMER_ROOT_HASH, HashMap, U256, keccak256,
};
use retrace_state_api::account::StoredAccount;
use retrace_transaction::Transaction;

use crate::cbor::{encode_logs, encode_receipts};

/// Gas limit of blocks created by [`MemoryChain::next_header`].
pub const BLOCK_GAS_LIMIT: u64 = 30_000_000;

/// Base fee of blocks created by [`MemoryChain::next_header`].
pub const BASE_FEE: u64 = 7;

/// Builds chain data inside a [`MemoryDatabase`], recording state history the
/// way the node does.
#[derive(Debug)]
pub struct MemoryChain {
    database: MemoryDatabase,
    canonical: Vec<B256>,
    next_transaction_id: u64,
    accounts: HashMap<Address, StoredAccount>,
    storage: HashMap<(Address, u64, B256), U256>,
    account_history: HashMap<Address, Vec<u64>>,
    storage_history: HashMap<(Address, B256), Vec<u64>>,
}

impl MemoryChain {
    /// Creates a chain holding an empty genesis block and the provided chain
    /// configuration JSON.
    pub fn new(chain_config: &str) -> Self {
        let mut chain = Self {
            database: MemoryDatabase::default(),
            canonical: Vec::new(),
            next_transaction_id: 0,
            accounts: HashMap::default(),
            storage: HashMap::default(),
            account_history: HashMap::default(),
            storage_history: HashMap::default(),
        };

        let genesis = chain.insert_block(chain.next_header(), Vec::new());
        chain
            .database
            .put(tables::CONFIG, genesis.hash.as_slice(), chain_config.as_bytes());
        chain
    }

    /// The underlying database.
    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }

    /// Number of the latest block.
    pub fn head_number(&self) -> u64 {
        self.canonical.len().saturating_sub(1) as u64
    }

    /// Hash of the canonical block with the provided number.
    pub fn block_hash(&self, number: u64) -> Option<B256> {
        usize::try_from(number)
            .ok()
            .and_then(|index| self.canonical.get(index))
            .copied()
    }

    /// Returns a header for the next block.
    pub fn next_header(&self) -> Header {
        let number = self.canonical.len() as u64;
        Header {
            parent_hash: self.canonical.last().copied().unwrap_or_default(),
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            number,
            gas_limit: BLOCK_GAS_LIMIT,
            timestamp: 1_700_000_000 + number * 12,
            base_fee_per_gas: Some(BASE_FEE),
            ..Header::default()
        }
    }

    /// Stores a block with the provided signed transactions and makes it the
    /// head. Senders are recovered and stored alongside.
    pub fn insert_block(
        &mut self,
        header: Header,
        mut transactions: Vec<Transaction>,
    ) -> BlockWithHash {
        let number = header.number;
        let hash = header.hash_slow();
        let number_key = header_key(number, &hash);

        self.database
            .put(tables::HEADERS, &number_key, &alloy_rlp::encode(&header));
        self.database
            .put(tables::HEADER_NUMBERS, hash.as_slice(), &block_key(number));
        self.database
            .put(tables::CANONICAL_HASHES, &block_key(number), hash.as_slice());

        let stored_body = BodyForStorage {
            base_tx_id: self.next_transaction_id,
            tx_count: transactions.len() as u64,
            ommers: Vec::new(),
        };
        self.database
            .put(tables::BLOCK_BODIES, &number_key, &alloy_rlp::encode(&stored_body));

        let mut senders = Vec::with_capacity(transactions.len() * 20);
        for transaction in &mut transactions {
            let envelope = transaction
                .envelope()
                .unwrap_or_else(|| panic!("only signed transactions can be stored"));
            self.database.put(
                tables::BLOCK_TRANSACTIONS,
                &block_key(self.next_transaction_id),
                &envelope.encoded_2718(),
            );
            self.database.put(
                tables::TRANSACTION_LOOKUP,
                transaction.hash.as_slice(),
                &block_key(number),
            );
            self.next_transaction_id += 1;

            let sender = transaction
                .recover_sender()
                .unwrap_or_else(|error| panic!("cannot recover sender: {error}"));
            senders.extend_from_slice(sender.as_slice());
        }
        self.database
            .put(tables::SENDERS, &number_key, &senders);

        let total_difficulty = U256::from(number + 1);
        self.database.put(
            tables::HEADERS_TOTAL_DIFFICULTY,
            &number_key,
            &alloy_rlp::encode(total_difficulty),
        );
        self.database.put(
            tables::SYNC_STAGE_PROGRESS,
            tables::EXECUTION_STAGE,
            &block_key(number),
        );

        let index = usize::try_from(number).unwrap_or(usize::MAX);
        self.canonical.truncate(index);
        self.canonical.push(hash);

        BlockWithHash {
            block: Block {
                header,
                body: BlockBody {
                    transactions,
                    ommers: Vec::new(),
                },
            },
            hash,
        }
    }

    /// Stores bytecode and returns its hash.
    pub fn insert_code(&mut self, code: &[u8]) -> B256 {
        let code_hash = keccak256(code);
        self.database.put(tables::CODE, code_hash.as_slice(), code);
        code_hash
    }

    /// Returns the current value of an account.
    pub fn account(&self, address: &Address) -> Option<StoredAccount> {
        self.accounts.get(address).copied()
    }

    /// Records that block `block_number` changed an account to `account`;
    /// `None` deletes it.
    pub fn change_account(
        &mut self,
        block_number: u64,
        address: Address,
        account: Option<StoredAccount>,
    ) {
        let previous = self.accounts.get(&address).copied();

        let mut change = address.to_vec();
        if let Some(previous) = previous {
            change.extend(previous.encode_for_storage());
        }
        self.database
            .put(tables::ACCOUNT_CHANGE_SET, &block_key(block_number), &change);

        let blocks = self.account_history.entry(address).or_default();
        push_block(blocks, block_number);
        self.database.put(
            tables::ACCOUNT_HISTORY,
            &account_history_key(&address, u64::MAX),
            &encode_blocks(blocks),
        );

        match account {
            Some(account) => {
                self.database.put(
                    tables::PLAIN_STATE,
                    address.as_slice(),
                    &account.encode_for_storage(),
                );
                self.accounts.insert(address, account);
            }
            None => {
                self.database.delete(tables::PLAIN_STATE, address.as_slice());
                self.accounts.remove(&address);
            }
        }
    }

    /// Records that block `block_number` changed a storage slot to `value`.
    pub fn change_storage(
        &mut self,
        block_number: u64,
        address: Address,
        incarnation: u64,
        location: B256,
        value: U256,
    ) {
        let slot = (address, incarnation, location);
        let previous = self.storage.get(&slot).copied().unwrap_or_default();

        let mut change = location.to_vec();
        change.extend_from_slice(&strip_leading_zeros(previous));
        self.database.put(
            tables::STORAGE_CHANGE_SET,
            &storage_change_set_key(block_number, &address, incarnation),
            &change,
        );

        let blocks = self.storage_history.entry((address, location)).or_default();
        push_block(blocks, block_number);
        self.database.put(
            tables::STORAGE_HISTORY,
            &storage_history_key(&address, &location, u64::MAX),
            &encode_blocks(blocks),
        );

        let key = storage_key(&address, incarnation, &location);
        if value == U256::ZERO {
            self.database.delete(tables::PLAIN_STATE, &key);
            self.storage.remove(&slot);
        } else {
            self.database
                .put(tables::PLAIN_STATE, &key, &strip_leading_zeros(value));
            self.storage.insert(slot, value);
        }
    }

    /// Stores the receipts of a block together with their logs.
    pub fn insert_receipts(&mut self, block_number: u64, receipts: &[Receipt]) {
        self.database.put(
            tables::RECEIPTS,
            &block_key(block_number),
            &encode_receipts(receipts),
        );

        for (index, receipt) in receipts.iter().enumerate() {
            if receipt.logs.is_empty() {
                continue;
            }

            let index = u32::try_from(index).unwrap_or(u32::MAX);
            self.database.put(
                tables::LOGS,
                &log_key(block_number, index),
                &encode_logs(&receipt.logs),
            );
        }
    }

    /// Stores issuance counters of a block.
    pub fn insert_issuance(&mut self, block_number: u64, issued: U256, burnt: U256) {
        for (prefix, value) in [
            (tables::TOTAL_ISSUED_PREFIX, issued),
            (tables::TOTAL_BURNT_PREFIX, burnt),
        ] {
            let mut key = prefix.to_vec();
            key.extend_from_slice(&block_key(block_number));
            self.database
                .put(tables::ISSUANCE, &key, &strip_leading_zeros(value));
        }
    }
}

fn push_block(blocks: &mut Vec<u64>, block_number: u64) {
    if blocks.last() != Some(&block_number) {
        blocks.push(block_number);
        blocks.sort_unstable();
    }
}

fn encode_blocks(blocks: &[u64]) -> Vec<u8> {
    blocks
        .iter()
        .flat_map(|block_number| block_number.to_be_bytes())
        .collect()
}

fn strip_leading_zeros(value: U256) -> Bytes {
    let bytes = value.to_be_bytes::<32>();
    let first_non_zero = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len());

    Bytes::copy_from_slice(bytes.get(first_non_zero..).unwrap_or_default())
}
