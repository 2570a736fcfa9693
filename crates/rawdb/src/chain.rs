use alloy_rlp::Decodable as _;
use retrace_block::{Block, BlockBody, BlockWithHash, BodyForStorage, Header};
use retrace_chain_config::ChainConfig;
use retrace_kv::{
    Transaction as KvTransaction,
    keys::{block_key, decode_u64, header_key},
    tables,
};
use retrace_primitives::{Address, B256, Bytes, U256};
use retrace_transaction::Transaction;

use crate::RawDbError;

const ADDRESS_LENGTH: usize = 20;
const HASH_LENGTH: usize = 32;

/// Reads the number of the block with the provided hash.
pub async fn read_header_number(tx: &dyn KvTransaction, hash: &B256) -> Result<u64, RawDbError> {
    let value = tx.get_one(tables::HEADER_NUMBERS, hash.as_slice()).await?;
    if value.is_empty() {
        return Err(RawDbError::MissingHeaderNumber);
    }

    decode_u64(&value).ok_or(RawDbError::InvalidBlockNumber(value.len()))
}

/// Reads the hash of the canonical block with the provided number.
///
/// Values shorter than a hash are left-padded; longer ones are truncated.
pub async fn read_canonical_block_hash(
    tx: &dyn KvTransaction,
    number: u64,
) -> Result<B256, RawDbError> {
    let value = tx
        .get_one(tables::CANONICAL_HASHES, &block_key(number))
        .await?;
    if value.is_empty() {
        return Err(RawDbError::MissingCanonicalHash);
    }

    let hash = value.get(..HASH_LENGTH).unwrap_or(value.as_ref());
    Ok(B256::left_padding_from(hash))
}

/// Reads the RLP-encoded header. Empty if absent.
pub async fn read_header_rlp(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<Bytes, RawDbError> {
    Ok(tx
        .get_one(tables::HEADERS, &header_key(number, hash))
        .await?)
}

/// Reads a header, checking that it hashes to `hash`.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(tx)))]
pub async fn read_header(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<Header, RawDbError> {
    let encoded = read_header_rlp(tx, hash, number).await?;
    if encoded.is_empty() {
        return Err(RawDbError::MissingHeader);
    }

    let header = Header::decode(&mut encoded.as_ref()).map_err(RawDbError::InvalidHeader)?;

    let computed = header.hash_slow();
    if computed != *hash {
        return Err(RawDbError::HeaderHashMismatch {
            expected: *hash,
            computed,
        });
    }

    Ok(header)
}

/// Reads the header of the block with the provided hash.
pub async fn read_header_by_hash(
    tx: &dyn KvTransaction,
    hash: &B256,
) -> Result<Header, RawDbError> {
    let number = read_header_number(tx, hash).await?;
    read_header(tx, hash, number).await
}

/// Reads the header of the canonical block with the provided number.
pub async fn read_header_by_number(
    tx: &dyn KvTransaction,
    number: u64,
) -> Result<Header, RawDbError> {
    let hash = read_canonical_block_hash(tx, number).await?;
    read_header(tx, &hash, number).await
}

/// Reads the RLP-encoded body descriptor. Empty if absent.
pub async fn read_body_rlp(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<Bytes, RawDbError> {
    Ok(tx
        .get_one(tables::BLOCK_BODIES, &header_key(number, hash))
        .await?)
}

/// Reads a block body including its transactions.
///
/// Senders are attached when the stored senders line up with the
/// transactions; otherwise they are left unset for later recovery.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(tx)))]
pub async fn read_body(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<BlockBody, RawDbError> {
    let encoded = read_body_rlp(tx, hash, number).await?;
    if encoded.is_empty() {
        return Err(RawDbError::MissingBody);
    }

    let stored =
        BodyForStorage::decode(&mut encoded.as_ref()).map_err(RawDbError::InvalidBody)?;

    let mut transactions = read_transactions(tx, stored.base_tx_id, stored.tx_count).await?;

    let senders = read_senders(tx, hash, number).await?;
    if senders.len() == transactions.len() {
        for (transaction, sender) in transactions.iter_mut().zip(senders) {
            transaction.from = Some(sender);
        }
    } else if !senders.is_empty() {
        log::warn!(
            "#senders and #transactions do not match for block {number}: {} != {}",
            senders.len(),
            transactions.len()
        );
    }

    Ok(BlockBody {
        transactions,
        ommers: stored.ommers,
    })
}

async fn read_transactions(
    tx: &dyn KvTransaction,
    base_tx_id: u64,
    count: u64,
) -> Result<Vec<Transaction>, RawDbError> {
    let mut transactions = Vec::new();
    if count == 0 {
        return Ok(transactions);
    }

    let mut next_id = base_tx_id;
    let mut failure = None;
    tx.walk(
        tables::BLOCK_TRANSACTIONS,
        &block_key(base_tx_id),
        0,
        &mut |_key, value| match Transaction::decode(value) {
            Ok(transaction) => {
                transactions.push(transaction);
                next_id += 1;
                next_id - base_tx_id < count
            }
            Err(error) => {
                failure = Some(RawDbError::InvalidTransaction {
                    id: next_id,
                    message: error.to_string(),
                });
                false
            }
        },
    )
    .await?;

    match failure {
        Some(error) => Err(error),
        None => Ok(transactions),
    }
}

/// Reads the recovered senders of a block's transactions.
pub async fn read_senders(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<Vec<Address>, RawDbError> {
    let value = tx
        .get_one(tables::SENDERS, &header_key(number, hash))
        .await?;

    let senders = value.chunks_exact(ADDRESS_LENGTH);
    if !senders.remainder().is_empty() {
        log::warn!(
            "ignoring {} trailing bytes in senders of block {number}",
            senders.remainder().len()
        );
    }

    Ok(senders.map(Address::from_slice).collect())
}

/// Reads the total difficulty of the chain up to and including a block.
pub async fn read_total_difficulty(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<U256, RawDbError> {
    let value = tx
        .get_one(tables::HEADERS_TOTAL_DIFFICULTY, &header_key(number, hash))
        .await?;
    if value.is_empty() {
        return Err(RawDbError::MissingTotalDifficulty);
    }

    alloy_rlp::decode_exact(value.as_ref()).map_err(RawDbError::InvalidTotalDifficulty)
}

/// Reads a full block.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(tx)))]
pub async fn read_block(
    tx: &dyn KvTransaction,
    hash: &B256,
    number: u64,
) -> Result<BlockWithHash, RawDbError> {
    let header = read_header(tx, hash, number).await?;
    let body = read_body(tx, hash, number).await?;

    Ok(BlockWithHash {
        block: Block { header, body },
        hash: *hash,
    })
}

/// Reads the block with the provided hash.
pub async fn read_block_by_hash(
    tx: &dyn KvTransaction,
    hash: &B256,
) -> Result<BlockWithHash, RawDbError> {
    let number = read_header_number(tx, hash).await?;
    read_block(tx, hash, number).await
}

/// Reads the canonical block with the provided number.
pub async fn read_block_by_number(
    tx: &dyn KvTransaction,
    number: u64,
) -> Result<BlockWithHash, RawDbError> {
    let hash = read_canonical_block_hash(tx, number).await?;
    read_block(tx, &hash, number).await
}

/// Reads the number of the block containing a transaction.
pub async fn read_block_number_by_transaction_hash(
    tx: &dyn KvTransaction,
    transaction_hash: &B256,
) -> Result<u64, RawDbError> {
    let value = tx
        .get_one(tables::TRANSACTION_LOOKUP, transaction_hash.as_slice())
        .await?;
    if value.is_empty() {
        return Err(RawDbError::MissingTransactionLookup);
    }

    decode_u64(&value).ok_or(RawDbError::InvalidBlockNumber(value.len()))
}

/// Reads the canonical block containing a transaction.
pub async fn read_block_by_transaction_hash(
    tx: &dyn KvTransaction,
    transaction_hash: &B256,
) -> Result<BlockWithHash, RawDbError> {
    let number = read_block_number_by_transaction_hash(tx, transaction_hash).await?;
    read_block_by_number(tx, number).await
}

/// Reads the chain configuration stored for the genesis block.
pub async fn read_chain_config(tx: &dyn KvTransaction) -> Result<ChainConfig, RawDbError> {
    let genesis_hash = read_canonical_block_hash(tx, 0).await?;
    let data = tx.get_one(tables::CONFIG, genesis_hash.as_slice()).await?;
    if data.is_empty() {
        return Err(RawDbError::MissingChainConfig);
    }

    Ok(ChainConfig::from_genesis_json(Some(genesis_hash), &data)?)
}

/// Reads the identifier of the stored chain.
pub async fn read_chain_id(tx: &dyn KvTransaction) -> Result<u64, RawDbError> {
    Ok(read_chain_config(tx).await?.chain_id)
}

/// Reads the amount of ether issued up to a block.
pub async fn read_total_issued(tx: &dyn KvTransaction, number: u64) -> Result<U256, RawDbError> {
    read_issuance(tx, tables::TOTAL_ISSUED_PREFIX, number).await
}

/// Reads the amount of ether burnt up to a block.
pub async fn read_total_burnt(tx: &dyn KvTransaction, number: u64) -> Result<U256, RawDbError> {
    read_issuance(tx, tables::TOTAL_BURNT_PREFIX, number).await
}

async fn read_issuance(
    tx: &dyn KvTransaction,
    prefix: &[u8],
    number: u64,
) -> Result<U256, RawDbError> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&block_key(number));

    let value = tx.get_one(tables::ISSUANCE, &key).await?;
    U256::try_from_be_slice(&value).ok_or(RawDbError::InvalidIssuance(value.len()))
}

/// Reads the number of the latest executed block.
pub async fn read_latest_block_number(tx: &dyn KvTransaction) -> Result<u64, RawDbError> {
    let value = tx
        .get_one(tables::SYNC_STAGE_PROGRESS, tables::EXECUTION_STAGE)
        .await?;
    if value.is_empty() {
        return Err(RawDbError::MissingLatestBlock);
    }

    decode_u64(&value).ok_or(RawDbError::InvalidBlockNumber(value.len()))
}
