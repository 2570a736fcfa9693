use ciborium::Value;
use retrace_block::{BlockWithHash, Receipt};
use retrace_kv::{Transaction as KvTransaction, keys::block_key, tables};
use retrace_primitives::{Address, B256, Bytes, Log};
use retrace_transaction::TransactionType;

use crate::RawDbError;

/// Log key: block number followed by the transaction index.
const LOG_KEY_LENGTH: usize = 12;

struct StoredReceipt {
    transaction_type: TransactionType,
    success: bool,
    cumulative_gas_used: u64,
}

/// Reads the receipts stored for a block, including their logs.
///
/// A block without stored receipts yields no receipts. Logs that cannot be
/// decoded fail the whole read.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(tx)))]
pub async fn read_raw_receipts(
    tx: &dyn KvTransaction,
    block_number: u64,
) -> Result<Vec<Receipt>, RawDbError> {
    let value = tx.get_one(tables::RECEIPTS, &block_key(block_number)).await?;
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let stored = decode_receipts(&value).map_err(|message| RawDbError::InvalidReceipts {
        block_number,
        message,
    })?;

    let mut logs = vec![Vec::new(); stored.len()];
    let mut failure = None;
    tx.walk(
        tables::LOGS,
        &block_key(block_number),
        64,
        &mut |key, value| match assign_logs(&mut logs, key, value) {
            Ok(()) => true,
            Err(message) => {
                failure = Some(message);
                false
            }
        },
    )
    .await?;

    if let Some(message) = failure {
        return Err(RawDbError::InvalidLogs {
            block_number,
            message,
        });
    }

    Ok(stored
        .into_iter()
        .zip(logs)
        .map(|(receipt, logs)| {
            Receipt::new(
                receipt.transaction_type,
                receipt.success,
                receipt.cumulative_gas_used,
                logs,
            )
        })
        .collect())
}

/// Reads the receipts of a block, checking that there is one per
/// transaction.
pub async fn read_receipts(
    tx: &dyn KvTransaction,
    block: &BlockWithHash,
) -> Result<Vec<Receipt>, RawDbError> {
    let receipts = read_raw_receipts(tx, block.number()).await?;
    if receipts.len() != block.block.transactions().len() {
        return Err(RawDbError::ReceiptCountMismatch);
    }

    Ok(receipts)
}

fn decode_receipts(encoded: &[u8]) -> Result<Vec<StoredReceipt>, String> {
    let value: Value = ciborium::de::from_reader(encoded).map_err(|error| error.to_string())?;

    into_array(value)?
        .into_iter()
        .map(|receipt| {
            let mut fields = into_array(receipt)?.into_iter();
            let mut next = || fields.next().ok_or("receipt has fewer than 4 fields");

            let transaction_type = u8::try_from(into_u64(next()?)?)
                .ok()
                .and_then(TransactionType::from_type_byte)
                .ok_or("unknown receipt type")?;
            // Post-state root of pre-Byzantium receipts; not replayed.
            let _post_state = next()?;
            let status = into_u64(next()?)?;
            let cumulative_gas_used = into_u64(next()?)?;

            Ok(StoredReceipt {
                transaction_type,
                success: status == 1,
                cumulative_gas_used,
            })
        })
        .collect()
}

fn assign_logs(logs: &mut [Vec<Log>], key: &[u8], value: &[u8]) -> Result<(), String> {
    if key.len() != LOG_KEY_LENGTH {
        return Err(format!("invalid log key length: {}", key.len()));
    }

    let mut index = [0u8; 4];
    index.copy_from_slice(key.get(8..).unwrap_or_default());
    let index = u32::from_be_bytes(index) as usize;

    let receipt_logs = logs
        .get_mut(index)
        .ok_or_else(|| format!("logs for unknown transaction index {index}"))?;
    *receipt_logs = decode_logs(value)?;
    Ok(())
}

fn decode_logs(encoded: &[u8]) -> Result<Vec<Log>, String> {
    let value: Value = ciborium::de::from_reader(encoded).map_err(|error| error.to_string())?;

    into_array(value)?
        .into_iter()
        .map(|log| {
            let mut fields = into_array(log)?.into_iter();
            let mut next = || fields.next().ok_or("log has fewer than 3 fields");

            let address = into_bytes(next()?)?;
            if address.len() != 20 {
                return Err(format!("invalid log address length: {}", address.len()));
            }

            let topics = into_array(next()?)?
                .into_iter()
                .map(|topic| {
                    let topic = into_bytes(topic)?;
                    B256::try_from(topic.as_slice())
                        .map_err(|_error| format!("invalid log topic length: {}", topic.len()))
                })
                .collect::<Result<Vec<_>, String>>()?;

            let data = match next()? {
                Value::Null => Bytes::new(),
                data => Bytes::from(into_bytes(data)?),
            };

            Ok(Log::new_unchecked(
                Address::from_slice(&address),
                topics,
                data,
            ))
        })
        .collect()
}

fn into_array(value: Value) -> Result<Vec<Value>, String> {
    value
        .into_array()
        .map_err(|value| format!("expected array, found {value:?}"))
}

fn into_bytes(value: Value) -> Result<Vec<u8>, String> {
    value
        .into_bytes()
        .map_err(|value| format!("expected bytes, found {value:?}"))
}

fn into_u64(value: Value) -> Result<u64, String> {
    value
        .as_integer()
        .and_then(|integer| u64::try_from(integer).ok())
        .ok_or_else(|| format!("expected unsigned integer, found {value:?}"))
}

#[cfg(test)]
mod tests {
    use retrace_block::{Block, BlockBody};
    use retrace_kv::{Database as _, keys::log_key, memory::MemoryDatabase};
    use retrace_primitives::hex;
    use retrace_test_utils::cbor::{encode_logs, encode_receipts};

    use super::*;

    fn transfer_log(seed: u8) -> Log {
        Log::new_unchecked(
            Address::repeat_byte(seed),
            vec![B256::repeat_byte(seed), B256::with_last_byte(seed)],
            Bytes::from(vec![seed; 32]),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_receipts() -> anyhow::Result<()> {
        let db = MemoryDatabase::default();
        let tx = db.begin().await?;

        assert!(read_raw_receipts(tx.as_ref(), 3_529_600).await?.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_receipt_without_logs() -> anyhow::Result<()> {
        let db = MemoryDatabase::default();
        db.put(
            tables::RECEIPTS,
            &block_key(3_529_600),
            &hex::decode("818400f6011a0004a0c8")?,
        );
        let tx = db.begin().await?;

        let receipts = read_raw_receipts(tx.as_ref(), 3_529_600).await?;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].transaction_type, TransactionType::Legacy);
        assert!(receipts[0].success);
        assert_eq!(receipts[0].cumulative_gas_used, 0x0004_a0c8);
        assert!(receipts[0].logs.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn many_receipts_with_logs() -> anyhow::Result<()> {
        let db = MemoryDatabase::default();
        db.put(
            tables::RECEIPTS,
            &block_key(3_529_604),
            &hex::decode("828400f6011a0003be508400f6011a0008b89a")?,
        );
        db.put(
            tables::LOGS,
            &log_key(3_529_604, 1),
            &encode_logs(&[transfer_log(1), transfer_log(2)]),
        );
        // Logs of the next block must not leak in.
        db.put(
            tables::LOGS,
            &log_key(3_529_605, 0),
            &encode_logs(&[transfer_log(3)]),
        );
        let tx = db.begin().await?;

        let receipts = read_raw_receipts(tx.as_ref(), 3_529_604).await?;
        assert_eq!(receipts.len(), 2);
        assert!(receipts[0].logs.is_empty());
        assert_eq!(receipts[1].logs, vec![transfer_log(1), transfer_log(2)]);
        assert_eq!(receipts[1].gas_used(Some(&receipts[0])), 0x0008_b89a - 0x0003_be50);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_log_key_fails() -> anyhow::Result<()> {
        let db = MemoryDatabase::default();
        db.put(
            tables::RECEIPTS,
            &block_key(3_529_600),
            &hex::decode("818400f6011a0004a0c8")?,
        );
        let mut key = block_key(3_529_600).to_vec();
        key.push(0);
        db.put(tables::LOGS, &key, &encode_logs(&[transfer_log(1)]));
        let tx = db.begin().await?;

        let result = read_raw_receipts(tx.as_ref(), 3_529_600).await;
        assert!(matches!(result, Err(RawDbError::InvalidLogs { .. })));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_log_fails() -> anyhow::Result<()> {
        let db = MemoryDatabase::default();
        db.put(
            tables::RECEIPTS,
            &block_key(3_529_600),
            &hex::decode("818400f6011a0004a0c8")?,
        );
        // An array of a single log whose address is an integer.
        db.put(tables::LOGS, &log_key(3_529_600, 0), &hex::decode("81830180f6")?);
        let tx = db.begin().await?;

        let result = read_raw_receipts(tx.as_ref(), 3_529_600).await;
        assert!(matches!(result, Err(RawDbError::InvalidLogs { .. })));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn receipt_count_must_match_transactions() -> anyhow::Result<()> {
        let db = MemoryDatabase::default();
        let receipt = Receipt::new(TransactionType::DynamicFee, false, 21_000, Vec::new());
        db.put(
            tables::RECEIPTS,
            &block_key(7),
            &encode_receipts(&[receipt.clone()]),
        );
        let tx = db.begin().await?;

        let empty_block = BlockWithHash {
            block: Block {
                header: retrace_block::Header {
                    number: 7,
                    ..retrace_block::Header::default()
                },
                body: BlockBody::default(),
            },
            hash: B256::ZERO,
        };
        let result = read_receipts(tx.as_ref(), &empty_block).await;
        assert!(matches!(result, Err(RawDbError::ReceiptCountMismatch)));

        let receipts = read_raw_receipts(tx.as_ref(), 7).await?;
        assert_eq!(receipts, vec![receipt]);
        Ok(())
    }
}
