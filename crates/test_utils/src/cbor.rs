//! CBOR encodings of receipts and logs as stored by the node.

use ciborium::Value;
use retrace_block::Receipt;
use retrace_primitives::Log;

/// Encodes receipts without their logs.
pub fn encode_receipts(receipts: &[Receipt]) -> Vec<u8> {
    let receipts = receipts
        .iter()
        .map(|receipt| {
            Value::Array(vec![
                Value::Integer(receipt.transaction_type.type_byte().into()),
                Value::Null,
                Value::Integer(u64::from(receipt.success).into()),
                Value::Integer(receipt.cumulative_gas_used.into()),
            ])
        })
        .collect();

    encode(&Value::Array(receipts))
}

/// Encodes the logs of a single transaction.
pub fn encode_logs(logs: &[Log]) -> Vec<u8> {
    let logs = logs
        .iter()
        .map(|log| {
            Value::Array(vec![
                Value::Bytes(log.address.to_vec()),
                Value::Array(
                    log.topics()
                        .iter()
                        .map(|topic| Value::Bytes(topic.to_vec()))
                        .collect(),
                ),
                Value::Bytes(log.data.data.to_vec()),
            ])
        })
        .collect();

    encode(&Value::Array(logs))
}

fn encode(value: &Value) -> Vec<u8> {
    let mut encoded = Vec::new();
    ciborium::ser::into_writer(value, &mut encoded)
        .unwrap_or_else(|error| panic!("CBOR encoding into memory failed: {error}"));
    encoded
}
