//! Validation of a transaction before it is executed.

use retrace_primitives::{Address, SpecId, U256};
use retrace_transaction::Transaction;

/// JSON-RPC error code reported for transactions rejected by [`pre_check`].
pub const PRE_CHECK_ERROR_CODE: i64 = 1000;

const TRANSACTION_GAS: u64 = 21_000;
const CREATE_GAS: u64 = 32_000;
const ZERO_DATA_GAS: u64 = 4;
const NON_ZERO_DATA_GAS_FRONTIER: u64 = 68;
const NON_ZERO_DATA_GAS_ISTANBUL: u64 = 16;
const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;
const INIT_CODE_WORD_GAS: u64 = 2;
const AUTHORIZATION_GAS: u64 = 25_000;

/// Reasons for rejecting a transaction without executing it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PreCheckError {
    /// The gas limit doesn't cover the intrinsic gas
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGasTooLow {
        /// Gas limit of the transaction
        have: u64,
        /// Intrinsic gas
        want: u64,
    },
    /// The fee cap is below the block's base fee
    #[error(
        "fee cap less than block base fee: address {address:#x}, gasFeeCap: {max_fee_per_gas} baseFee: {base_fee}"
    )]
    FeeCapTooLow {
        /// Sender
        address: Address,
        /// Fee cap of the transaction
        max_fee_per_gas: u128,
        /// Base fee of the block
        base_fee: u64,
    },
    /// The tip exceeds the fee cap
    #[error("tip higher than fee cap: address {address:#x}, tip: {max_priority_fee_per_gas} gasFeeCap: {max_fee_per_gas}")]
    TipAboveFeeCap {
        /// Sender
        address: Address,
        /// Tip of the transaction
        max_priority_fee_per_gas: u128,
        /// Fee cap of the transaction
        max_fee_per_gas: u128,
    },
    /// The sender cannot pay for gas and value
    #[error("insufficient funds for gas * price + value: address {address:#x} have {have} want {want}")]
    InsufficientFunds {
        /// Sender
        address: Address,
        /// Balance of the sender
        have: U256,
        /// Required balance
        want: U256,
    },
    /// The EVM refused the transaction
    #[error("{0}")]
    Rejected(String),
}

impl PreCheckError {
    /// JSON-RPC error code of the failure.
    pub fn code(&self) -> i64 {
        PRE_CHECK_ERROR_CODE
    }
}

/// Computes the gas charged before the first instruction executes.
pub fn intrinsic_gas(transaction: &Transaction, revision: SpecId) -> u64 {
    let mut gas = TRANSACTION_GAS;

    if transaction.is_create() && revision.is_enabled_in(SpecId::HOMESTEAD) {
        gas = gas.saturating_add(CREATE_GAS);
    }

    let non_zero_data_gas = if revision.is_enabled_in(SpecId::ISTANBUL) {
        NON_ZERO_DATA_GAS_ISTANBUL
    } else {
        NON_ZERO_DATA_GAS_FRONTIER
    };
    let data_gas = transaction.input.iter().fold(0u64, |gas, byte| {
        let byte_gas = if *byte == 0 {
            ZERO_DATA_GAS
        } else {
            non_zero_data_gas
        };
        gas.saturating_add(byte_gas)
    });
    gas = gas.saturating_add(data_gas);

    for item in transaction.access_list.iter() {
        let key_count = u64::try_from(item.storage_keys.len()).unwrap_or(u64::MAX);
        gas = gas
            .saturating_add(ACCESS_LIST_ADDRESS_GAS)
            .saturating_add(key_count.saturating_mul(ACCESS_LIST_STORAGE_KEY_GAS));
    }

    if transaction.is_create() && revision.is_enabled_in(SpecId::SHANGHAI) {
        let words = u64::try_from(transaction.input.len().div_ceil(32)).unwrap_or(u64::MAX);
        gas = gas.saturating_add(words.saturating_mul(INIT_CODE_WORD_GAS));
    }

    let authorizations = u64::try_from(transaction.authorization_list.len()).unwrap_or(u64::MAX);
    gas.saturating_add(authorizations.saturating_mul(AUTHORIZATION_GAS))
}

/// Validates a transaction against the block it executes in.
///
/// Checks run in order: intrinsic gas, fee cap against base fee, tip against
/// fee cap and finally the sender's balance. The balance check is skipped
/// when `balance` is `None`.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn pre_check(
    transaction: &Transaction,
    base_fee: Option<u64>,
    revision: SpecId,
    balance: Option<U256>,
) -> Result<(), PreCheckError> {
    let address = transaction.from.unwrap_or_default();

    let want = intrinsic_gas(transaction, revision);
    if transaction.gas_limit < want {
        return Err(PreCheckError::IntrinsicGasTooLow {
            have: transaction.gas_limit,
            want,
        });
    }

    let has_fee_fields =
        transaction.max_fee_per_gas > 0 || transaction.max_priority_fee_per_gas > 0;
    if revision.is_enabled_in(SpecId::LONDON) && has_fee_fields {
        if let Some(base_fee) = base_fee {
            if transaction.max_fee_per_gas < u128::from(base_fee) {
                return Err(PreCheckError::FeeCapTooLow {
                    address,
                    max_fee_per_gas: transaction.max_fee_per_gas,
                    base_fee,
                });
            }
        }
    }

    if transaction.max_priority_fee_per_gas > transaction.max_fee_per_gas {
        return Err(PreCheckError::TipAboveFeeCap {
            address,
            max_priority_fee_per_gas: transaction.max_priority_fee_per_gas,
            max_fee_per_gas: transaction.max_fee_per_gas,
        });
    }

    if let Some(have) = balance {
        let gas_price = if revision.is_enabled_in(SpecId::LONDON) {
            transaction.effective_gas_price(base_fee)
        } else {
            transaction.max_fee_per_gas
        };
        let want = U256::from(transaction.gas_limit)
            .saturating_mul(U256::from(gas_price))
            .saturating_add(transaction.value);

        if have < want {
            return Err(PreCheckError::InsufficientFunds {
                address,
                have,
                want,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use retrace_primitives::{address, b256, bytes};
    use retrace_transaction::{AccessList, AccessListItem, Call};

    use super::*;

    const SENDER: Address = address!("0xa872626373628737383927236382161739290870");

    fn transaction(call: Call) -> Transaction {
        Call {
            from: Some(SENDER),
            ..call
        }
        .to_transaction()
    }

    #[test]
    fn create_with_zero_gas() {
        let transaction = transaction(Call {
            gas: Some(0),
            ..Call::default()
        });

        let error = pre_check(&transaction, None, SpecId::PETERSBURG, Some(U256::ZERO))
            .expect_err("gas limit is zero");
        assert_eq!(error.to_string(), "intrinsic gas too low: have 0, want 53000");
        assert_eq!(error.code(), 1000);
    }

    #[test]
    fn intrinsic_gas_by_revision() {
        let call = transaction(Call {
            to: Some(SENDER),
            data: Some(bytes!("0x0001")),
            ..Call::default()
        });
        assert_eq!(intrinsic_gas(&call, SpecId::BYZANTIUM), 21_000 + 4 + 68);
        assert_eq!(intrinsic_gas(&call, SpecId::ISTANBUL), 21_000 + 4 + 16);

        let create = transaction(Call {
            data: Some(vec![1u8; 33].into()),
            ..Call::default()
        });
        assert_eq!(intrinsic_gas(&create, SpecId::FRONTIER), 21_000 + 33 * 68);
        assert_eq!(
            intrinsic_gas(&create, SpecId::LONDON),
            53_000 + 33 * 16
        );
        assert_eq!(
            intrinsic_gas(&create, SpecId::SHANGHAI),
            53_000 + 33 * 16 + 2 * 2
        );
    }

    #[test]
    fn intrinsic_gas_of_access_list() {
        let transaction = transaction(Call {
            to: Some(SENDER),
            access_list: Some(AccessList(vec![
                AccessListItem {
                    address: address!("0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae"),
                    storage_keys: vec![
                        b256!("0x0000000000000000000000000000000000000000000000000000000000000003"),
                        b256!("0x0000000000000000000000000000000000000000000000000000000000000007"),
                    ],
                },
                AccessListItem {
                    address: address!("0xbb9bc244d798123fde783fcc1c72d3bb8c189413"),
                    storage_keys: Vec::new(),
                },
            ])),
            ..Call::default()
        });

        assert_eq!(
            intrinsic_gas(&transaction, SpecId::BERLIN),
            21_000 + 2 * 2_400 + 2 * 1_900
        );
    }

    #[test]
    fn fee_cap_below_base_fee() {
        let transaction = transaction(Call {
            to: Some(SENDER),
            max_fee_per_gas: Some(2),
            ..Call::default()
        });

        let error = pre_check(&transaction, Some(7), SpecId::LONDON, Some(U256::ZERO))
            .expect_err("fee cap is below base fee");
        assert_eq!(
            error.to_string(),
            "fee cap less than block base fee: address 0xa872626373628737383927236382161739290870, gasFeeCap: 2 baseFee: 7"
        );
    }

    #[test]
    fn fee_cap_is_ignored_before_london() {
        let transaction = transaction(Call {
            to: Some(SENDER),
            max_fee_per_gas: Some(2),
            ..Call::default()
        });

        assert_eq!(
            pre_check(&transaction, Some(7), SpecId::BERLIN, None),
            Ok(())
        );
    }

    #[test]
    fn tip_above_fee_cap() {
        let transaction = transaction(Call {
            to: Some(SENDER),
            max_fee_per_gas: Some(2),
            max_priority_fee_per_gas: Some(24),
            ..Call::default()
        });

        let error = pre_check(&transaction, Some(1), SpecId::LONDON, Some(U256::ZERO))
            .expect_err("tip exceeds fee cap");
        assert_eq!(
            error.to_string(),
            "tip higher than fee cap: address 0xa872626373628737383927236382161739290870, tip: 24 gasFeeCap: 2"
        );
    }

    #[test]
    fn insufficient_funds() {
        let transaction = transaction(Call {
            max_fee_per_gas: Some(2),
            gas: Some(60_000),
            ..Call::default()
        });

        let error = pre_check(&transaction, Some(1), SpecId::LONDON, Some(U256::ZERO))
            .expect_err("sender has no balance");
        assert_eq!(
            error.to_string(),
            "insufficient funds for gas * price + value: address 0xa872626373628737383927236382161739290870 have 0 want 60000"
        );

        assert_eq!(
            pre_check(&transaction, Some(1), SpecId::LONDON, Some(U256::from(60_000))),
            Ok(())
        );
    }

    #[test]
    fn gas_bailout_skips_balance() {
        let transaction = transaction(Call {
            max_fee_per_gas: Some(2),
            gas: Some(60_000),
            ..Call::default()
        });

        assert_eq!(
            pre_check(&transaction, Some(1), SpecId::LONDON, None),
            Ok(())
        );
    }
}
