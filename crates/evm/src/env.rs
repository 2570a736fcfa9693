//! Conversion of chain data into revm environments.

use alloy_eips::eip7702::RecoveredAuthority;
use retrace_block::Header;
use retrace_chain_config::ChainConfig;
use retrace_primitives::{SpecId, U256};
use retrace_transaction::{SignedAuthorization, Transaction, TransactionType};
use revm::{
    context::{BlockEnv, CfgEnv, TxEnv},
    context_interface::{
        either::Either,
        transaction::{
            AccessList, AccessListItem, Authorization, RecoveredAuthorization,
            SignedAuthorization as RevmSignedAuthorization,
        },
    },
    primitives::eip4844::{
        BLOB_BASE_FEE_UPDATE_FRACTION_CANCUN, BLOB_BASE_FEE_UPDATE_FRACTION_PRAGUE,
    },
};

use crate::ExecutorError;

/// Builds the block environment of `header`.
pub fn block_env(header: &Header, revision: SpecId) -> BlockEnv {
    let mut block = BlockEnv {
        number: U256::from(header.number),
        beneficiary: header.beneficiary,
        timestamp: U256::from(header.timestamp),
        gas_limit: header.gas_limit,
        basefee: header.base_fee_per_gas.unwrap_or_default(),
        difficulty: header.difficulty,
        prevrandao: Some(header.mix_hash),
        blob_excess_gas_and_price: None,
    };

    if revision.is_enabled_in(SpecId::CANCUN) {
        let fraction = if revision.is_enabled_in(SpecId::PRAGUE) {
            BLOB_BASE_FEE_UPDATE_FRACTION_PRAGUE
        } else {
            BLOB_BASE_FEE_UPDATE_FRACTION_CANCUN
        };
        block.set_blob_excess_gas_and_price(header.excess_blob_gas.unwrap_or_default(), fraction);
    }

    block
}

/// Builds the configuration environment for executing at `revision`.
///
/// Nonce, block gas limit, base fee and EIP-3607 checks are disabled. Balance
/// checks are disabled as well when `gas_bailout` is set.
pub fn cfg_env(chain_config: &ChainConfig, revision: SpecId, gas_bailout: bool) -> CfgEnv {
    let mut cfg = CfgEnv::new_with_spec(revision);
    cfg.chain_id = chain_config.chain_id;
    cfg.disable_nonce_check = true;
    cfg.disable_block_gas_limit = true;
    cfg.disable_eip3607 = true;
    cfg.disable_base_fee = true;
    cfg.disable_balance_check = gas_bailout;
    cfg.tx_gas_limit_cap = Some(u64::MAX);
    cfg
}

/// Builds the transaction environment of `transaction`.
///
/// The sender must have been recovered, or set by the caller for ad-hoc calls.
/// Typed transactions without a chain id are bound to `chain_id`.
pub fn tx_env(transaction: &Transaction, chain_id: u64) -> Result<TxEnv, ExecutorError> {
    let (gas_priority_fee, chain_id) = match transaction.transaction_type {
        TransactionType::Legacy => (None, transaction.chain_id),
        TransactionType::AccessList => (None, transaction.chain_id.or(Some(chain_id))),
        _ => (
            Some(transaction.max_priority_fee_per_gas),
            transaction.chain_id.or(Some(chain_id)),
        ),
    };

    TxEnv::builder()
        .tx_type(Some(transaction.transaction_type.type_byte()))
        .caller(transaction.from.unwrap_or_default())
        .gas_limit(transaction.gas_limit)
        .gas_price(transaction.max_fee_per_gas)
        .gas_priority_fee(gas_priority_fee)
        .value(transaction.value)
        .data(transaction.input.clone())
        .nonce(transaction.nonce)
        .chain_id(chain_id)
        .kind(transaction.kind())
        .access_list(access_list(transaction))
        .max_fee_per_blob_gas(transaction.max_fee_per_blob_gas)
        .blob_hashes(transaction.blob_versioned_hashes.clone())
        .authorization_list(authorization_list(&transaction.authorization_list))
        .build()
        .map_err(|error| ExecutorError::Evm(format!("invalid transaction environment: {error:?}")))
}

fn access_list(transaction: &Transaction) -> AccessList {
    AccessList(
        transaction
            .access_list
            .iter()
            .map(|item| AccessListItem {
                address: item.address,
                storage_keys: item.storage_keys.clone(),
            })
            .collect(),
    )
}

fn authorization_list(
    authorizations: &[SignedAuthorization],
) -> Vec<Either<RevmSignedAuthorization, RecoveredAuthorization>> {
    authorizations
        .iter()
        .map(|authorization| {
            let inner = Authorization {
                chain_id: *authorization.chain_id(),
                address: *authorization.address(),
                nonce: authorization.nonce(),
            };
            let authority = authorization
                .recover_authority()
                .map_or(RecoveredAuthority::Invalid, RecoveredAuthority::Valid);

            Either::Right(RecoveredAuthorization::new_unchecked(inner, authority))
        })
        .collect()
}
