use retrace_primitives::{Address, Bytes, U256};

use crate::{AccessList, Transaction, TransactionType};

/// Gas limit of an ad-hoc call that does not specify one.
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 50_000_000;

/// Parameters of an ad-hoc message call.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Recipient; absent for contract creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas limit
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub gas: Option<u64>,
    /// Legacy gas price
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub gas_price: Option<u128>,
    /// Maximum tip per gas
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub max_priority_fee_per_gas: Option<u128>,
    /// Maximum total fee per gas
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub max_fee_per_gas: Option<u128>,
    /// Transferred value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Call data
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "input")]
    pub data: Option<Bytes>,
    /// Sender nonce
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub nonce: Option<u64>,
    /// EIP-2930 access list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
}

impl Call {
    /// Converts the call into an unsigned transaction.
    ///
    /// A gas price selects a legacy fee model; otherwise the EIP-1559 fee
    /// fields apply and default to zero.
    pub fn to_transaction(&self) -> Transaction {
        let access_list = self.access_list.clone().unwrap_or_default();

        let (transaction_type, max_fee_per_gas, max_priority_fee_per_gas) =
            if let Some(gas_price) = self.gas_price {
                let transaction_type = if access_list.0.is_empty() {
                    TransactionType::Legacy
                } else {
                    TransactionType::AccessList
                };
                (transaction_type, gas_price, gas_price)
            } else {
                let transaction_type =
                    if self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some() {
                        TransactionType::DynamicFee
                    } else if access_list.0.is_empty() {
                        TransactionType::Legacy
                    } else {
                        TransactionType::AccessList
                    };
                (
                    transaction_type,
                    self.max_fee_per_gas.unwrap_or_default(),
                    self.max_priority_fee_per_gas.unwrap_or_default(),
                )
            };

        Transaction {
            transaction_type,
            nonce: self.nonce.unwrap_or_default(),
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit: self.gas.unwrap_or(DEFAULT_CALL_GAS_LIMIT),
            to: self.to,
            value: self.value.unwrap_or_default(),
            input: self.data.clone().unwrap_or_default(),
            access_list,
            from: Some(self.from.unwrap_or_default()),
            ..Transaction::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use retrace_primitives::address;

    use super::*;
    use crate::AccessListItem;

    #[test]
    fn deserialize_rpc_call() -> anyhow::Result<()> {
        let call: Call = serde_json::from_str(
            r#"{
                "from": "0x52c9a11264dd7ab8dbc14a2bba6fd7bb1e2a9bd9",
                "to": "0x0715a7794a1dc8e42615f059dd6e406a6594651a",
                "gas": "0x5208",
                "gasPrice": "0x3b9aca00",
                "value": "0x1",
                "data": "0xdeadbeef"
            }"#,
        )?;

        assert_eq!(
            call.from,
            Some(address!("0x52c9a11264dd7ab8dbc14a2bba6fd7bb1e2a9bd9"))
        );
        assert_eq!(call.gas, Some(21_000));
        assert_eq!(call.gas_price, Some(1_000_000_000));
        assert_eq!(call.value, Some(U256::from(1)));
        assert_eq!(call.data, Some(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])));
        Ok(())
    }

    #[test]
    fn defaults() {
        let transaction = Call::default().to_transaction();

        assert_eq!(transaction.transaction_type, TransactionType::Legacy);
        assert_eq!(transaction.gas_limit, DEFAULT_CALL_GAS_LIMIT);
        assert_eq!(transaction.from, Some(Address::ZERO));
        assert!(transaction.is_create());
        assert_eq!(transaction.max_fee_per_gas, 0);
    }

    #[test]
    fn gas_price_selects_legacy_fees() {
        let call = Call {
            gas_price: Some(7),
            access_list: Some(AccessList(vec![AccessListItem {
                address: Address::ZERO,
                storage_keys: Vec::new(),
            }])),
            ..Call::default()
        };
        let transaction = call.to_transaction();

        assert_eq!(transaction.transaction_type, TransactionType::AccessList);
        assert_eq!(transaction.max_fee_per_gas, 7);
        assert_eq!(transaction.max_priority_fee_per_gas, 7);
    }

    #[test]
    fn fee_caps_select_dynamic_fees() {
        let call = Call {
            max_fee_per_gas: Some(2),
            ..Call::default()
        };
        let transaction = call.to_transaction();

        assert_eq!(transaction.transaction_type, TransactionType::DynamicFee);
        assert_eq!(transaction.max_fee_per_gas, 2);
        assert_eq!(transaction.max_priority_fee_per_gas, 0);
    }
}
