use std::collections::BTreeMap;

use retrace_evm::{Message, Tracer};
use retrace_primitives::{Address, B256, Bytes, KECCAK_EMPTY, SpecId, U256};
use retrace_state_api::{AccountInfo, EvmState, StateError};
use revm::state::Account;
use revm_database_interface::DatabaseRef;

/// Change of a value over a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delta<T> {
    /// The value didn't change
    Unchanged,
    /// The value came into existence
    Born(T),
    /// The value ceased to exist
    Died(T),
    /// The value changed
    Changed {
        /// Value before the transaction
        from: T,
        /// Value after the transaction
        to: T,
    },
}

impl<T: PartialEq> Delta<T> {
    fn compare(from: T, to: T) -> Self {
        if from == to {
            Self::Unchanged
        } else {
            Self::Changed { from, to }
        }
    }

    /// Whether the value didn't change.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

impl<T: serde::Serialize> serde::Serialize for Delta<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap as _;

        #[derive(serde::Serialize)]
        struct Changed<'a, T> {
            from: &'a T,
            to: &'a T,
        }

        match self {
            Self::Unchanged => serializer.serialize_str("="),
            Self::Born(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("+", value)?;
                map.end()
            }
            Self::Died(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("-", value)?;
                map.end()
            }
            Self::Changed { from, to } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("*", &Changed { from, to })?;
                map.end()
            }
        }
    }
}

/// Changes of one account.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct AccountDiff {
    /// Balance
    pub balance: Delta<U256>,
    /// Nonce
    pub nonce: Delta<U256>,
    /// Code
    pub code: Delta<Bytes>,
    /// Changed storage slots
    pub storage: BTreeMap<B256, Delta<B256>>,
}

impl AccountDiff {
    fn is_unchanged(&self) -> bool {
        self.balance.is_unchanged()
            && self.nonce.is_unchanged()
            && self.code.is_unchanged()
            && self.storage.is_empty()
    }
}

/// Changes of every account a transaction modified.
pub type StateDiff = BTreeMap<Address, AccountDiff>;

/// Compares the state after a transaction with the state before it.
#[derive(Debug, Default)]
pub struct StateDiffTracer {
    revision: Option<SpecId>,
    diff: StateDiff,
}

impl StateDiffTracer {
    /// The changes recorded so far.
    pub fn state_diff(&self) -> &StateDiff {
        &self.diff
    }

    /// Takes the recorded changes, leaving the tracer empty.
    pub fn take_state_diff(&mut self) -> StateDiff {
        std::mem::take(&mut self.diff)
    }

    fn account_diff(
        &self,
        address: Address,
        account: &Account,
        pre_state: &dyn DatabaseRef<Error = StateError>,
    ) -> Result<Option<AccountDiff>, StateError> {
        let before = pre_state
            .basic_ref(address)?
            .filter(|info| !info.is_empty());

        let removes_empty = self
            .revision
            .is_none_or(|revision| revision.is_enabled_in(SpecId::SPURIOUS_DRAGON));
        let alive = !account.is_selfdestructed() && !(removes_empty && account.info.is_empty());

        let diff = match (before, alive) {
            (None, false) => return Ok(None),
            (None, true) => AccountDiff {
                balance: Delta::Born(account.info.balance),
                nonce: Delta::Born(U256::from(account.info.nonce)),
                code: Delta::Born(code(&account.info, pre_state)?),
                storage: account
                    .storage
                    .iter()
                    .filter(|(_, slot)| !slot.present_value.is_zero())
                    .map(|(key, slot)| {
                        (B256::from(*key), Delta::Born(B256::from(slot.present_value)))
                    })
                    .collect(),
            },
            (Some(before), false) => AccountDiff {
                balance: Delta::Died(before.balance),
                nonce: Delta::Died(U256::from(before.nonce)),
                code: Delta::Died(code(&before, pre_state)?),
                storage: account
                    .storage
                    .iter()
                    .filter(|(_, slot)| !slot.original_value.is_zero())
                    .map(|(key, slot)| {
                        (B256::from(*key), Delta::Died(B256::from(slot.original_value)))
                    })
                    .collect(),
            },
            (Some(before), true) => {
                let code = if before.code_hash == account.info.code_hash {
                    Delta::Unchanged
                } else {
                    Delta::compare(code(&before, pre_state)?, code(&account.info, pre_state)?)
                };

                AccountDiff {
                    balance: Delta::compare(before.balance, account.info.balance),
                    nonce: Delta::compare(
                        U256::from(before.nonce),
                        U256::from(account.info.nonce),
                    ),
                    code,
                    storage: account
                        .storage
                        .iter()
                        .filter(|(_, slot)| slot.is_changed())
                        .map(|(key, slot)| {
                            (
                                B256::from(*key),
                                Delta::Changed {
                                    from: B256::from(slot.original_value),
                                    to: B256::from(slot.present_value),
                                },
                            )
                        })
                        .collect(),
                }
            }
        };

        Ok(Some(diff).filter(|diff| !diff.is_unchanged()))
    }
}

fn code(
    info: &AccountInfo,
    pre_state: &dyn DatabaseRef<Error = StateError>,
) -> Result<Bytes, StateError> {
    if let Some(code) = &info.code {
        return Ok(code.original_bytes());
    }

    if info.code_hash == KECCAK_EMPTY || info.code_hash == B256::ZERO {
        return Ok(Bytes::new());
    }

    Ok(pre_state.code_by_hash_ref(info.code_hash)?.original_bytes())
}

impl Tracer for StateDiffTracer {
    fn on_execution_start(&mut self, revision: SpecId, _message: &Message) {
        self.revision = Some(revision);
    }

    fn on_transaction_end(
        &mut self,
        post_state: &EvmState,
        pre_state: &dyn DatabaseRef<Error = StateError>,
    ) -> Result<(), StateError> {
        for (address, account) in post_state {
            if !account.is_touched() {
                continue;
            }

            if let Some(diff) = self.account_diff(*address, account, pre_state)? {
                self.diff.insert(*address, diff);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.diff.clear();
        self.revision = None;
    }
}
