use retrace_evm::{Message, Step, Tracer};
use retrace_primitives::{Address, B256, SpecId};
use retrace_transaction::{AccessList, AccessListItem};

use crate::opcodes::{OpcodeClass, OpcodeTable};

/// Records the accounts and storage slots a transaction touches.
///
/// The sender and recipient are never recorded through account or call
/// opcodes, as they are warm regardless of the access list.
#[derive(Debug)]
pub struct AccessListTracer {
    from: Address,
    to: Option<Address>,
    table: Option<OpcodeTable>,
    access_list: AccessList,
}

impl AccessListTracer {
    /// Constructs a tracer for a transaction from `from` to `to`.
    pub fn new(from: Address, to: Option<Address>) -> Self {
        Self {
            from,
            to,
            table: None,
            access_list: AccessList::default(),
        }
    }

    /// The accesses recorded so far, in order of first access.
    pub fn access_list(&self) -> &AccessList {
        &self.access_list
    }

    /// Consumes the tracer, returning the recorded accesses.
    pub fn into_access_list(self) -> AccessList {
        self.access_list
    }

    fn is_excluded(&self, address: &Address) -> bool {
        *address == self.from || Some(*address) == self.to
    }

    fn add_storage(&mut self, address: Address, key: B256) {
        log::trace!("access list storage {address} {key}");

        match self.access_list.0.iter_mut().find(|item| item.address == address) {
            Some(item) => {
                if !item.storage_keys.contains(&key) {
                    item.storage_keys.push(key);
                }
            }
            None => self.access_list.0.push(AccessListItem {
                address,
                storage_keys: vec![key],
            }),
        }
    }

    fn add_address(&mut self, address: Address) {
        if self.is_excluded(&address) {
            return;
        }

        if !self.access_list.0.iter().any(|item| item.address == address) {
            log::trace!("access list address {address}");
            self.access_list.0.push(AccessListItem {
                address,
                storage_keys: Vec::new(),
            });
        }
    }
}

impl Tracer for AccessListTracer {
    fn on_execution_start(&mut self, revision: SpecId, _message: &Message) {
        if self.table.as_ref().map(OpcodeTable::revision) != Some(revision) {
            self.table = Some(OpcodeTable::new(revision));
        }
    }

    fn on_instruction_start(&mut self, step: &Step<'_>) {
        let Some(table) = &self.table else {
            return;
        };

        match table.classify(step.opcode) {
            OpcodeClass::Storage => {
                if let Some(key) = step.peek(0) {
                    self.add_storage(step.recipient, B256::from(*key));
                }
            }
            OpcodeClass::Contract => {
                if let Some(word) = step.peek(0) {
                    self.add_address(Address::from_word(B256::from(*word)));
                }
            }
            OpcodeClass::Call => {
                if step.stack.len() >= 5 {
                    if let Some(word) = step.peek(1) {
                        self.add_address(Address::from_word(B256::from(*word)));
                    }
                }
            }
            OpcodeClass::Other => {}
        }
    }

    fn reset(&mut self) {
        self.access_list = AccessList::default();
    }
}

/// Whether two access lists name the same accounts and keys, regardless of
/// order.
pub fn compare(first: &AccessList, second: &AccessList) -> bool {
    if first.0.len() != second.0.len() {
        return false;
    }

    first.0.iter().all(|item| {
        second
            .0
            .iter()
            .find(|other| other.address == item.address)
            .is_some_and(|other| {
                other.storage_keys.len() == item.storage_keys.len()
                    && item
                        .storage_keys
                        .iter()
                        .all(|key| other.storage_keys.contains(key))
            })
    })
}
