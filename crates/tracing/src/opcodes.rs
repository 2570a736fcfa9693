//! Classification of opcodes by the accounts and slots they touch.

use retrace_primitives::SpecId;
use revm::bytecode::opcode;

/// What an opcode accesses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpcodeClass {
    /// Reads or writes a storage slot of the executing account
    Storage,
    /// Inspects the account whose address is on top of the stack
    Contract,
    /// Calls the account whose address is the second stack item
    Call,
    /// Anything else
    #[default]
    Other,
}

const STORAGE: &[(u8, SpecId)] = &[
    (opcode::SLOAD, SpecId::FRONTIER),
    (opcode::SSTORE, SpecId::FRONTIER),
];

const CONTRACT: &[(u8, SpecId)] = &[
    (opcode::BALANCE, SpecId::FRONTIER),
    (opcode::EXTCODESIZE, SpecId::FRONTIER),
    (opcode::EXTCODECOPY, SpecId::FRONTIER),
    (opcode::SELFDESTRUCT, SpecId::FRONTIER),
    (opcode::EXTCODEHASH, SpecId::CONSTANTINOPLE),
];

const CALL: &[(u8, SpecId)] = &[
    (opcode::CALL, SpecId::FRONTIER),
    (opcode::CALLCODE, SpecId::FRONTIER),
    (opcode::DELEGATECALL, SpecId::HOMESTEAD),
    (opcode::STATICCALL, SpecId::BYZANTIUM),
];

/// Opcode classes of a revision. Opcodes that aren't active yet are
/// [`OpcodeClass::Other`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpcodeTable {
    revision: SpecId,
    classes: [OpcodeClass; 256],
}

impl OpcodeTable {
    /// Builds the table of `revision`.
    pub fn new(revision: SpecId) -> Self {
        let mut classes = [OpcodeClass::Other; 256];

        for (opcodes, class) in [
            (STORAGE, OpcodeClass::Storage),
            (CONTRACT, OpcodeClass::Contract),
            (CALL, OpcodeClass::Call),
        ] {
            for &(code, activation) in opcodes {
                if revision.is_enabled_in(activation) {
                    if let Some(entry) = classes.get_mut(usize::from(code)) {
                        *entry = class;
                    }
                }
            }
        }

        Self { revision, classes }
    }

    /// Revision the table was built for.
    pub fn revision(&self) -> SpecId {
        self.revision
    }

    /// Class of `code`.
    pub fn classify(&self, code: u8) -> OpcodeClass {
        self.classes
            .get(usize::from(code))
            .copied()
            .unwrap_or_default()
    }
}
