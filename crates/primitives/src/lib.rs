//! Primitive types shared across the trace engine.

pub use revm_bytecode::Bytecode;
pub use revm_primitives::{
    Address, B256, Bytes, HashMap, HashSet, KECCAK_EMPTY, Log, LogData, TxKind, U256, address,
    b256, bytes, hardfork::SpecId, hash_map, hex, keccak256,
};

/// One ether, in wei.
pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

/// Hash of the RLP encoding of an empty list, used for blocks without ommers.
pub const EMPTY_OMMER_ROOT_HASH: B256 =
    b256!("0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");
