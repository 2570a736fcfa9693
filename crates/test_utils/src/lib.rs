//! Fixtures and in-memory chains for testing the trace engine.
#![warn(missing_docs)]

pub mod cbor;
mod chain;
pub mod fixtures;
pub mod signer;

pub use self::chain::MemoryChain;
