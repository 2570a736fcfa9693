//! Chain data captured from public networks.

use retrace_primitives::{Address, B256, address, b256};

/// RLP of Goerli header 4,000,000.
pub const HEADER_4000000_RLP: &str = concat!(
    "f9025ca0209f062567c161c5f71b3f57a7de277b0e95c3455050b152d785ad7524ef8ee7a01dcc4d",
    "e8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d493479400000000000000000000",
    "00000000000000000000a0e7536c5b61ed0e0ab7f3ce7f085806d40f716689c0c086676757de401b",
    "595658a040be247314d834a319556d1dcf458e8707cc1aa4a416b6118474ce0c96fccb1aa07862fe",
    "11d10a9b237ffe9cb660f31e4bc4be66836c9bfc17310d47c60d75671fb901000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000000000000000000000000",
    "000000000000000001833d0900837a1200831e784b845fe880abb861d88301091a84676574688867",
    "6f312e31352e36856c696e757800000000000000be009d0049d6f0ee8ca6764a1d3eb519bd4d046e",
    "167ddcab467d5db31d063f2d58f266fa86c4502aa169d17762090e92b821843de69b41adbb5d86f5",
    "d114ba7f01a000000000000000000000000000000000000000000000000000000000000000008800",
    "00000000000000",
);

/// Hash of Goerli header 4,000,000.
pub const BLOCK_HASH_4000000: B256 =
    b256!("0x439816753229fc0736bf86a5048de4bc9fcdede8c91dadf88c828c76b2281dff");

/// Stored body of a block with three transactions starting at id `0x69e45a`.
pub const BODY_RLP: &str = "c68369e45a03c0";

/// A signed Goerli legacy transaction.
pub const GOERLI_TRANSACTION_RLP: &str = concat!(
    "f8ac8301942e8477359400834c4b40945f62669ba0c6cf41cc162d8157ed71a0b9d6dbaf80b844f2",
    "f0387700000000000000000000000000000000000000000000000000000000000158b09f0270fc88",
    "9c577c1c64db7c819f921d1b6e8c7e5d3f2ff34f162cf4b324cc052ea0d5494ad16e2233197daa9d",
    "54cbbcb1ee534cf9f675fa587c264a4ce01e7d3d23a01421bcf57f4b39eb84a35042dc4675ae167f",
    "3e2f50e808252afa23e62e692355",
);

/// Hash of [`GOERLI_TRANSACTION_RLP`].
pub const GOERLI_TRANSACTION_HASH: B256 =
    b256!("0x3ff7b8917f1941784c709d6e54db18500fddc2b4c1a90b5cdec675cd0f9fc042");

/// Sender recovered from [`GOERLI_TRANSACTION_RLP`].
pub const GOERLI_TRANSACTION_SENDER: Address =
    address!("0xa2b827acf6073f5d9e2350cbf0646ba2535a5b0c");

/// Mainnet configuration as stored in the `Config` table.
pub const MAINNET_CHAIN_CONFIG: &str = r#"{"berlinBlock":12244000,"byzantiumBlock":4370000,"chainId":1,"constantinopleBlock":7280000,"daoForkBlock":1920000,"eip150Block":2463000,"eip155Block":2675000,"ethash":{},"homesteadBlock":1150000,"istanbulBlock":9069000,"londonBlock":12965000,"muirGlacierBlock":9200000,"petersburgBlock":7280000}"#;

/// Configuration of a development chain with every fork up to Cancun active
/// from genesis.
pub const DEV_CHAIN_CONFIG: &str = r#"{"chainId":1337,"homesteadBlock":0,"eip150Block":0,"eip155Block":0,"byzantiumBlock":0,"constantinopleBlock":0,"petersburgBlock":0,"istanbulBlock":0,"berlinBlock":0,"londonBlock":0,"terminalTotalDifficulty":0,"shanghaiTime":0,"cancunTime":0}"#;

/// Decodes a hex fixture.
pub fn decode_hex(fixture: &str) -> Vec<u8> {
    hex::decode(fixture).unwrap_or_else(|error| panic!("invalid hex fixture: {error}"))
}
