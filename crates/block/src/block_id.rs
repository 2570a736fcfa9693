use core::{fmt, str::FromStr};

use retrace_primitives::B256;

/// Symbolic block identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    /// Genesis block
    Earliest,
    /// Most recent executed block
    Latest,
    /// Block being built; served as the latest block
    Pending,
}

/// Identifies a block by number, hash or tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockNumberOrHash {
    /// Block number
    Number(u64),
    /// Block hash
    Hash(B256),
    /// Symbolic identifier
    Tag(BlockTag),
}

impl BlockNumberOrHash {
    /// Returns the latest block identifier.
    pub const fn latest() -> Self {
        Self::Tag(BlockTag::Latest)
    }
}

impl Default for BlockNumberOrHash {
    fn default() -> Self {
        Self::latest()
    }
}

impl From<u64> for BlockNumberOrHash {
    fn from(number: u64) -> Self {
        Self::Number(number)
    }
}

impl From<B256> for BlockNumberOrHash {
    fn from(hash: B256) -> Self {
        Self::Hash(hash)
    }
}

/// Error for block identifiers that are neither a tag, a quantity nor a hash.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid block identifier: `{0}`")]
pub struct ParseBlockIdError(String);

impl FromStr for BlockNumberOrHash {
    type Err = ParseBlockIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => return Ok(Self::Tag(BlockTag::Earliest)),
            "latest" => return Ok(Self::Tag(BlockTag::Latest)),
            "pending" => return Ok(Self::Tag(BlockTag::Pending)),
            _ => {}
        }

        let error = || ParseBlockIdError(s.to_owned());
        match s.strip_prefix("0x") {
            Some(digits) if digits.len() == 64 => {
                B256::from_str(s).map(Self::Hash).map_err(|_error| error())
            }
            Some(digits) => u64::from_str_radix(digits, 16)
                .map(Self::Number)
                .map_err(|_error| error()),
            None => s.parse().map(Self::Number).map_err(|_error| error()),
        }
    }
}

impl fmt::Display for BlockNumberOrHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number:#x}"),
            Self::Hash(hash) => write!(f, "{hash}"),
            Self::Tag(BlockTag::Earliest) => f.write_str("earliest"),
            Self::Tag(BlockTag::Latest) => f.write_str("latest"),
            Self::Tag(BlockTag::Pending) => f.write_str("pending"),
        }
    }
}

impl serde::Serialize for BlockNumberOrHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for BlockNumberOrHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(number) => Ok(Self::Number(number)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_identifiers() -> anyhow::Result<()> {
        assert_eq!("latest".parse::<BlockNumberOrHash>()?, BlockNumberOrHash::latest());
        assert_eq!(
            "earliest".parse::<BlockNumberOrHash>()?,
            BlockNumberOrHash::Tag(BlockTag::Earliest)
        );
        assert_eq!("0x3d0900".parse::<BlockNumberOrHash>()?, BlockNumberOrHash::Number(4_000_000));
        assert_eq!("4000000".parse::<BlockNumberOrHash>()?, BlockNumberOrHash::Number(4_000_000));

        let hash = "0x439816753229fc0736bf86a5048de4bc9fcdede8c91dadf88c828c76b2281dff";
        assert_eq!(
            hash.parse::<BlockNumberOrHash>()?,
            BlockNumberOrHash::Hash(B256::from_str(hash)?)
        );
        Ok(())
    }

    #[test]
    fn reject_garbage() {
        assert!("0xzz".parse::<BlockNumberOrHash>().is_err());
        assert!("safe-ish".parse::<BlockNumberOrHash>().is_err());
    }

    #[test]
    fn serde_round_trip() -> anyhow::Result<()> {
        let id: BlockNumberOrHash = serde_json::from_str("\"0x10\"")?;
        assert_eq!(id, BlockNumberOrHash::Number(16));
        assert_eq!(serde_json::to_string(&id)?, "\"0x10\"");

        let id: BlockNumberOrHash = serde_json::from_str("17")?;
        assert_eq!(id, BlockNumberOrHash::Number(17));
        Ok(())
    }
}
