//! Configuration of the trace engine.

use std::path::Path;

use anyhow::Context as _;
use retrace_primitives::ONE_ETHER;

/// Tunables of [`crate::TraceRpcApi`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of blocks kept in the block cache
    pub block_cache_capacity: usize,
    /// Maximum number of plain-state values cached for the head block
    pub state_cache_capacity: usize,
    /// Maximum fee, in wei, of a transaction submitted to
    /// `trace_rawTransaction`
    pub raw_transaction_fee_cap: u128,
    /// Maximum number of blocks a `trace_filter` request may span
    pub trace_filter_block_range: u64,
}

impl Config {
    /// Loads a configuration from a TOML file. Missing keys take their
    /// default values.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        log::debug!("trace config: {config:?}");

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_cache_capacity: 1024,
            state_cache_capacity: 1_000_000,
            raw_transaction_fee_cap: ONE_ETHER,
            trace_filter_block_range: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "block_cache_capacity = 16")?;
        writeln!(file, "trace_filter_block_range = 100")?;

        let config = Config::load(file.path())?;
        assert_eq!(
            config,
            Config {
                block_cache_capacity: 16,
                trace_filter_block_range: 100,
                ..Config::default()
            }
        );
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() -> anyhow::Result<()> {
        let directory = tempfile::tempdir()?;
        let result = Config::load(directory.path().join("absent.toml"));

        let error = result.err().map(|error| error.to_string());
        assert!(error.is_some_and(|message| message.starts_with("failed to read config file")));
        Ok(())
    }

    #[test]
    fn unknown_values_are_rejected() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "block_cache_capacity = \"many\"")?;

        assert!(Config::load(file.path()).is_err());
        Ok(())
    }
}
