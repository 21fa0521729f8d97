use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Tuning knobs for the object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Compress object payloads with zstd when that makes them smaller.
    pub compression: bool,
    /// zstd level used when compressing.
    pub compression_level: i32,
    /// Longest chain of deltas a blob may sit on.
    pub max_delta_chain: usize,
    /// Chunk size handed to the delta codec.
    pub delta_chunk_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compression: true,
            compression_level: 3,
            max_delta_chain: 16,
            delta_chunk_size: reqsync_delta::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StoreOptions {
    /// Reject settings every delta write would fail on.
    pub fn validate(&self) -> StoreResult<()> {
        if self.delta_chunk_size == 0 {
            return Err(StoreError::InvalidOptions(
                "delta_chunk_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StoreOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let options = StoreOptions {
            delta_chunk_size: 0,
            ..StoreOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(StoreError::InvalidOptions(_))
        ));
    }
}
