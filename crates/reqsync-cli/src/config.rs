use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use reqsync_store::StoreOptions;

/// Settings read from `reqsync.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local object store, version-control metadata, and document records.
    pub data_dir: PathBuf,
    /// Directory shared between replicas, acting as the remote.
    pub remote_dir: PathBuf,
    pub author: String,
    pub store: StoreOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".reqsync"),
            remote_dir: PathBuf::from(".reqsync-remote"),
            author: "anonymous".into(),
            store: StoreOptions::default(),
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config
            .store
            .validate()
            .with_context(|| format!("invalid [store] in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("reqsync.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqsync.toml");
        std::fs::write(
            &path,
            "author = \"jane\"\n\n[store]\ncompression = false\nmax_delta_chain = 4\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.author, "jane");
        assert!(!config.store.compression);
        assert_eq!(config.store.max_delta_chain, 4);
        assert_eq!(config.store.compression_level, 3);
        assert_eq!(config.data_dir, PathBuf::from(".reqsync"));
    }

    #[test]
    fn zero_delta_chunk_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqsync.toml");
        std::fs::write(&path, "[store]\ndelta_chunk_size = 0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("delta_chunk_size"));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqsync.toml");
        std::fs::write(&path, "author = [").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
