use serde::{Deserialize, Serialize};

use reqsync_delta::DeltaScript;
use reqsync_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// Kind tag written as the first byte of every stored frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Full blob content.
    Blob,
    /// Blob content expressed as a delta against another blob.
    Delta,
    /// Serialized commit record.
    Commit,
}

impl ObjectKind {
    fn tag(self) -> u8 {
        match self {
            Self::Blob => 1,
            Self::Delta => 2,
            Self::Commit => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Blob),
            2 => Some(Self::Delta),
            3 => Some(Self::Commit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Delta => write!(f, "delta"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

const FLAG_ZSTD: u8 = 0b0000_0001;

/// A decoded frame: kind tag plus uncompressed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Frame as `[kind][flags][payload]`, compressing when it pays off.
    pub fn encode(&self, compress: Option<i32>) -> StoreResult<Vec<u8>> {
        let mut flags = 0;
        let mut payload = None;
        if let Some(level) = compress {
            let compressed = zstd::encode_all(self.data.as_slice(), level)?;
            if compressed.len() < self.data.len() {
                flags |= FLAG_ZSTD;
                payload = Some(compressed);
            }
        }
        let payload = payload.as_deref().unwrap_or(&self.data);
        let mut out = Vec::with_capacity(payload.len() + 2);
        out.push(self.kind.tag());
        out.push(flags);
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Parse a frame read from `key`.
    pub fn decode(key: &str, frame: &[u8]) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::CorruptObject {
            key: key.to_string(),
            reason,
        };
        let [tag, flags, payload @ ..] = frame else {
            return Err(corrupt(format!("frame too short ({} bytes)", frame.len())));
        };
        let kind =
            ObjectKind::from_tag(*tag).ok_or_else(|| corrupt(format!("unknown kind tag {tag}")))?;
        if flags & !FLAG_ZSTD != 0 {
            return Err(corrupt(format!("unknown flags {flags:#04x}")));
        }
        let data = if flags & FLAG_ZSTD != 0 {
            zstd::decode_all(payload).map_err(|e| corrupt(format!("zstd: {e}")))?
        } else {
            payload.to_vec()
        };
        Ok(Self { kind, data })
    }

    /// Require a specific kind.
    pub fn expect_kind(self, key: &str, kind: ObjectKind) -> StoreResult<Self> {
        if self.kind != kind {
            return Err(StoreError::CorruptObject {
                key: key.to_string(),
                reason: format!("expected {kind}, got {}", self.kind),
            });
        }
        Ok(self)
    }
}

/// Payload of a [`ObjectKind::Delta`] frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaObject {
    pub base: ContentHash,
    pub script: DeltaScript,
}

impl DeltaObject {
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn from_bytes(key: &str, data: &[u8]) -> StoreResult<Self> {
        bincode::deserialize(data).map_err(|e| StoreError::CorruptObject {
            key: key.to_string(),
            reason: format!("bad delta payload: {e}"),
        })
    }
}
