use serde::{Deserialize, Serialize};

use crate::error::{DeltaError, DeltaResult};

/// One step of a delta script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaOp {
    /// Copy `len` bytes starting at `offset` in the source.
    Copy { offset: usize, len: usize },
    /// Append literal bytes.
    Insert(Vec<u8>),
}

impl DeltaOp {
    /// Number of target bytes this op produces.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Copy { len, .. } => *len,
            Self::Insert(bytes) => bytes.len(),
        }
    }
}

/// Ordered edit script transforming a source sequence into a target.
///
/// The script records both lengths so that applying it to the wrong base
/// fails instead of producing garbage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaScript {
    pub source_len: usize,
    pub target_len: usize,
    pub ops: Vec<DeltaOp>,
}

impl DeltaScript {
    pub fn new(source_len: usize) -> Self {
        Self {
            source_len,
            target_len: 0,
            ops: Vec::new(),
        }
    }

    /// Append a copy, merging it into a preceding contiguous copy.
    pub fn push_copy(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.target_len += len;
        if let Some(DeltaOp::Copy {
            offset: prev_offset,
            len: prev_len,
        }) = self.ops.last_mut()
        {
            if *prev_offset + *prev_len == offset {
                *prev_len += len;
                return;
            }
        }
        self.ops.push(DeltaOp::Copy { offset, len });
    }

    /// Append literal bytes, merging them into a preceding insert.
    pub fn push_insert(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.target_len += bytes.len();
        if let Some(DeltaOp::Insert(prev)) = self.ops.last_mut() {
            prev.extend_from_slice(bytes);
            return;
        }
        self.ops.push(DeltaOp::Insert(bytes.to_vec()));
    }

    /// Total bytes taken from the source.
    pub fn copied_bytes(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DeltaOp::Copy { len, .. } => Some(*len),
                DeltaOp::Insert(_) => None,
            })
            .sum()
    }

    /// Total literal bytes carried by the script.
    pub fn inserted_bytes(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DeltaOp::Insert(bytes) => Some(bytes.len()),
                DeltaOp::Copy { .. } => None,
            })
            .sum()
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> DeltaResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DeltaError::Encoding(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> DeltaResult<Self> {
        bincode::deserialize(data).map_err(|e| DeltaError::Encoding(e.to_string()))
    }
}
