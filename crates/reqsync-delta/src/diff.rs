use std::collections::HashMap;

use tracing::debug;

use crate::error::{DeltaError, DeltaResult};
use crate::rolling::RollingHash;
use crate::script::DeltaScript;

/// Chunk size used by the object store when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 16;

/// Source offsets kept per chunk hash; later duplicates are not indexed.
const MAX_CANDIDATES: usize = 32;

/// Index of the source's fixed-size chunks by rolling hash.
struct ChunkIndex<'a> {
    source: &'a [u8],
    chunk_size: usize,
    chunks: HashMap<u64, Vec<usize>>,
    /// Offset of the final, shorter chunk when the source length is not a
    /// multiple of the chunk size.
    tail: Option<usize>,
}

impl<'a> ChunkIndex<'a> {
    fn build(source: &'a [u8], chunk_size: usize) -> Self {
        let mut chunks: HashMap<u64, Vec<usize>> = HashMap::new();
        let full = source.len() / chunk_size;
        for i in 0..full {
            let start = i * chunk_size;
            let hash = RollingHash::hash(&source[start..start + chunk_size]);
            let slots = chunks.entry(hash).or_default();
            if slots.len() < MAX_CANDIDATES {
                slots.push(start);
            }
        }
        let tail = (source.len() % chunk_size != 0).then_some(full * chunk_size);
        Self {
            source,
            chunk_size,
            chunks,
            tail,
        }
    }

    /// Longest verified match for the window at `target[pos..pos + chunk_size]`,
    /// extended forward as far as both sequences agree.
    ///
    /// Ties go to the lowest source offset. Stops early once a match runs to
    /// the end of the target.
    fn longest_match(&self, hash: u64, target: &[u8], pos: usize) -> Option<(usize, usize)> {
        let window = &target[pos..pos + self.chunk_size];
        let remaining = target.len() - pos;
        let mut best: Option<(usize, usize)> = None;
        for &start in self.chunks.get(&hash)? {
            if &self.source[start..start + self.chunk_size] != window {
                continue;
            }
            let len = self.chunk_size
                + common_prefix(
                    &self.source[start + self.chunk_size..],
                    &target[pos + self.chunk_size..],
                );
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((start, len));
            }
            if len == remaining {
                break;
            }
        }
        best
    }

    /// Match for the trailing partial chunk, tried once the remaining
    /// target is shorter than a full window.
    fn tail_match(&self, target: &[u8], pos: usize) -> Option<(usize, usize)> {
        let start = self.tail?;
        let chunk = &self.source[start..];
        target[pos..]
            .starts_with(chunk)
            .then_some((start, chunk.len()))
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Compute a script that turns `source` into `target`.
///
/// The source is split into chunks of `chunk_size` bytes (the last one may
/// be shorter) and indexed by content. A rolling window over the target looks
/// up each position in the index; verified hits are extended forward and
/// backward into pending literal bytes and emitted as copies. Everything
/// else becomes inserted literals.
pub fn diff(source: &[u8], target: &[u8], chunk_size: usize) -> DeltaResult<DeltaScript> {
    if chunk_size == 0 {
        return Err(DeltaError::InvalidChunkSize(chunk_size));
    }

    let index = ChunkIndex::build(source, chunk_size);
    let mut script = DeltaScript::new(source.len());
    let mut literal_start = 0;
    let mut pos = 0;
    let mut window: Option<RollingHash> = None;

    while pos < target.len() {
        let found = if pos + chunk_size <= target.len() {
            let rolling = window
                .get_or_insert_with(|| RollingHash::new(&target[pos..pos + chunk_size]));
            index.longest_match(rolling.value(), target, pos)
        } else {
            index.tail_match(target, pos)
        };

        match found {
            Some((mut offset, mut len)) => {
                // Pull the match backward over literal bytes that also agree.
                while pos > literal_start
                    && offset > 0
                    && source[offset - 1] == target[pos - 1]
                {
                    offset -= 1;
                    pos -= 1;
                    len += 1;
                }
                script.push_insert(&target[literal_start..pos]);
                script.push_copy(offset, len);
                pos += len;
                literal_start = pos;
                window = None;
            }
            None => {
                if let Some(rolling) = window.as_mut() {
                    if pos + chunk_size < target.len() {
                        rolling.roll(target[pos], target[pos + chunk_size]);
                    } else {
                        window = None;
                    }
                }
                pos += 1;
            }
        }
    }
    script.push_insert(&target[literal_start..]);

    debug!(
        source_len = source.len(),
        target_len = target.len(),
        ops = script.ops.len(),
        copied = script.copied_bytes(),
        inserted = script.inserted_bytes(),
        "computed delta"
    );
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::patch;
    use crate::script::DeltaOp;

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert_eq!(diff(b"a", b"b", 0), Err(DeltaError::InvalidChunkSize(0)));
    }

    #[test]
    fn identical_content_is_a_single_copy() {
        let text = b"Hello, this is a pretty long sentence about not much at all.";
        for chunk_size in [1, 5, 7, 10, 64] {
            let script = diff(text, text, chunk_size).unwrap();
            assert_eq!(
                script.ops,
                vec![DeltaOp::Copy {
                    offset: 0,
                    len: text.len()
                }],
                "chunk size {chunk_size}"
            );
            assert_eq!(patch(text, &script).unwrap(), text.to_vec());
        }
    }

    #[test]
    fn disjoint_content_is_a_single_insert() {
        let script = diff(b"xxxxxxxxxxyyyyyyyyyy", b"abc", 5).unwrap();
        assert_eq!(script.ops, vec![DeltaOp::Insert(b"abc".to_vec())]);
    }

    #[test]
    fn empty_inputs() {
        let script = diff(b"", b"", 5).unwrap();
        assert!(script.ops.is_empty());
        assert_eq!(patch(b"", &script).unwrap(), Vec::<u8>::new());

        let script = diff(b"", b"abc", 5).unwrap();
        assert_eq!(script.ops, vec![DeltaOp::Insert(b"abc".to_vec())]);

        let script = diff(b"abc", b"", 5).unwrap();
        assert!(script.ops.is_empty());
        assert_eq!(patch(b"abc", &script).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn chunk_larger_than_inputs() {
        let script = diff(b"xyz", b"xyz", 100).unwrap();
        assert_eq!(script.ops, vec![DeltaOp::Copy { offset: 0, len: 3 }]);

        let script = diff(b"abc", b"abd", 100).unwrap();
        assert_eq!(patch(b"abc", &script).unwrap(), b"abd".to_vec());
    }

    #[test]
    fn match_extends_backward_into_literal() {
        // "0123456789" is found at chunk offset 5 of the target window but
        // the preceding bytes also match the source.
        let source = b"abcde0123456789";
        let target = b"Zbcde0123456789";
        let script = diff(source, target, 5).unwrap();
        assert_eq!(
            script.ops,
            vec![
                DeltaOp::Insert(b"Z".to_vec()),
                DeltaOp::Copy { offset: 1, len: 14 },
            ]
        );
    }

    #[test]
    fn long_runs_of_one_byte_stay_linear() {
        let source = vec![b'a'; 1 << 16];
        let mut target = vec![b'a'; 1 << 15];
        target.push(b'b');
        target.extend(std::iter::repeat(b'a').take(1 << 15));

        let script = diff(&source, &target, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(
            script.ops,
            vec![
                DeltaOp::Copy {
                    offset: 0,
                    len: 1 << 15
                },
                DeltaOp::Insert(b"b".to_vec()),
                DeltaOp::Copy {
                    offset: 0,
                    len: 1 << 15
                },
            ]
        );
        assert_eq!(patch(&source, &script).unwrap(), target);
    }

    #[test]
    fn repeated_chunks_prefer_longest_run() {
        let source = b"aaaaabbbbbaaaaaccccc";
        let target = b"aaaaaccccc";
        let script = diff(source, target, 5).unwrap();
        assert_eq!(script.ops, vec![DeltaOp::Copy { offset: 10, len: 10 }]);
    }
}
