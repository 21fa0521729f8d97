use crate::error::{DeltaError, DeltaResult};
use crate::script::{DeltaOp, DeltaScript};

/// Replay `script` against `source` and return the reconstructed target.
///
/// Fails when the source length differs from the one the script was
/// computed against, when a copy reaches outside the source, or when the
/// output length disagrees with the script header.
pub fn patch(source: &[u8], script: &DeltaScript) -> DeltaResult<Vec<u8>> {
    if source.len() != script.source_len {
        return Err(DeltaError::SourceLengthMismatch {
            expected: script.source_len,
            actual: source.len(),
        });
    }

    // Size the output from the ops, never from the header.
    let mut produced: usize = 0;
    for op in &script.ops {
        if let DeltaOp::Copy { offset, len } = op {
            if offset.checked_add(*len).map_or(true, |end| end > source.len()) {
                return Err(DeltaError::CopyOutOfBounds {
                    offset: *offset,
                    len: *len,
                    source_len: source.len(),
                });
            }
        }
        produced = produced.saturating_add(op.output_len());
    }
    if produced != script.target_len || produced == usize::MAX {
        return Err(DeltaError::TargetLengthMismatch {
            expected: script.target_len,
            actual: produced,
        });
    }

    let mut out = Vec::new();
    out.try_reserve_exact(produced)
        .map_err(|_| DeltaError::OutputTooLarge(produced))?;
    for op in &script.ops {
        match op {
            DeltaOp::Copy { offset, len } => out.extend_from_slice(&source[*offset..*offset + *len]),
            DeltaOp::Insert(bytes) => out.extend_from_slice(bytes),
        }
    }
    Ok(out)
}
