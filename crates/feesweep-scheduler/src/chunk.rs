//! Split candidate lists into batch-sized slices.

use feesweep_core::{Result, SweepError};

/// Lazily partition `items` into ordered slices of at most `size` elements.
///
/// The returned iterator is `Clone`, so the same partition can be walked again.
pub fn chunks<T>(items: &[T], size: usize) -> Result<std::slice::Chunks<'_, T>> {
    if size == 0 {
        return Err(SweepError::InvalidChunkSize(size));
    }
    Ok(items.chunks(size))
}

/// Number of chunks `len` items produce at `size` per chunk.
pub fn chunk_count(len: usize, size: usize) -> usize {
    if size == 0 { 0 } else { len.div_ceil(size) }
}
