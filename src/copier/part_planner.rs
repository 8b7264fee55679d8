use anyhow::{Context, Result, anyhow};

use crate::types::error::S3CopierError;

/// Upper bound of parts in one S3 multipart upload.
pub const MAX_PARTS_COUNT: u64 = 10_000;

/// One byte range of a multipart copy. `end_byte` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartDescriptor {
    pub part_number: i32,
    pub start_byte: u64,
    pub end_byte: u64,
}

impl PartDescriptor {
    /// Value of the `x-amz-copy-source-range` header for this part.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start_byte, self.end_byte)
    }

    pub fn size(&self) -> u64 {
        self.end_byte - self.start_byte + 1
    }
}

/// Splits `object_size` bytes into contiguous parts of `part_size` bytes.
///
/// Part numbers start at 1. The last part holds the remainder. An empty object yields no parts.
/// A plan needing more than [`MAX_PARTS_COUNT`] parts is rejected with [`S3CopierError::TooManyParts`].
pub fn plan_parts(object_size: u64, part_size: u64) -> Result<Vec<PartDescriptor>> {
    if part_size == 0 {
        return Err(anyhow!("part size must be greater than zero."));
    }

    let parts_count = calculate_parts_count(object_size, part_size);
    if MAX_PARTS_COUNT < parts_count {
        return Err(anyhow!(S3CopierError::TooManyParts {
            object_size,
            part_size,
            parts_count,
            max_parts_count: MAX_PARTS_COUNT,
        }));
    }
    let parts_count = i32::try_from(parts_count).context("parts count exceeds i32.")?;
    let mut parts = Vec::with_capacity(parts_count as usize);

    let mut start_byte = 0;
    for part_number in 1..=parts_count {
        let end_byte = (start_byte + part_size).min(object_size) - 1;
        parts.push(PartDescriptor {
            part_number,
            start_byte,
            end_byte,
        });
        start_byte = end_byte + 1;
    }

    Ok(parts)
}

pub fn calculate_parts_count(object_size: u64, part_size: u64) -> u64 {
    object_size.div_ceil(part_size)
}
