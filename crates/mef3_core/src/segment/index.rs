//! Time-series index (`.tidx`) records and file encoding.
//!
//! Each record is 56 bytes, little-endian:
//!
//! ```text
//! ┌─────────────┬────────────┬──────────────┬─────────┬────────────┐
//! │ file_offset │ start_time │ start_sample │ samples │ block_bytes│
//! │   8 bytes   │  8 bytes   │   8 bytes    │ 4 bytes │  4 bytes   │
//! ├─────────────┼────────────┼──────────────┼─────────┴────────────┤
//! │ max (4)     │ min (4)    │ pad (4)      │ flags (1) protected  │
//! │             │            │              │ (3) discretionary (8)│
//! └─────────────┴────────────┴──────────────┴──────────────────────┘
//! ```

use super::plan::BlockPlan;
use crate::codec::{BlockFlags, CompressedBlock};
use crate::crc::compute_crc32;
use crate::error::{CoreError, CoreResult};
use crate::header::{FileType, UniversalHeader, UNIVERSAL_HEADER_BYTES};

/// Size of one encoded index record.
pub const INDEX_RECORD_BYTES: usize = 56;

/// Location and summary of one compressed block in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset of the block within the data file.
    pub file_offset: i64,
    /// Time of the block's first sample (µUTC).
    pub start_time: i64,
    /// Index of the block's first sample within the segment.
    pub start_sample: i64,
    /// Samples in the block.
    pub number_of_samples: u32,
    /// Compressed size of the block, header included.
    pub block_bytes: u32,
    /// Largest sample value in the block.
    pub max_sample_value: i32,
    /// Smallest sample value in the block.
    pub min_sample_value: i32,
    /// Block flags copied from the block header.
    pub flags: BlockFlags,
}

impl IndexRecord {
    /// Byte offset one past the end of the block.
    #[must_use]
    pub fn end_offset(&self) -> i64 {
        self.file_offset + i64::from(self.block_bytes)
    }

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> [u8; INDEX_RECORD_BYTES] {
        let mut buf = [0u8; INDEX_RECORD_BYTES];
        buf[0..8].copy_from_slice(&self.file_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.start_time.to_le_bytes());
        buf[16..24].copy_from_slice(&self.start_sample.to_le_bytes());
        buf[24..28].copy_from_slice(&self.number_of_samples.to_le_bytes());
        buf[28..32].copy_from_slice(&self.block_bytes.to_le_bytes());
        buf[32..36].copy_from_slice(&self.max_sample_value.to_le_bytes());
        buf[36..40].copy_from_slice(&self.min_sample_value.to_le_bytes());
        // 40..44 pad
        buf[44] = self.flags.as_byte();
        // 45..48 protected, 48..56 discretionary
        buf
    }

    /// Decodes one record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if `data` is shorter than a record.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < INDEX_RECORD_BYTES {
            return Err(CoreError::invalid_format(format!(
                "index record needs {INDEX_RECORD_BYTES} bytes, got {}",
                data.len()
            )));
        }
        let i64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&data[at..at + 8]);
            i64::from_le_bytes(b)
        };
        let u32_at = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[at..at + 4]);
            u32::from_le_bytes(b)
        };
        Ok(Self {
            file_offset: i64_at(0),
            start_time: i64_at(8),
            start_sample: i64_at(16),
            number_of_samples: u32_at(24),
            block_bytes: u32_at(28),
            max_sample_value: u32_at(32) as i32,
            min_sample_value: u32_at(36) as i32,
            flags: BlockFlags::from_byte(data[44]),
        })
    }
}

/// Accumulates index records while blocks are appended to the data file.
#[derive(Debug)]
pub struct IndexBuilder {
    next_offset: i64,
    records: Vec<IndexRecord>,
}

impl IndexBuilder {
    /// Creates a builder whose first block lands at `first_offset`.
    #[must_use]
    pub fn new(first_offset: i64) -> Self {
        Self {
            next_offset: first_offset,
            records: Vec::new(),
        }
    }

    /// Offset at which the next block will be written.
    #[must_use]
    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }

    /// Records written so far.
    #[must_use]
    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    /// Appends the record for `block`, placed at the current offset.
    ///
    /// # Errors
    ///
    /// Returns `Logic` if the block does not hold the planned sample count
    /// or its header disagrees with its byte length.
    pub fn push(&mut self, plan: &BlockPlan, block: &CompressedBlock) -> CoreResult<&IndexRecord> {
        let header = &block.header;
        if header.number_of_samples != plan.sample_count {
            return Err(CoreError::logic(format!(
                "block at sample {} holds {} samples, planned {}",
                plan.start_sample, header.number_of_samples, plan.sample_count
            )));
        }
        if header.block_bytes as usize != block.bytes.len() {
            return Err(CoreError::logic(format!(
                "block at sample {} reports {} bytes but is {} bytes long",
                plan.start_sample,
                header.block_bytes,
                block.bytes.len()
            )));
        }

        let record = IndexRecord {
            file_offset: self.next_offset,
            start_time: plan.start_time,
            start_sample: plan.start_sample,
            number_of_samples: header.number_of_samples,
            block_bytes: header.block_bytes,
            max_sample_value: header.max_sample,
            min_sample_value: header.min_sample,
            flags: header.flags,
        };
        self.next_offset = record.end_offset();
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Consumes the builder, returning the records in write order.
    #[must_use]
    pub fn into_records(self) -> Vec<IndexRecord> {
        self.records
    }
}

/// Checks that `records` tile the data file from `first_offset` without gaps
/// and with strictly increasing sample positions.
///
/// # Errors
///
/// Returns `InvalidFormat` describing the first record that breaks the chain.
pub fn check_contiguous(records: &[IndexRecord], first_offset: i64) -> CoreResult<()> {
    let mut expected_offset = first_offset;
    let mut expected_sample = records.first().map_or(0, |r| r.start_sample);
    for (i, record) in records.iter().enumerate() {
        if record.file_offset != expected_offset {
            return Err(CoreError::invalid_format(format!(
                "index record {i} at offset {}, expected {expected_offset}",
                record.file_offset
            )));
        }
        if record.start_sample != expected_sample {
            return Err(CoreError::invalid_format(format!(
                "index record {i} starts at sample {}, expected {expected_sample}",
                record.start_sample
            )));
        }
        expected_offset = record.end_offset();
        expected_sample += i64::from(record.number_of_samples);
    }
    Ok(())
}

/// Encodes an index file: `header` followed by the packed records.
///
/// The header's entry count, entry size and body CRC are filled in here.
///
/// # Errors
///
/// Returns an error if the header cannot be encoded.
pub fn encode_index_file(header: &UniversalHeader, records: &[IndexRecord]) -> CoreResult<Vec<u8>> {
    let mut body = Vec::with_capacity(records.len() * INDEX_RECORD_BYTES);
    for record in records {
        body.extend_from_slice(&record.encode());
    }

    let mut header = header.clone();
    header.file_type = FileType::TimeSeriesIndex;
    header.number_of_entries = records.len() as i64;
    header.maximum_entry_size = INDEX_RECORD_BYTES as i64;
    header.body_crc = compute_crc32(&body);

    let mut buf = Vec::with_capacity(UNIVERSAL_HEADER_BYTES + body.len());
    buf.extend_from_slice(&header.encode()?);
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Decodes and verifies an index file.
///
/// # Errors
///
/// Returns an error if the header is invalid, the body is truncated, or the
/// body CRC does not match.
pub fn decode_index_file(data: &[u8]) -> CoreResult<(UniversalHeader, Vec<IndexRecord>)> {
    let header = UniversalHeader::decode_expecting(data, FileType::TimeSeriesIndex)?;
    let body = &data[UNIVERSAL_HEADER_BYTES..];

    let count = usize::try_from(header.number_of_entries)
        .map_err(|_| CoreError::invalid_format("negative index entry count"))?;
    let expected_len = count
        .checked_mul(INDEX_RECORD_BYTES)
        .ok_or_else(|| CoreError::invalid_format("index entry count overflows"))?;
    if body.len() != expected_len {
        return Err(CoreError::invalid_format(format!(
            "index body is {} bytes, header announces {count} records",
            body.len()
        )));
    }

    let actual = compute_crc32(body);
    if actual != header.body_crc {
        return Err(CoreError::ChecksumMismatch {
            expected: header.body_crc,
            actual,
        });
    }

    let records = body
        .chunks_exact(INDEX_RECORD_BYTES)
        .map(IndexRecord::decode)
        .collect::<CoreResult<Vec<_>>>()?;
    Ok((header, records))
}
