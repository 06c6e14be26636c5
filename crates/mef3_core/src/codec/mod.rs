//! Block compression.
//!
//! A block is a run of consecutive samples compressed as one unit. Every
//! compressed block starts with a fixed-size header:
//!
//! ```text
//! | crc (4) | flags (1) | reserved (3) | number_of_samples (4) | difference_bytes (4) |
//! | block_bytes (4) | max_sample (4) | min_sample (4) | scale (4) | differences (N) | pad |
//! ```
//!
//! `crc` covers every block byte after the CRC field. `block_bytes` includes
//! the header and the padding that aligns the next block to 8 bytes.

mod difference;

pub use difference::DifferenceCodec;

use crate::crc::compute_crc32;
use thiserror::Error;

/// Size of the fixed block header in bytes.
pub const BLOCK_HEADER_BYTES: usize = 32;

/// Alignment of every compressed block within the data file.
pub const BLOCK_ALIGNMENT: usize = 8;

/// Errors raised by a [`BlockCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A block must contain at least one sample.
    #[error("cannot encode an empty block")]
    EmptyBlock,

    /// The block holds more samples than the header can describe.
    #[error("block of {count} samples exceeds the u32 sample count")]
    TooManySamples {
        /// Number of samples passed in.
        count: usize,
    },

    /// The buffer ends before the block does.
    #[error("block truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The block CRC does not match its contents.
    #[error("block checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// CRC stored in the header.
        expected: u32,
        /// CRC computed over the block.
        actual: u32,
    },

    /// The difference stream is inconsistent with the header.
    #[error("malformed block: {0}")]
    Malformed(String),

    /// The codec refused to encode the block.
    #[error("encoder failure: {0}")]
    Failed(String),
}

/// Flags stored in each block header and copied into its index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockFlags(u8);

impl BlockFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Block starts a new contiguous run.
    pub const DISCONTINUITY: Self = Self(0x01);
    /// Block samples were quantised before compression.
    pub const LOSSY: Self = Self(0x04);

    /// Creates flags from a raw byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Checks if the discontinuity flag is set.
    #[must_use]
    pub const fn is_discontinuity(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Checks if the lossy flag is set.
    #[must_use]
    pub const fn is_lossy(self) -> bool {
        self.0 & 0x04 != 0
    }

    /// Sets the discontinuity flag.
    #[must_use]
    pub const fn with_discontinuity(self) -> Self {
        Self(self.0 | 0x01)
    }

    /// Sets the lossy flag.
    #[must_use]
    pub const fn with_lossy(self) -> Self {
        Self(self.0 | 0x04)
    }
}

/// Decoded form of the fixed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// CRC over the block bytes following this field.
    pub crc: u32,
    /// Block flags.
    pub flags: BlockFlags,
    /// Number of samples in the block.
    pub number_of_samples: u32,
    /// Length of the difference stream in bytes.
    pub difference_bytes: u32,
    /// Total block length including header and padding.
    pub block_bytes: u32,
    /// Largest sample value in the block.
    pub max_sample: i32,
    /// Smallest sample value in the block.
    pub min_sample: i32,
    /// Quantisation step (1 for lossless blocks).
    pub scale: u32,
}

impl BlockHeader {
    /// Serialises the header into its fixed-size form.
    #[must_use]
    pub fn encode(&self) -> [u8; BLOCK_HEADER_BYTES] {
        let mut buf = [0u8; BLOCK_HEADER_BYTES];
        buf[0..4].copy_from_slice(&self.crc.to_le_bytes());
        buf[4] = self.flags.as_byte();
        buf[8..12].copy_from_slice(&self.number_of_samples.to_le_bytes());
        buf[12..16].copy_from_slice(&self.difference_bytes.to_le_bytes());
        buf[16..20].copy_from_slice(&self.block_bytes.to_le_bytes());
        buf[20..24].copy_from_slice(&self.max_sample.to_le_bytes());
        buf[24..28].copy_from_slice(&self.min_sample.to_le_bytes());
        buf[28..32].copy_from_slice(&self.scale.to_le_bytes());
        buf
    }

    /// Parses a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than [`BLOCK_HEADER_BYTES`] are available.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < BLOCK_HEADER_BYTES {
            return Err(CodecError::Truncated {
                expected: BLOCK_HEADER_BYTES,
                actual: data.len(),
            });
        }
        let u32_at = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let i32_at = |at: usize| i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

        Ok(Self {
            crc: u32_at(0),
            flags: BlockFlags::from_byte(data[4]),
            number_of_samples: u32_at(8),
            difference_bytes: u32_at(12),
            block_bytes: u32_at(16),
            max_sample: i32_at(20),
            min_sample: i32_at(24),
            scale: u32_at(28),
        })
    }
}

/// One compressed block ready to be appended to the data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBlock {
    /// Decoded header (mirrors the first bytes of `bytes`).
    pub header: BlockHeader,
    /// Full block bytes, header and padding included.
    pub bytes: Vec<u8>,
}

impl CompressedBlock {
    /// Marks the block as the start of a contiguous run and re-seals its CRC.
    pub fn set_discontinuity(&mut self) {
        self.header.flags = self.header.flags.with_discontinuity();
        self.bytes[4] = self.header.flags.as_byte();
        self.header.crc = compute_crc32(&self.bytes[4..]);
        self.bytes[0..4].copy_from_slice(&self.header.crc.to_le_bytes());
    }
}

/// Compresses blocks of samples.
///
/// Encoding must be deterministic for identical input and configuration.
pub trait BlockCodec {
    /// Compresses one block of samples.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the block cannot be encoded.
    fn encode(&mut self, samples: &[i32]) -> Result<CompressedBlock, CodecError>;

    /// Decompresses one block previously produced by [`BlockCodec::encode`].
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the block is truncated, corrupt, or malformed.
    fn decode(&self, block: &[u8]) -> Result<Vec<i32>, CodecError>;
}
