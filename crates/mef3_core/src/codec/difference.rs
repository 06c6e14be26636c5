//! Difference coder.
//!
//! Each sample is stored as its difference from the previous sample in one
//! signed byte. Differences outside `-127..=127`, and the first sample of a
//! block, are written as a keysample: the escape byte `0x80` followed by the
//! full little-endian value.

use super::{
    BlockCodec, BlockFlags, BlockHeader, CodecError, CompressedBlock, BLOCK_ALIGNMENT,
    BLOCK_HEADER_BYTES,
};
use crate::config::WriterConfig;
use crate::crc::compute_crc32;

const KEYSAMPLE_FLAG: u8 = 0x80;
const KEYSAMPLE_BYTES: usize = 5;

/// Deterministic difference coder, lossless unless configured with a
/// quantisation step.
#[derive(Debug, Clone, Copy)]
pub struct DifferenceCodec {
    scale: u32,
    lossy: bool,
}

impl DifferenceCodec {
    /// Creates a lossless codec.
    #[must_use]
    pub const fn lossless() -> Self {
        Self {
            scale: 1,
            lossy: false,
        }
    }

    /// Creates a lossy codec that quantises samples by `scale`.
    ///
    /// A `scale` of zero is treated as one.
    #[must_use]
    pub const fn lossy(scale: u32) -> Self {
        Self {
            scale: if scale == 0 { 1 } else { scale },
            lossy: true,
        }
    }

    /// Creates the codec selected by a writer configuration.
    #[must_use]
    pub const fn from_config(config: &WriterConfig) -> Self {
        if config.lossy {
            Self::lossy(config.lossy_scale)
        } else {
            Self::lossless()
        }
    }

    fn quantise(&self, sample: i32) -> i32 {
        if self.scale == 1 {
            return sample;
        }
        let value = i64::from(sample);
        let scale = i64::from(self.scale);
        let half = scale / 2;
        let q = if value >= 0 {
            (value + half) / scale
        } else {
            (value - half) / scale
        };
        // |q| <= |sample| for scale >= 2, so this never truncates
        q as i32
    }
}

fn reconstruct(stored: i32, scale: u32) -> i32 {
    let value = i64::from(stored) * i64::from(scale);
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn align(len: usize) -> usize {
    len.div_ceil(BLOCK_ALIGNMENT) * BLOCK_ALIGNMENT
}

impl BlockCodec for DifferenceCodec {
    fn encode(&mut self, samples: &[i32]) -> Result<CompressedBlock, CodecError> {
        if samples.is_empty() {
            return Err(CodecError::EmptyBlock);
        }
        let number_of_samples = u32::try_from(samples.len())
            .map_err(|_| CodecError::TooManySamples {
                count: samples.len(),
            })?;

        let mut differences = Vec::with_capacity(samples.len() + KEYSAMPLE_BYTES);
        let mut previous: Option<i32> = None;
        let mut max_sample = i32::MIN;
        let mut min_sample = i32::MAX;

        for &sample in samples {
            let stored = self.quantise(sample);
            let restored = reconstruct(stored, self.scale);
            max_sample = max_sample.max(restored);
            min_sample = min_sample.min(restored);

            match previous {
                Some(prev) if (-127..=127).contains(&(i64::from(stored) - i64::from(prev))) => {
                    differences.push((stored - prev) as i8 as u8);
                }
                _ => {
                    differences.push(KEYSAMPLE_FLAG);
                    differences.extend_from_slice(&stored.to_le_bytes());
                }
            }
            previous = Some(stored);
        }

        let difference_bytes = differences.len();
        let block_len = align(BLOCK_HEADER_BYTES + difference_bytes);
        let to_u32 = |n: usize| {
            u32::try_from(n).map_err(|_| CodecError::Failed(format!("block of {n} bytes is too large")))
        };

        let mut flags = BlockFlags::NONE;
        if self.lossy {
            flags = flags.with_lossy();
        }
        let mut header = BlockHeader {
            crc: 0,
            flags,
            number_of_samples,
            difference_bytes: to_u32(difference_bytes)?,
            block_bytes: to_u32(block_len)?,
            max_sample,
            min_sample,
            scale: self.scale,
        };

        let mut bytes = Vec::with_capacity(block_len);
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&differences);
        bytes.resize(block_len, 0);

        header.crc = compute_crc32(&bytes[4..]);
        bytes[0..4].copy_from_slice(&header.crc.to_le_bytes());

        Ok(CompressedBlock { header, bytes })
    }

    fn decode(&self, block: &[u8]) -> Result<Vec<i32>, CodecError> {
        let header = BlockHeader::decode(block)?;
        let block_len = header.block_bytes as usize;
        if block.len() < block_len {
            return Err(CodecError::Truncated {
                expected: block_len,
                actual: block.len(),
            });
        }
        if block_len < BLOCK_HEADER_BYTES {
            return Err(CodecError::Malformed(format!(
                "block_bytes {block_len} is smaller than the header"
            )));
        }

        let computed = compute_crc32(&block[4..block_len]);
        if computed != header.crc {
            return Err(CodecError::ChecksumMismatch {
                expected: header.crc,
                actual: computed,
            });
        }

        let stream_end = BLOCK_HEADER_BYTES + header.difference_bytes as usize;
        if stream_end > block_len {
            return Err(CodecError::Malformed(format!(
                "difference stream of {} bytes overruns block of {block_len} bytes",
                header.difference_bytes
            )));
        }
        let stream = &block[BLOCK_HEADER_BYTES..stream_end];

        let mut samples = Vec::with_capacity(header.number_of_samples as usize);
        let mut cursor = 0;
        let mut previous = 0i32;
        while cursor < stream.len() {
            let byte = stream[cursor];
            let stored = if byte == KEYSAMPLE_FLAG {
                let raw = stream.get(cursor + 1..cursor + KEYSAMPLE_BYTES).ok_or_else(|| {
                    CodecError::Malformed("keysample cut short".to_string())
                })?;
                cursor += KEYSAMPLE_BYTES;
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
            } else {
                if samples.is_empty() {
                    return Err(CodecError::Malformed(
                        "block does not start with a keysample".to_string(),
                    ));
                }
                cursor += 1;
                previous.wrapping_add(i32::from(byte as i8))
            };
            samples.push(reconstruct(stored, header.scale.max(1)));
            previous = stored;
        }

        if samples.len() != header.number_of_samples as usize {
            return Err(CodecError::Malformed(format!(
                "header announces {} samples, stream holds {}",
                header.number_of_samples,
                samples.len()
            )));
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_roundtrip_with_small_and_large_steps() {
        let samples = vec![0, 1, -1, 127, -200, i32::MAX, i32::MIN, 5];
        let mut codec = DifferenceCodec::lossless();

        let block = codec.encode(&samples).unwrap();
        assert_eq!(codec.decode(&block.bytes).unwrap(), samples);
    }

    #[test]
    fn header_reports_extrema_and_sizes() {
        let mut codec = DifferenceCodec::lossless();
        let block = codec.encode(&[5, -3, 100]).unwrap();

        assert_eq!(block.header.number_of_samples, 3);
        assert_eq!(block.header.max_sample, 100);
        assert_eq!(block.header.min_sample, -3);
        // keysample followed by two one-byte differences
        assert_eq!(block.header.difference_bytes, 5 + 1 + 1);
        assert_eq!(block.header.block_bytes as usize, block.bytes.len());
        assert_eq!(block.bytes.len() % BLOCK_ALIGNMENT, 0);
        assert!(!block.header.flags.is_lossy());
    }

    #[test]
    fn encoding_is_deterministic() {
        let samples: Vec<i32> = (0..500).map(|i| (i * 37 % 301) - 150).collect();
        let a = DifferenceCodec::lossless().encode(&samples).unwrap();
        let b = DifferenceCodec::lossless().encode(&samples).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_block_rejected() {
        assert_eq!(
            DifferenceCodec::lossless().encode(&[]),
            Err(CodecError::EmptyBlock)
        );
    }

    #[test]
    fn lossy_quantises_and_flags_block() {
        let mut codec = DifferenceCodec::lossy(10);
        let block = codec.encode(&[14, 15, -15, 104]).unwrap();

        assert!(block.header.flags.is_lossy());
        assert_eq!(block.header.scale, 10);
        assert_eq!(codec.decode(&block.bytes).unwrap(), vec![10, 20, -20, 100]);
        assert_eq!(block.header.max_sample, 100);
        assert_eq!(block.header.min_sample, -20);
    }

    #[test]
    fn lossy_reconstruction_saturates() {
        let mut codec = DifferenceCodec::lossy(2);
        let block = codec.encode(&[i32::MAX]).unwrap();
        assert_eq!(codec.decode(&block.bytes).unwrap(), vec![i32::MAX]);
    }

    #[test]
    fn corrupted_block_detected() {
        let mut codec = DifferenceCodec::lossless();
        let mut bytes = codec.encode(&[1, 2, 3, 4]).unwrap().bytes;
        bytes[BLOCK_HEADER_BYTES + 1] ^= 0xFF;

        assert!(matches!(
            codec.decode(&bytes),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_block_detected() {
        let mut codec = DifferenceCodec::lossless();
        let bytes = codec.encode(&[1, 2, 3, 4]).unwrap().bytes;

        assert!(matches!(
            codec.decode(&bytes[..bytes.len() - 1]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn from_config_selects_mode() {
        let lossless = DifferenceCodec::from_config(&WriterConfig::new());
        assert!(!lossless.lossy);

        let lossy = DifferenceCodec::from_config(&WriterConfig::new().lossy(8));
        assert!(lossy.lossy);
        assert_eq!(lossy.scale, 8);
    }
}
