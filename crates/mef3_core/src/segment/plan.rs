//! Block segmentation of a flat sample buffer.

use crate::error::{CoreError, CoreResult};
use std::ops::Range;

const SAMPLE_BYTES: i64 = std::mem::size_of::<i32>() as i64;

/// Placement of one output block within the caller's sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    /// Index of the first sample of the block.
    pub start_sample: i64,
    /// Number of samples in the block.
    pub sample_count: u32,
    /// Offset of the first sample within the sample buffer, in bytes.
    pub byte_offset: i64,
    /// Time of the first sample (µUTC).
    pub start_time: i64,
}

impl BlockPlan {
    /// Index one past the last sample of the block.
    #[must_use]
    pub fn end_sample(&self) -> i64 {
        self.start_sample + i64::from(self.sample_count)
    }

    /// Range of the block within the sample buffer.
    #[must_use]
    pub fn sample_range(&self) -> Range<usize> {
        let start = self.start_sample as usize;
        start..start + self.sample_count as usize
    }
}

/// Splits a sample buffer into fixed-size blocks with a short final block.
#[derive(Debug, Clone, Copy)]
pub struct BlockSegmenter {
    samples_per_block: u32,
    sampling_frequency: f64,
    segment_start_time: i64,
}

impl BlockSegmenter {
    /// Creates a segmenter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `samples_per_block` is zero or the
    /// sampling frequency is not a positive finite number.
    pub fn new(
        samples_per_block: u32,
        sampling_frequency: f64,
        segment_start_time: i64,
    ) -> CoreResult<Self> {
        if samples_per_block == 0 {
            return Err(CoreError::invalid_argument(
                "samples_per_block must be at least 1",
            ));
        }
        if !(sampling_frequency.is_finite() && sampling_frequency > 0.0) {
            return Err(CoreError::invalid_argument(format!(
                "sampling frequency must be positive, got {sampling_frequency}"
            )));
        }
        Ok(Self {
            samples_per_block,
            sampling_frequency,
            segment_start_time,
        })
    }

    /// Duration of a full block in microseconds.
    #[must_use]
    pub fn block_interval(&self) -> i64 {
        (f64::from(self.samples_per_block) / self.sampling_frequency * 1e6).round() as i64
    }

    /// Computes the blocks covering `[0, total_samples)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `total_samples` is not positive.
    pub fn plan(&self, total_samples: i64) -> CoreResult<Vec<BlockPlan>> {
        if total_samples <= 0 {
            return Err(CoreError::invalid_argument(format!(
                "cannot segment {total_samples} samples"
            )));
        }

        let per_block = i64::from(self.samples_per_block);
        let interval = self.block_interval();
        let block_count = (total_samples + per_block - 1) / per_block;

        let mut plans = Vec::with_capacity(block_count as usize);
        let mut start_sample = 0i64;
        let mut start_time = self.segment_start_time;
        while start_sample < total_samples {
            // at most samples_per_block, so it fits in u32
            let sample_count = per_block.min(total_samples - start_sample) as u32;
            plans.push(BlockPlan {
                start_sample,
                sample_count,
                byte_offset: start_sample * SAMPLE_BYTES,
                start_time,
            });
            start_sample += i64::from(sample_count);
            start_time = start_time.saturating_add(interval);
        }

        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_block_holds_remainder() {
        let segmenter = BlockSegmenter::new(1024, 1024.0, 0).unwrap();
        let plans = segmenter.plan(10_250).unwrap();

        assert_eq!(plans.len(), 11);
        assert!(plans[..10].iter().all(|p| p.sample_count == 1024));
        assert_eq!(plans[10].sample_count, 10);
        assert_eq!(plans[10].start_sample, 10_240);
        assert_eq!(plans[10].end_sample(), 10_250);
    }

    #[test]
    fn exact_multiple_has_full_final_block() {
        let segmenter = BlockSegmenter::new(250, 250.0, 0).unwrap();
        let plans = segmenter.plan(2500).unwrap();

        assert_eq!(plans.len(), 10);
        assert_eq!(plans[9].sample_count, 250);
    }

    #[test]
    fn start_times_advance_by_block_interval() {
        let start = 1_600_000_000_000_000;
        let segmenter = BlockSegmenter::new(3, 1000.0, start).unwrap();
        assert_eq!(segmenter.block_interval(), 3000);

        let plans = segmenter.plan(7).unwrap();
        let times: Vec<i64> = plans.iter().map(|p| p.start_time).collect();
        assert_eq!(times, vec![start, start + 3000, start + 6000]);
    }

    #[test]
    fn block_interval_is_rounded() {
        // 2 / 3 Hz = 666_666.67 µs
        let segmenter = BlockSegmenter::new(2, 3.0, 0).unwrap();
        assert_eq!(segmenter.block_interval(), 666_667);
    }

    #[test]
    fn byte_offsets_follow_sample_positions() {
        let plans = BlockSegmenter::new(2, 1.0, 0).unwrap().plan(5).unwrap();
        let offsets: Vec<i64> = plans.iter().map(|p| p.byte_offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(plans[2].sample_range(), 4..5);
    }

    #[test]
    fn single_sample() {
        let plans = BlockSegmenter::new(u32::MAX, 1.0, 42).unwrap().plan(1).unwrap();
        assert_eq!(
            plans,
            vec![BlockPlan {
                start_sample: 0,
                sample_count: 1,
                byte_offset: 0,
                start_time: 42,
            }]
        );
    }

    #[test]
    fn zero_block_size_rejected() {
        assert!(matches!(
            BlockSegmenter::new(0, 250.0, 0),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn bad_sampling_frequency_rejected() {
        for fs in [0.0, -250.0, f64::NAN, f64::INFINITY] {
            assert!(BlockSegmenter::new(10, fs, 0).is_err(), "accepted {fs}");
        }
    }

    #[test]
    fn non_positive_total_rejected() {
        let segmenter = BlockSegmenter::new(10, 250.0, 0).unwrap();
        assert!(segmenter.plan(0).is_err());
        assert!(segmenter.plan(-5).is_err());
    }
}
