//! Folds the outcome of a segment write into its metadata summary.

use super::extents::ExtentTracker;
use super::index::IndexRecord;
use super::plan::BlockPlan;
use crate::error::{CoreError, CoreResult};
use crate::metadata::SegmentSummary;

/// Derives the segment summary from the blocks actually written.
#[derive(Debug, Clone, Copy)]
pub struct MetadataReconciler {
    sampling_frequency: f64,
    conversion_factor: f64,
    block_interval: Option<i64>,
}

impl MetadataReconciler {
    /// Creates a reconciler for a channel with the given sampling frequency
    /// (Hz) and units conversion factor.
    #[must_use]
    pub fn new(sampling_frequency: f64, conversion_factor: f64) -> Self {
        Self {
            sampling_frequency,
            conversion_factor,
            block_interval: None,
        }
    }

    /// Uses `interval` (µs) as the block interval instead of deriving it
    /// from the largest block.
    #[must_use]
    pub fn with_block_interval(mut self, interval: i64) -> Self {
        self.block_interval = Some(interval);
        self
    }

    /// Returns `summary` updated with the statistics of the written blocks.
    ///
    /// Assumes one contiguous run: the run covers every block.
    ///
    /// # Errors
    ///
    /// Returns `Logic` if plans and records disagree, or if nothing was
    /// written.
    pub fn reconcile(
        &self,
        summary: &SegmentSummary,
        plans: &[BlockPlan],
        records: &[IndexRecord],
        extents: &ExtentTracker,
    ) -> CoreResult<SegmentSummary> {
        if records.is_empty() || extents.is_empty() {
            return Err(CoreError::logic("cannot reconcile an empty segment"));
        }
        if plans.len() != records.len() {
            return Err(CoreError::logic(format!(
                "{} blocks planned but {} indexed",
                plans.len(),
                records.len()
            )));
        }

        let planned_samples: i64 = plans.iter().map(|p| i64::from(p.sample_count)).sum();
        let indexed_samples: i64 = records.iter().map(|r| i64::from(r.number_of_samples)).sum();
        if planned_samples != indexed_samples {
            return Err(CoreError::logic(format!(
                "{planned_samples} samples planned but {indexed_samples} indexed"
            )));
        }

        let total_block_bytes: i64 = records.iter().map(|r| i64::from(r.block_bytes)).sum();
        let maximum_block_bytes = records.iter().map(|r| r.block_bytes).max().unwrap_or(0);
        let maximum_block_samples = records
            .iter()
            .map(|r| r.number_of_samples)
            .max()
            .unwrap_or(0);

        let (maximum_native, minimum_native) = self.native_extrema(extents);

        let mut updated = *summary;
        updated.number_of_samples = planned_samples;
        updated.number_of_blocks = records.len() as i64;
        updated.maximum_block_bytes = i64::from(maximum_block_bytes);
        updated.maximum_block_samples = maximum_block_samples;
        updated.maximum_difference_bytes = extents.maximum_difference_bytes();
        updated.block_interval = self
            .block_interval
            .unwrap_or_else(|| self.micros(i64::from(maximum_block_samples)));
        updated.number_of_discontinuities = 1;
        updated.maximum_contiguous_blocks = extents.contiguous_block_count() as i64;
        updated.maximum_contiguous_block_bytes = total_block_bytes;
        updated.maximum_contiguous_samples = planned_samples;
        updated.maximum_native_sample_value = maximum_native;
        updated.minimum_native_sample_value = minimum_native;
        updated.recording_duration = self.micros(planned_samples);
        Ok(updated)
    }

    fn micros(&self, samples: i64) -> i64 {
        (samples as f64 / self.sampling_frequency * 1e6).round() as i64
    }

    // A negative factor flips the raw ordering.
    fn native_extrema(&self, extents: &ExtentTracker) -> (f64, f64) {
        let high = f64::from(extents.global_max()) * self.conversion_factor;
        let low = f64::from(extents.global_min()) * self.conversion_factor;
        if self.conversion_factor < 0.0 {
            (low, high)
        } else {
            (high, low)
        }
    }
}
