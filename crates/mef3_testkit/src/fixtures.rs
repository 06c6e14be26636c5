//! Test fixtures and segment helpers.
//!
//! Provides temporary channel directories holding a segment whose metadata
//! has already been written.

use mef3_core::{
    write_segment_data, write_segment_metadata, SegmentMetadata, SegmentNumber, SegmentPaths,
    SegmentWrite, Section3, TimeSeriesSection2, WriterConfig,
};
use mef3_storage::InMemoryBackend;
use tempfile::TempDir;

/// Start time used by fixtures (2020-01-01T00:00:00Z in µUTC).
pub const FIXTURE_START_TIME: i64 = 1_577_836_800_000_000;

/// Builds segment metadata with the given sampling frequency and conversion
/// factor, starting at [`FIXTURE_START_TIME`].
pub fn sample_metadata(sampling_frequency: f64, conversion_factor: f64) -> SegmentMetadata {
    let section2 = TimeSeriesSection2 {
        sampling_frequency,
        units_conversion_factor: conversion_factor,
        units_description: "µV".into(),
        ..TimeSeriesSection2::default()
    };
    let mut metadata = SegmentMetadata::new(section2, Section3::default());
    metadata.header.start_time = FIXTURE_START_TIME;
    metadata.header.channel_name = "test".into();
    metadata
}

/// A segment inside a temporary channel directory, with automatic cleanup.
pub struct TestSegment {
    /// Paths of the segment files.
    pub paths: SegmentPaths,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestSegment {
    /// Creates segment 0 of channel `test.timd` with metadata written.
    pub fn new(sampling_frequency: f64) -> Self {
        Self::with_metadata(&sample_metadata(sampling_frequency, 1.0))
    }

    /// Creates segment 0 of channel `test.timd` with `metadata` written.
    pub fn with_metadata(metadata: &SegmentMetadata) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths = SegmentPaths::new(&temp_dir.path().join("test.timd"), SegmentNumber::new(0))
            .expect("Failed to resolve segment paths");
        write_segment_metadata(&paths, metadata).expect("Failed to write segment metadata");
        Self {
            paths,
            _temp_dir: temp_dir,
        }
    }

    /// Writes `samples` with the given block size.
    pub fn write(&self, samples: &[i32], samples_per_block: u32) -> SegmentWrite {
        let config = WriterConfig::new()
            .samples_per_block(samples_per_block)
            .sync_on_finish(false);
        write_segment_data(&self.paths, samples, &config).expect("Failed to write segment data")
    }
}

/// Writes `samples` into an in-memory data file and returns the write
/// together with the backend holding the data file bytes.
pub fn write_in_memory(
    metadata: &SegmentMetadata,
    samples: &[i32],
    config: WriterConfig,
) -> (SegmentWrite, InMemoryBackend) {
    let mut data = InMemoryBackend::new();
    let write = mef3_core::SegmentWriter::new(config)
        .write_segment(metadata, samples, &mut data)
        .expect("Failed to write segment");
    (write, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mef3_core::read_segment_samples;

    #[test]
    fn fixture_segment_roundtrip() {
        let segment = TestSegment::new(250.0);
        let samples: Vec<i32> = (0..1000).map(|i| i % 50).collect();
        let write = segment.write(&samples, 256);

        assert_eq!(write.index.len(), 4);
        assert_eq!(read_segment_samples(&segment.paths).unwrap(), samples);
    }

    #[test]
    fn in_memory_write() {
        let metadata = sample_metadata(100.0, 1.0);
        let (write, data) = write_in_memory(&metadata, &[3, 1, 4, 1, 5], WriterConfig::new());

        assert_eq!(write.index.len(), 1);
        assert_eq!(data.data().len() as i64, write.index[0].end_offset());
    }
}
