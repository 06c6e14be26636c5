//! Segment writer: compresses samples block by block into a data file.
//!
//! The data file starts with a placeholder universal header. Blocks are
//! appended behind it, one per [`BlockPlan`], and the header is patched in
//! place once every block is on disk:
//!
//! ```text
//! ┌──────────────────┬─────────┬─────────┬─────┬─────────┐
//! │ universal header │ block 0 │ block 1 │ ... │ block n │
//! │    256 bytes     │         │         │     │         │
//! └──────────────────┴─────────┴─────────┴─────┴─────────┘
//! ```
//!
//! A failed write leaves the partial data file behind and returns the error.

use super::extents::ExtentTracker;
use super::index::{IndexBuilder, IndexRecord};
use super::plan::{BlockPlan, BlockSegmenter};
use super::reconcile::MetadataReconciler;
use crate::codec::{BlockCodec, CodecError, DifferenceCodec, BLOCK_HEADER_BYTES};
use crate::config::WriterConfig;
use crate::crc::Crc32;
use crate::error::{CoreError, CoreResult};
use crate::header::{FileType, UniversalHeader, UNIVERSAL_HEADER_BYTES};
use crate::metadata::SegmentMetadata;
use crate::types::UUTC_NO_ENTRY;
use mef3_storage::StorageBackend;
use tracing::{debug, info, trace, warn};

/// Result of a completed segment write.
#[derive(Debug, Clone)]
pub struct SegmentWrite {
    /// Input metadata with the write's summary folded in.
    pub metadata: SegmentMetadata,
    /// One record per block, in write order.
    pub index: Vec<IndexRecord>,
    /// Final header of the data file.
    pub data_header: UniversalHeader,
}

/// Writes one segment's samples through a [`BlockCodec`].
pub struct SegmentWriter<C: BlockCodec = DifferenceCodec> {
    codec: C,
    config: WriterConfig,
}

impl SegmentWriter<DifferenceCodec> {
    /// Creates a writer using the difference codec selected by `config`.
    #[must_use]
    pub fn new(config: WriterConfig) -> Self {
        let codec = DifferenceCodec::from_config(&config);
        Self { codec, config }
    }
}

impl<C: BlockCodec> SegmentWriter<C> {
    /// Creates a writer with a custom codec.
    #[must_use]
    pub fn with_codec(config: WriterConfig, codec: C) -> Self {
        Self { codec, config }
    }

    /// Returns the writer configuration.
    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Compresses `samples` into `data` and returns the reconciled metadata
    /// and the index records for the written blocks.
    ///
    /// `data` is expected to be empty; blocks are placed after the header
    /// wherever the backend's current end is.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the configuration, samples, sampling frequency
    ///   or start time are unusable. Nothing is written in that case.
    /// - `Codec` naming the failing block if compression fails.
    /// - `Storage`/`Io` if the backend fails.
    /// - `Logic` if the codec output disagrees with the plan.
    pub fn write_segment(
        &mut self,
        metadata: &SegmentMetadata,
        samples: &[i32],
        data: &mut dyn StorageBackend,
    ) -> CoreResult<SegmentWrite> {
        let segmenter = self.validate(metadata, samples)?;
        let plans = segmenter.plan(samples.len() as i64)?;
        debug!(
            "Writing {} samples of {:?} as {} blocks",
            samples.len(),
            metadata.header.channel_name,
            plans.len()
        );

        let result = self.write_blocks(metadata, &segmenter, &plans, samples, data);
        match &result {
            Ok(write) => info!(
                "Wrote segment {:?}: {} samples in {} blocks",
                metadata.header.channel_name,
                write.metadata.section2.number_of_samples,
                write.index.len()
            ),
            Err(e) => warn!(
                "Segment write for {:?} aborted, partial data file left in place: {}",
                metadata.header.channel_name, e
            ),
        }
        result
    }

    /// Checks that `metadata` and `samples` can be written with this
    /// configuration, without touching any storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unusable configuration, no samples, a
    /// non-positive or non-finite sampling frequency, or an unset start time.
    pub fn validate(
        &self,
        metadata: &SegmentMetadata,
        samples: &[i32],
    ) -> CoreResult<BlockSegmenter> {
        self.config.validate()?;
        if samples.is_empty() {
            return Err(CoreError::invalid_argument("no samples to write"));
        }
        if metadata.header.start_time == UUTC_NO_ENTRY {
            return Err(CoreError::invalid_argument(
                "segment start time is not set",
            ));
        }
        BlockSegmenter::new(
            self.config.samples_per_block,
            metadata.section2.sampling_frequency,
            metadata.header.start_time,
        )
    }

    fn write_blocks(
        &mut self,
        metadata: &SegmentMetadata,
        segmenter: &BlockSegmenter,
        plans: &[BlockPlan],
        samples: &[i32],
        data: &mut dyn StorageBackend,
    ) -> CoreResult<SegmentWrite> {
        let mut data_header = metadata.header.sibling(FileType::TimeSeriesData);
        let header_offset = data.append(&data_header.encode()?)?;

        let mut index = IndexBuilder::new((header_offset + UNIVERSAL_HEADER_BYTES as u64) as i64);
        let mut extents = ExtentTracker::new();
        let mut body_crc = Crc32::new();

        for (block_number, plan) in plans.iter().enumerate() {
            let codec_error = |source| CoreError::Codec {
                block: block_number as u64,
                source,
            };
            let mut block = self
                .codec
                .encode(&samples[plan.sample_range()])
                .map_err(codec_error)?;
            if block.bytes.len() < BLOCK_HEADER_BYTES {
                return Err(codec_error(CodecError::Truncated {
                    expected: BLOCK_HEADER_BYTES,
                    actual: block.bytes.len(),
                }));
            }
            if block_number == 0 {
                block.set_discontinuity();
            }

            let offset = data.append(&block.bytes)?;
            if offset as i64 != index.next_offset() {
                return Err(CoreError::logic(format!(
                    "block {block_number} landed at offset {offset}, expected {}",
                    index.next_offset()
                )));
            }
            body_crc.update(&block.bytes);
            extents.observe(&block.header);
            let record = index.push(plan, &block)?;
            trace!(
                "Block {} at offset {}: {} samples, {} bytes",
                block_number,
                record.file_offset,
                record.number_of_samples,
                record.block_bytes
            );
        }

        let records = index.into_records();
        let summary = MetadataReconciler::new(
            metadata.section2.sampling_frequency,
            metadata.section2.units_conversion_factor,
        )
        .with_block_interval(segmenter.block_interval())
        .reconcile(&metadata.summary(), plans, &records, &extents)?;
        let metadata = metadata.with_summary(&summary);

        data_header.number_of_entries = records.len() as i64;
        data_header.maximum_entry_size = summary.maximum_block_bytes;
        data_header.start_time = metadata.header.start_time;
        data_header.end_time = metadata.header.end_time;
        data_header.body_crc = body_crc.finalize();
        data.write_at(header_offset, &data_header.encode()?)?;

        data.flush()?;
        if self.config.sync_on_finish {
            data.sync()?;
        }

        Ok(SegmentWrite {
            metadata,
            index: records,
            data_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BlockFlags, CompressedBlock};
    use crate::error::ErrorKind;
    use crate::metadata::{Section3, TimeSeriesSection2};
    use mef3_storage::{InMemoryBackend, StorageError, StorageResult};

    const START: i64 = 1_700_000_000_000_000;

    fn metadata(fs: f64, conversion_factor: f64) -> SegmentMetadata {
        let section2 = TimeSeriesSection2 {
            sampling_frequency: fs,
            units_conversion_factor: conversion_factor,
            ..TimeSeriesSection2::default()
        };
        let mut meta = SegmentMetadata::new(section2, Section3::default());
        meta.header.start_time = START;
        meta.header.channel_name = "LFP".into();
        meta
    }

    fn writer(per_block: u32) -> SegmentWriter {
        SegmentWriter::new(WriterConfig::new().samples_per_block(per_block))
    }

    /// Codec that delegates to the difference codec but fails on one block.
    struct FailingCodec {
        inner: DifferenceCodec,
        calls: u64,
        fail_on: u64,
    }

    impl BlockCodec for FailingCodec {
        fn encode(&mut self, samples: &[i32]) -> Result<CompressedBlock, CodecError> {
            let call = self.calls;
            self.calls += 1;
            if call == self.fail_on {
                return Err(CodecError::Failed("injected".into()));
            }
            self.inner.encode(samples)
        }

        fn decode(&self, block: &[u8]) -> Result<Vec<i32>, CodecError> {
            self.inner.decode(block)
        }
    }

    /// Backend whose appends start failing after a byte budget.
    struct FullDisk {
        inner: InMemoryBackend,
        budget: u64,
    }

    impl StorageBackend for FullDisk {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.inner.size()? + data.len() as u64 > self.budget {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.append(data)
        }

        fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
            self.inner.write_at(offset, data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }
    }

    #[test]
    fn blocks_cover_all_samples() {
        let samples: Vec<i32> = (0..10_250).map(|i| (i * 7) % 301 - 150).collect();
        let mut data = InMemoryBackend::new();
        let write = writer(1024)
            .write_segment(&metadata(1024.0, 1.0), &samples, &mut data)
            .unwrap();

        assert_eq!(write.index.len(), 11);
        assert_eq!(write.index[10].number_of_samples, 10);
        assert_eq!(write.metadata.section2.number_of_samples, 10_250);
        assert_eq!(write.metadata.section2.number_of_blocks, 11);
        assert_eq!(write.metadata.section2.maximum_block_samples, 1024);
        assert_eq!(write.index[0].file_offset, UNIVERSAL_HEADER_BYTES as i64);
        assert_eq!(
            data.size().unwrap() as i64,
            write.index[10].end_offset()
        );
    }

    #[test]
    fn only_first_block_flagged_discontinuous() {
        let samples: Vec<i32> = (0..10).collect();
        let mut data = InMemoryBackend::new();
        let write = writer(4)
            .write_segment(&metadata(100.0, 1.0), &samples, &mut data)
            .unwrap();

        assert!(write.index[0].flags.is_discontinuity());
        assert!(write.index[1..]
            .iter()
            .all(|r| r.flags == BlockFlags::NONE));
    }

    #[test]
    fn data_decodes_back_to_samples() {
        let samples: Vec<i32> = (0..1000).map(|i| ((i * 37) % 1001) - 500).collect();
        let mut data = InMemoryBackend::new();
        let write = writer(128)
            .write_segment(&metadata(500.0, 1.0), &samples, &mut data)
            .unwrap();

        let codec = DifferenceCodec::lossless();
        let mut decoded = Vec::new();
        for record in &write.index {
            let bytes = data
                .read_at(record.file_offset as u64, record.block_bytes as usize)
                .unwrap();
            decoded.extend(codec.decode(&bytes).unwrap());
        }
        assert_eq!(decoded, samples);
    }

    #[test]
    fn header_patched_after_blocks() {
        let samples = vec![1, 2, 3, 4, 5];
        let mut data = InMemoryBackend::new();
        let write = writer(2)
            .write_segment(&metadata(1.0, 1.0), &samples, &mut data)
            .unwrap();

        let bytes = data.read_at(0, UNIVERSAL_HEADER_BYTES).unwrap();
        let header = UniversalHeader::decode_expecting(&bytes, FileType::TimeSeriesData).unwrap();
        assert_eq!(header, write.data_header);
        assert_eq!(header.number_of_entries, 3);
        assert_eq!(header.start_time, START);
        assert_eq!(header.end_time, START + 5_000_000);

        let size = data.size().unwrap() as usize;
        let body = data.read_at(256, size - 256).unwrap();
        assert_eq!(header.body_crc, crate::crc::compute_crc32(&body));
    }

    #[test]
    fn extrema_in_native_units() {
        let mut data = InMemoryBackend::new();
        let write = writer(2)
            .write_segment(&metadata(1000.0, 2.0), &[5, -3, 100, 0, -50], &mut data)
            .unwrap();

        assert_eq!(write.metadata.section2.maximum_native_sample_value, 200.0);
        assert_eq!(write.metadata.section2.minimum_native_sample_value, -100.0);
    }

    #[test]
    fn duration_and_end_time() {
        let samples = vec![0; 2500];
        let mut data = InMemoryBackend::new();
        let write = writer(250)
            .write_segment(&metadata(250.0, 1.0), &samples, &mut data)
            .unwrap();

        assert_eq!(write.metadata.section2.recording_duration, 10_000_000);
        assert_eq!(write.metadata.header.end_time, START + 10_000_000);
        assert_eq!(write.index.len(), 10);
    }

    #[test]
    fn lossy_extrema_reflect_reconstruction() {
        let config = WriterConfig::new().samples_per_block(4).lossy(10);
        let mut data = InMemoryBackend::new();
        let write = SegmentWriter::new(config)
            .write_segment(&metadata(100.0, 1.0), &[14, 26, -4, 3], &mut data)
            .unwrap();

        assert!(write.index[0].flags.is_lossy());
        assert_eq!(write.index[0].max_sample_value, 30);
        assert_eq!(write.index[0].min_sample_value, 0);
    }

    #[test]
    fn invalid_input_writes_nothing() {
        let mut data = InMemoryBackend::new();

        let err = writer(10)
            .write_segment(&metadata(100.0, 1.0), &[], &mut data)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = writer(0)
            .write_segment(&metadata(100.0, 1.0), &[1, 2], &mut data)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = writer(10)
            .write_segment(&metadata(0.0, 1.0), &[1, 2], &mut data)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut unset = metadata(100.0, 1.0);
        unset.header.start_time = UUTC_NO_ENTRY;
        let err = writer(10).write_segment(&unset, &[1, 2], &mut data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(data.size().unwrap(), 0);
    }

    #[test]
    fn codec_failure_names_block() {
        let codec = FailingCodec {
            inner: DifferenceCodec::lossless(),
            calls: 0,
            fail_on: 3,
        };
        let mut writer = SegmentWriter::with_codec(WriterConfig::new().samples_per_block(2), codec);
        let mut data = InMemoryBackend::new();

        let err = writer
            .write_segment(&metadata(10.0, 1.0), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &mut data)
            .unwrap_err();

        assert!(matches!(err, CoreError::Codec { block: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::Codec);
        // header and three blocks remain
        assert!(data.size().unwrap() > UNIVERSAL_HEADER_BYTES as u64);
    }

    #[test]
    fn storage_failure_is_io() {
        let mut data = FullDisk {
            inner: InMemoryBackend::new(),
            budget: 300,
        };
        let samples: Vec<i32> = (0..100).collect();
        let err = writer(10)
            .write_segment(&metadata(10.0, 1.0), &samples, &mut data)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
