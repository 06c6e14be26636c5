//! Segment file operations: create metadata, write data, read back.
//!
//! Writing a segment is a two-step protocol. [`write_segment_metadata`]
//! creates the segment directory and its `.tmet` file; [`write_segment_data`]
//! then writes the `.tdat` and `.tidx` files and rewrites the `.tmet` file with
//! the reconciled summary.

use crate::codec::{BlockCodec, DifferenceCodec};
use crate::config::WriterConfig;
use crate::crc::compute_crc32;
use crate::error::{CoreError, CoreResult};
use crate::header::{FileType, UniversalHeader, UNIVERSAL_HEADER_BYTES};
use crate::layout::SegmentPaths;
use crate::metadata::SegmentMetadata;
use crate::segment::{
    check_contiguous, decode_index_file, encode_index_file, IndexRecord, SegmentWrite,
    SegmentWriter,
};
use mef3_storage::{FileBackend, StorageBackend, StorageError};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;

/// Creates the segment directory and writes its metadata file.
///
/// The header's channel name and segment number are taken from `paths`, as
/// is the session name when the channel sits inside a `.mefd` directory.
///
/// # Errors
///
/// Returns `Precondition` if the metadata file already exists, or an I/O or
/// encoding error.
pub fn write_segment_metadata(paths: &SegmentPaths, metadata: &SegmentMetadata) -> CoreResult<()> {
    let mut metadata = metadata.clone();
    metadata.header.channel_name = paths.channel_name().to_string();
    metadata.header.segment_number = Some(paths.segment_number());
    if let Some(session) = paths.session_name() {
        metadata.header.session_name = session.to_string();
    }
    let bytes = metadata.encode()?;

    fs::create_dir_all(paths.segment_dir())?;
    let path = paths.metadata_path();
    let mut file = create_new(&path)?;
    file.append(&bytes)?;
    file.sync()?;
    debug!("Created segment metadata {:?}", file.path());
    Ok(())
}

/// Writes `samples` as the data of an existing segment.
///
/// The data and index files are created, and the metadata file is replaced
/// atomically with the reconciled summary. On failure any partial data file is
/// left in place.
///
/// # Errors
///
/// - `Precondition` if the metadata file is missing or the data file exists.
/// - Any error of [`SegmentWriter::write_segment`].
pub fn write_segment_data(
    paths: &SegmentPaths,
    samples: &[i32],
    config: &WriterConfig,
) -> CoreResult<SegmentWrite> {
    let metadata_path = paths.metadata_path();
    if !metadata_path.exists() {
        return Err(CoreError::precondition(format!(
            "segment metadata does not exist: {}",
            metadata_path.display()
        )));
    }
    let data_path = paths.data_path();
    if data_path.exists() {
        return Err(CoreError::precondition(format!(
            "segment data already exists: {}",
            data_path.display()
        )));
    }
    let mut writer = SegmentWriter::new(config.clone());
    let metadata = read_segment_metadata(paths)?;
    writer.validate(&metadata, samples)?;

    let mut data = create_new(&data_path)?;
    let write = writer.write_segment(&metadata, samples, &mut data)?;

    let index_header = write.metadata.header.sibling(FileType::TimeSeriesIndex);
    let mut index = create_new(&paths.index_path())?;
    index.append(&encode_index_file(&index_header, &write.index)?)?;
    index.flush()?;
    if config.sync_on_finish {
        index.sync()?;
    }

    replace_file(&metadata_path, &write.metadata.encode()?)?;
    Ok(write)
}

/// Reads and verifies a segment's metadata file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or a format error if it
/// is corrupt.
pub fn read_segment_metadata(paths: &SegmentPaths) -> CoreResult<SegmentMetadata> {
    SegmentMetadata::decode(&read_file(&paths.metadata_path())?)
}

/// Reads and verifies a segment's index file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or a format error if it
/// is corrupt.
pub fn read_segment_index(paths: &SegmentPaths) -> CoreResult<(UniversalHeader, Vec<IndexRecord>)> {
    decode_index_file(&read_file(&paths.index_path())?)
}

/// Decodes every sample of a segment.
///
/// Checks the data file's body CRC, that the index tiles the data file, and
/// that each block matches its index record.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be read, or a format or codec error
/// if the segment is inconsistent.
pub fn read_segment_samples(paths: &SegmentPaths) -> CoreResult<Vec<i32>> {
    let data = read_file(&paths.data_path())?;
    let header = UniversalHeader::decode_expecting(&data, FileType::TimeSeriesData)?;
    let body = &data[UNIVERSAL_HEADER_BYTES..];
    let actual = compute_crc32(body);
    if actual != header.body_crc {
        return Err(CoreError::ChecksumMismatch {
            expected: header.body_crc,
            actual,
        });
    }

    let (_, records) = read_segment_index(paths)?;
    if records.len() as i64 != header.number_of_entries {
        return Err(CoreError::invalid_format(format!(
            "index holds {} records, data header announces {} blocks",
            records.len(),
            header.number_of_entries
        )));
    }
    check_contiguous(&records, UNIVERSAL_HEADER_BYTES as i64)?;
    if let Some(last) = records.last() {
        if last.end_offset() != data.len() as i64 {
            return Err(CoreError::invalid_format(format!(
                "index ends at offset {}, data file is {} bytes",
                last.end_offset(),
                data.len()
            )));
        }
    }

    let codec = DifferenceCodec::lossless();
    let mut samples = Vec::new();
    for (block, record) in records.iter().enumerate() {
        let start = record.file_offset as usize;
        let end = record.end_offset() as usize;
        let decoded = codec
            .decode(&data[start..end])
            .map_err(|source| CoreError::Codec {
                block: block as u64,
                source,
            })?;
        if decoded.len() != record.number_of_samples as usize {
            return Err(CoreError::invalid_format(format!(
                "block {block} decoded to {} samples, index says {}",
                decoded.len(),
                record.number_of_samples
            )));
        }
        samples.extend(decoded);
    }
    Ok(samples)
}

fn create_new(path: &Path) -> CoreResult<FileBackend> {
    FileBackend::create_new(path).map_err(|e| match e {
        StorageError::Io(io) if io.kind() == io::ErrorKind::AlreadyExists => {
            CoreError::precondition(format!("file already exists: {}", path.display()))
        }
        other => other.into(),
    })
}

fn read_file(path: &Path) -> CoreResult<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Replaces `path` with `data` via write-to-temp and rename.
fn replace_file(path: &Path, data: &[u8]) -> CoreResult<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    sync_parent(path)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> CoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::metadata::{Section3, TimeSeriesSection2};
    use crate::types::SegmentNumber;
    use tempfile::TempDir;

    const START: i64 = 946_684_800_000_000;

    fn setup() -> (TempDir, SegmentPaths) {
        let dir = TempDir::new().unwrap();
        let paths =
            SegmentPaths::new(&dir.path().join("ecg.timd"), SegmentNumber::new(0)).unwrap();
        (dir, paths)
    }

    fn metadata(fs: f64) -> SegmentMetadata {
        let section2 = TimeSeriesSection2 {
            sampling_frequency: fs,
            units_conversion_factor: 0.5,
            units_description: "µV".into(),
            ..TimeSeriesSection2::default()
        };
        let mut meta = SegmentMetadata::new(section2, Section3::default());
        meta.header.start_time = START;
        meta
    }

    #[test]
    fn metadata_file_created_with_layout_names() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(250.0)).unwrap();

        let read = read_segment_metadata(&paths).unwrap();
        assert_eq!(read.header.channel_name, "ecg");
        assert_eq!(read.header.segment_number, Some(SegmentNumber::new(0)));
        assert_eq!(read.section2.units_description, "µV");
    }

    #[test]
    fn metadata_not_overwritten() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(250.0)).unwrap();
        let err = write_segment_metadata(&paths, &metadata(500.0)).unwrap_err();

        assert!(matches!(err, CoreError::Precondition { .. }));
        assert_eq!(read_segment_metadata(&paths).unwrap().section2.sampling_frequency, 250.0);
    }

    #[test]
    fn full_segment_roundtrip() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(250.0)).unwrap();

        let samples: Vec<i32> = (0..2500).map(|i| ((i * 13) % 401) - 200).collect();
        let config = WriterConfig::new().samples_per_block(250);
        let write = write_segment_data(&paths, &samples, &config).unwrap();

        assert_eq!(read_segment_samples(&paths).unwrap(), samples);

        let meta = read_segment_metadata(&paths).unwrap();
        assert_eq!(meta.section2, write.metadata.section2);
        assert_eq!(meta.section2.number_of_samples, 2500);
        assert_eq!(meta.section2.number_of_blocks, 10);
        assert_eq!(meta.section2.recording_duration, 10_000_000);
        assert_eq!(meta.header.end_time, START + 10_000_000);
        assert_eq!(meta.section2.maximum_native_sample_value, 100.0);
        assert_eq!(meta.section2.minimum_native_sample_value, -100.0);

        let (index_header, records) = read_segment_index(&paths).unwrap();
        assert_eq!(records, write.index);
        assert_eq!(index_header.level_uuid, meta.header.level_uuid);
        assert_eq!(index_header.end_time, meta.header.end_time);
    }

    #[test]
    fn data_requires_metadata() {
        let (_dir, paths) = setup();
        let err = write_segment_data(&paths, &[1, 2, 3], &WriterConfig::new()).unwrap_err();

        assert!(matches!(err, CoreError::Precondition { .. }));
        assert!(!paths.data_path().exists());
    }

    #[test]
    fn data_never_overwritten() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(100.0)).unwrap();
        write_segment_data(&paths, &[1, 2, 3], &WriterConfig::new()).unwrap();

        let err = write_segment_data(&paths, &[4, 5, 6], &WriterConfig::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(read_segment_samples(&paths).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn invalid_config_creates_no_data_file() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(100.0)).unwrap();
        let config = WriterConfig::new().samples_per_block(0);

        assert!(write_segment_data(&paths, &[1, 2, 3], &config).is_err());
        assert!(!paths.data_path().exists());
    }

    #[test]
    fn session_name_taken_from_session_dir() {
        let dir = TempDir::new().unwrap();
        let channel = dir.path().join("night1.mefd").join("ecg.timd");
        let paths = SegmentPaths::new(&channel, SegmentNumber::new(0)).unwrap();
        let mut meta = metadata(250.0);
        meta.header.session_name = "ignored".into();

        write_segment_metadata(&paths, &meta).unwrap();

        let read = read_segment_metadata(&paths).unwrap();
        assert_eq!(read.header.session_name, "night1");
        assert_eq!(read.header.channel_name, "ecg");
    }

    #[test]
    fn session_name_kept_outside_session_dir() {
        let (_dir, paths) = setup();
        let mut meta = metadata(250.0);
        meta.header.session_name = "bench".into();

        write_segment_metadata(&paths, &meta).unwrap();
        assert_eq!(read_segment_metadata(&paths).unwrap().header.session_name, "bench");
    }

    #[test]
    fn empty_samples_create_no_data_file() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(100.0)).unwrap();

        let err = write_segment_data(&paths, &[], &WriterConfig::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!paths.data_path().exists());
        assert!(!paths.index_path().exists());

        write_segment_data(&paths, &[1, 2, 3], &WriterConfig::new()).unwrap();
        assert_eq!(read_segment_samples(&paths).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_sampling_frequency_creates_no_data_file() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(0.0)).unwrap();

        let err = write_segment_data(&paths, &[1, 2, 3], &WriterConfig::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!paths.data_path().exists());
    }

    #[test]
    fn unset_start_time_creates_no_data_file() {
        let (_dir, paths) = setup();
        let mut meta = metadata(100.0);
        meta.header.start_time = crate::types::UUTC_NO_ENTRY;
        write_segment_metadata(&paths, &meta).unwrap();

        let err = write_segment_data(&paths, &[1, 2, 3], &WriterConfig::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!paths.data_path().exists());
    }

    #[test]
    fn recording_time_offset_passed_through() {
        let (_dir, paths) = setup();
        let mut meta = metadata(100.0);
        meta.section3.recording_time_offset = 3_600_000_000;
        write_segment_metadata(&paths, &meta).unwrap();
        write_segment_data(&paths, &[5; 200], &WriterConfig::new()).unwrap();

        let read = read_segment_metadata(&paths).unwrap();
        assert_eq!(read.section3.recording_time_offset, 3_600_000_000);
        assert_eq!(read.header.start_time, START);
        assert_eq!(read.header.end_time, START + 2_000_000);

        let (_, records) = read_segment_index(&paths).unwrap();
        assert_eq!(records[0].start_time, START);
    }

    #[test]
    fn corrupted_data_detected() {
        let (_dir, paths) = setup();
        write_segment_metadata(&paths, &metadata(100.0)).unwrap();
        write_segment_data(&paths, &(0..100).collect::<Vec<_>>(), &WriterConfig::new()).unwrap();

        let mut bytes = fs::read(paths.data_path()).unwrap();
        let last = bytes.len() - 20;
        bytes[last] ^= 0x40;
        fs::write(paths.data_path(), bytes).unwrap();

        let err = read_segment_samples(&paths).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
