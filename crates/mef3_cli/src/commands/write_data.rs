//! Write-data command implementation.

use mef3_core::{write_segment_data, SegmentPaths, SegmentWrite, WriterConfig};
use std::fs;
use std::path::Path;
use tracing::info;

const SAMPLE_BYTES: usize = 4;

/// Reads a file of raw little-endian `i32` samples.
pub fn read_raw_samples(path: &Path) -> Result<Vec<i32>, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    if bytes.len() % SAMPLE_BYTES != 0 {
        return Err(format!(
            "{:?} is {} bytes, not a whole number of 32-bit samples",
            path,
            bytes.len()
        )
        .into());
    }
    Ok(bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Compresses the samples in `input` into the segment at `paths`.
pub fn write(
    paths: &SegmentPaths,
    input: &Path,
    config: &WriterConfig,
) -> Result<SegmentWrite, Box<dyn std::error::Error>> {
    let samples = read_raw_samples(input)?;
    info!("Writing {} samples from {:?}", samples.len(), input);
    Ok(write_segment_data(paths, &samples, config)?)
}

/// Runs the write-data command.
pub fn run(
    paths: &SegmentPaths,
    input: &Path,
    config: &WriterConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let write = write(paths, input, config)?;
    let s2 = &write.metadata.section2;
    println!("Wrote {}", paths.data_path().display());
    println!("  Samples:  {}", s2.number_of_samples);
    println!("  Blocks:   {}", s2.number_of_blocks);
    println!("  Duration: {} µs", s2.recording_duration);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init_metadata::{self, MetadataOptions};
    use mef3_core::{read_segment_samples, SegmentNumber};
    use tempfile::TempDir;

    fn raw_file(dir: &Path, samples: &[i32]) -> std::path::PathBuf {
        let path = dir.join("samples.raw");
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        fs::write(&path, bytes).unwrap();
        path
    }

    fn segment(dir: &Path) -> SegmentPaths {
        let paths = SegmentPaths::new(&dir.join("O1.timd"), SegmentNumber::new(0)).unwrap();
        let options = MetadataOptions {
            sampling_frequency: 100.0,
            start_time: 0,
            conversion_factor: 1.0,
            units: "µV".into(),
            session: String::new(),
            description: String::new(),
            recording_time_offset: 0,
        };
        init_metadata::run(&paths, &options).unwrap();
        paths
    }

    #[test]
    fn writes_samples_from_raw_file() {
        let dir = TempDir::new().unwrap();
        let paths = segment(dir.path());
        let samples: Vec<i32> = (0..350).map(|i| i * i - 1000).collect();
        let input = raw_file(dir.path(), &samples);

        let config = WriterConfig::new().samples_per_block(100);
        let write = write(&paths, &input, &config).unwrap();

        assert_eq!(write.index.len(), 4);
        assert_eq!(read_segment_samples(&paths).unwrap(), samples);
    }

    #[test]
    fn ragged_input_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.raw");
        fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();

        assert!(read_raw_samples(&path).is_err());
    }

    #[test]
    fn missing_metadata_rejected() {
        let dir = TempDir::new().unwrap();
        let paths = SegmentPaths::new(&dir.path().join("O2.timd"), SegmentNumber::new(0)).unwrap();
        let input = raw_file(dir.path(), &[1, 2, 3]);

        assert!(write(&paths, &input, &WriterConfig::new()).is_err());
        assert!(!paths.data_path().exists());
    }
}
