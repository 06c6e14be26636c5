//! Inspect command implementation.

use mef3_core::{read_segment_index, read_segment_metadata, IndexRecord, SegmentPaths};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Segment inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Segment directory.
    pub path: String,
    /// Channel name from the metadata header.
    pub channel: String,
    /// Segment number.
    pub segment: u32,
    /// Segment start (µUTC).
    pub start_time: i64,
    /// Segment end (µUTC).
    pub end_time: i64,
    /// Sampling frequency (Hz).
    pub sampling_frequency: f64,
    /// Samples recorded in the metadata.
    pub number_of_samples: i64,
    /// Blocks recorded in the metadata.
    pub number_of_blocks: i64,
    /// Largest block in bytes.
    pub maximum_block_bytes: i64,
    /// Largest native sample value.
    pub maximum_native_sample_value: f64,
    /// Smallest native sample value.
    pub minimum_native_sample_value: f64,
    /// Native unit name.
    pub units: String,
    /// Data file size in bytes (0 before data is written).
    pub data_size: u64,
    /// Index records (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockStats>>,
}

/// Statistics for a single block.
#[derive(Debug, Serialize)]
pub struct BlockStats {
    /// Offset within the data file.
    pub file_offset: i64,
    /// First sample time (µUTC).
    pub start_time: i64,
    /// First sample index.
    pub start_sample: i64,
    /// Samples in the block.
    pub samples: u32,
    /// Compressed size in bytes.
    pub bytes: u32,
    /// Largest raw sample.
    pub max: i32,
    /// Smallest raw sample.
    pub min: i32,
    /// Block starts a contiguous run.
    pub discontinuity: bool,
}

impl From<&IndexRecord> for BlockStats {
    fn from(record: &IndexRecord) -> Self {
        Self {
            file_offset: record.file_offset,
            start_time: record.start_time,
            start_sample: record.start_sample,
            samples: record.number_of_samples,
            bytes: record.block_bytes,
            max: record.max_sample_value,
            min: record.min_sample_value,
            discontinuity: record.flags.is_discontinuity(),
        }
    }
}

/// Collects the inspection result for a segment.
pub fn inspect(
    paths: &SegmentPaths,
    show_index: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !paths.metadata_path().exists() {
        return Err(format!("No segment found at {:?}", paths.segment_dir()).into());
    }

    let metadata = read_segment_metadata(paths)?;
    let s2 = &metadata.section2;
    let data_path = paths.data_path();

    let mut result = InspectResult {
        path: paths.segment_dir().display().to_string(),
        channel: metadata.header.channel_name.clone(),
        segment: paths.segment_number().as_u32(),
        start_time: metadata.header.start_time,
        end_time: metadata.header.end_time,
        sampling_frequency: s2.sampling_frequency,
        number_of_samples: s2.number_of_samples,
        number_of_blocks: s2.number_of_blocks,
        maximum_block_bytes: s2.maximum_block_bytes,
        maximum_native_sample_value: s2.maximum_native_sample_value,
        minimum_native_sample_value: s2.minimum_native_sample_value,
        units: s2.units_description.clone(),
        data_size: 0,
        blocks: None,
    };

    if data_path.exists() {
        result.data_size = fs::metadata(&data_path)?.len();
    }
    if show_index && paths.index_path().exists() {
        let (_, records) = read_segment_index(paths)?;
        result.blocks = Some(records.iter().map(BlockStats::from).collect());
    }

    Ok(result)
}

/// Runs the inspect command.
pub fn run(
    paths: &SegmentPaths,
    show_index: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(paths, show_index)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("MEF3 Segment Inspection");
    println!("=======================");
    println!();
    println!("Path:    {}", result.path);
    println!("Channel: {} (segment {})", result.channel, result.segment);
    println!();
    println!("Timing:");
    println!("  Start:              {}", result.start_time);
    println!("  End:                {}", result.end_time);
    println!("  Sampling frequency: {} Hz", result.sampling_frequency);
    println!();
    println!("Data:");
    println!("  Samples:     {}", result.number_of_samples);
    println!("  Blocks:      {}", result.number_of_blocks);
    println!("  Max block:   {} bytes", result.maximum_block_bytes);
    println!("  Data size:   {}", format_size(result.data_size));
    println!(
        "  Range:       {} .. {} {}",
        result.minimum_native_sample_value, result.maximum_native_sample_value, result.units
    );

    if let Some(blocks) = &result.blocks {
        println!();
        println!("Blocks:");
        for (i, block) in blocks.iter().enumerate() {
            println!(
                "  [{}] offset {}, sample {}, {} samples, {} bytes, [{}, {}]{}",
                i,
                block.file_offset,
                block.start_sample,
                block.samples,
                block.bytes,
                block.min,
                block.max,
                if block.discontinuity { " D" } else { "" }
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mef3_core::{
        write_segment_data, write_segment_metadata, SegmentMetadata, SegmentNumber, Section3,
        TimeSeriesSection2, WriterConfig,
    };
    use tempfile::TempDir;

    fn segment(dir: &Path, with_data: bool) -> SegmentPaths {
        let paths = SegmentPaths::new(&dir.join("Cz.timd"), SegmentNumber::new(4)).unwrap();
        let section2 = TimeSeriesSection2 {
            sampling_frequency: 200.0,
            ..TimeSeriesSection2::default()
        };
        let mut metadata = SegmentMetadata::new(section2, Section3::default());
        metadata.header.start_time = 0;
        write_segment_metadata(&paths, &metadata).unwrap();
        if with_data {
            let samples: Vec<i32> = (0..450).collect();
            write_segment_data(&paths, &samples, &WriterConfig::new().samples_per_block(200))
                .unwrap();
        }
        paths
    }

    #[test]
    fn reports_metadata_summary() {
        let dir = TempDir::new().unwrap();
        let paths = segment(dir.path(), true);

        let result = inspect(&paths, false).unwrap();
        assert_eq!(result.channel, "Cz");
        assert_eq!(result.segment, 4);
        assert_eq!(result.number_of_samples, 450);
        assert_eq!(result.number_of_blocks, 3);
        assert_eq!(result.data_size, fs::metadata(paths.data_path()).unwrap().len());
        assert!(result.data_size > 256);
        assert!(result.blocks.is_none());
    }

    #[test]
    fn lists_blocks_on_request() {
        let dir = TempDir::new().unwrap();
        let paths = segment(dir.path(), true);

        let blocks = inspect(&paths, true).unwrap().blocks.unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].discontinuity);
        assert_eq!(blocks[2].samples, 50);
        assert_eq!(blocks[2].max, 449);
    }

    #[test]
    fn metadata_only_segment() {
        let dir = TempDir::new().unwrap();
        let paths = segment(dir.path(), false);

        let result = inspect(&paths, true).unwrap();
        assert_eq!(result.data_size, 0);
        assert!(result.blocks.is_none());
        assert!(!paths.data_path().exists());
        assert!(!paths.index_path().exists());
    }

    #[test]
    fn json_output_serialises() {
        let dir = TempDir::new().unwrap();
        let paths = segment(dir.path(), true);

        let json = serde_json::to_value(inspect(&paths, true).unwrap()).unwrap();
        assert_eq!(json["number_of_blocks"], 3);
        assert_eq!(json["blocks"][1]["start_sample"], 200);
    }

    #[test]
    fn missing_segment_reported() {
        let dir = TempDir::new().unwrap();
        let paths = SegmentPaths::new(&dir.path().join("Pz.timd"), SegmentNumber::new(0)).unwrap();
        assert!(inspect(&paths, false).is_err());
    }
}
