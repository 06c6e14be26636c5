//! Init-metadata command implementation.

use mef3_core::{
    write_segment_metadata, SegmentMetadata, SegmentPaths, Section3, TimeSeriesSection2,
};
use tracing::info;

/// Channel settings recorded in a new segment's metadata.
#[derive(Debug, Clone)]
pub struct MetadataOptions {
    /// Sampling frequency (Hz).
    pub sampling_frequency: f64,
    /// Segment start time (µUTC).
    pub start_time: i64,
    /// Raw-to-native conversion factor.
    pub conversion_factor: f64,
    /// Native unit name.
    pub units: String,
    /// Session name when the channel has no enclosing `.mefd` directory.
    pub session: String,
    /// Channel description.
    pub description: String,
    /// Recording time offset (µs).
    pub recording_time_offset: i64,
}

/// Builds the metadata record for `options`.
pub fn build_metadata(options: &MetadataOptions) -> SegmentMetadata {
    let section2 = TimeSeriesSection2 {
        channel_description: options.description.clone(),
        sampling_frequency: options.sampling_frequency,
        units_conversion_factor: options.conversion_factor,
        units_description: options.units.clone(),
        ..TimeSeriesSection2::default()
    };
    let section3 = Section3 {
        recording_time_offset: options.recording_time_offset,
        ..Section3::default()
    };
    let mut metadata = SegmentMetadata::new(section2, section3);
    metadata.header.start_time = options.start_time;
    metadata.header.session_name = options.session.clone();
    metadata
}

/// Runs the init-metadata command.
pub fn run(paths: &SegmentPaths, options: &MetadataOptions) -> Result<(), Box<dyn std::error::Error>> {
    info!("Creating segment metadata in {:?}", paths.segment_dir());
    write_segment_metadata(paths, &build_metadata(options))?;
    println!("Created {}", paths.metadata_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mef3_core::{read_segment_metadata, SegmentNumber};
    use tempfile::TempDir;

    fn options() -> MetadataOptions {
        MetadataOptions {
            sampling_frequency: 500.0,
            start_time: 1_000_000,
            conversion_factor: -0.25,
            units: "mV".into(),
            session: "night-1".into(),
            description: "left temporal".into(),
            recording_time_offset: 0,
        }
    }

    #[test]
    fn writes_readable_metadata() {
        let dir = TempDir::new().unwrap();
        let paths = SegmentPaths::new(&dir.path().join("T3.timd"), SegmentNumber::new(1)).unwrap();

        run(&paths, &options()).unwrap();

        let meta = read_segment_metadata(&paths).unwrap();
        assert_eq!(meta.header.channel_name, "T3");
        assert_eq!(meta.header.session_name, "night-1");
        assert_eq!(meta.header.start_time, 1_000_000);
        assert_eq!(meta.section2.sampling_frequency, 500.0);
        assert_eq!(meta.section2.units_conversion_factor, -0.25);
    }

    #[test]
    fn session_dir_overrides_session_option() {
        let dir = TempDir::new().unwrap();
        let channel = dir.path().join("ward-3.mefd").join("T3.timd");
        let paths = SegmentPaths::new(&channel, SegmentNumber::new(0)).unwrap();

        run(&paths, &options()).unwrap();

        let meta = read_segment_metadata(&paths).unwrap();
        assert_eq!(meta.header.session_name, "ward-3");
    }

    #[test]
    fn refuses_existing_segment() {
        let dir = TempDir::new().unwrap();
        let paths = SegmentPaths::new(&dir.path().join("T3.timd"), SegmentNumber::new(1)).unwrap();

        run(&paths, &options()).unwrap();
        assert!(run(&paths, &options()).is_err());
    }
}
