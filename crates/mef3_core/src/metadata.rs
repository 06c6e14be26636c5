//! Segment metadata (`.tmet`) record and file encoding.
//!
//! The metadata file is a universal header followed by one body entry holding
//! the time-series section 2 and section 3 fields. Numbers are little-endian;
//! strings are a `u16` byte length followed by UTF-8 bytes.

use crate::crc::compute_crc32;
use crate::error::{CoreError, CoreResult};
use crate::header::{FileType, UniversalHeader, UNIVERSAL_HEADER_BYTES};

/// Maximum bytes of a channel or session description.
pub const DESCRIPTION_BYTES: usize = 2047;
/// Maximum bytes of the reference description.
pub const REFERENCE_DESCRIPTION_BYTES: usize = 2047;
/// Maximum bytes of the units description.
pub const UNITS_DESCRIPTION_BYTES: usize = 127;
/// Maximum bytes of a subject name or ID.
pub const SUBJECT_FIELD_BYTES: usize = 127;
/// Maximum bytes of the recording location.
pub const RECORDING_LOCATION_BYTES: usize = 511;

/// Time-series section 2: channel description and data summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSection2 {
    /// Free-text channel description.
    pub channel_description: String,
    /// Free-text session description.
    pub session_description: String,
    /// Duration of the recorded data (µs).
    pub recording_duration: i64,
    /// Description of the reference electrode.
    pub reference_description: String,
    /// Channel number on the acquisition system.
    pub acquisition_channel_number: i64,
    /// Sampling frequency (Hz).
    pub sampling_frequency: f64,
    /// Low-frequency filter setting (Hz).
    pub low_frequency_filter_setting: f64,
    /// High-frequency filter setting (Hz).
    pub high_frequency_filter_setting: f64,
    /// Notch filter setting (Hz).
    pub notch_filter_frequency_setting: f64,
    /// Mains frequency (Hz).
    pub ac_line_frequency: f64,
    /// Factor mapping raw sample units to native units; sign-significant.
    pub units_conversion_factor: f64,
    /// Name of the native unit.
    pub units_description: String,
    /// Largest sample value in native units.
    pub maximum_native_sample_value: f64,
    /// Smallest sample value in native units.
    pub minimum_native_sample_value: f64,
    /// Index of the first sample of this segment within the channel.
    pub start_sample: i64,
    /// Samples in the segment.
    pub number_of_samples: i64,
    /// Blocks in the segment.
    pub number_of_blocks: i64,
    /// Largest compressed block (bytes).
    pub maximum_block_bytes: i64,
    /// Largest block (samples).
    pub maximum_block_samples: u32,
    /// Largest difference stream of any block (bytes).
    pub maximum_difference_bytes: u32,
    /// Nominal duration of a full block (µs).
    pub block_interval: i64,
    /// Number of contiguous runs.
    pub number_of_discontinuities: i64,
    /// Longest contiguous run (blocks).
    pub maximum_contiguous_blocks: i64,
    /// Longest contiguous run (bytes).
    pub maximum_contiguous_block_bytes: i64,
    /// Longest contiguous run (samples).
    pub maximum_contiguous_samples: i64,
}

impl Default for TimeSeriesSection2 {
    fn default() -> Self {
        Self {
            channel_description: String::new(),
            session_description: String::new(),
            recording_duration: -1,
            reference_description: String::new(),
            acquisition_channel_number: -1,
            sampling_frequency: -1.0,
            low_frequency_filter_setting: -1.0,
            high_frequency_filter_setting: -1.0,
            notch_filter_frequency_setting: -1.0,
            ac_line_frequency: -1.0,
            units_conversion_factor: 1.0,
            units_description: String::new(),
            maximum_native_sample_value: 0.0,
            minimum_native_sample_value: 0.0,
            start_sample: 0,
            number_of_samples: 0,
            number_of_blocks: 0,
            maximum_block_bytes: 0,
            maximum_block_samples: 0,
            maximum_difference_bytes: 0,
            block_interval: 0,
            number_of_discontinuities: 0,
            maximum_contiguous_blocks: 0,
            maximum_contiguous_block_bytes: 0,
            maximum_contiguous_samples: 0,
        }
    }
}

/// Section 3: subject and recording context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section3 {
    /// Recording time offset (µs). Stored and passed through as given; no
    /// stored time is shifted by it.
    pub recording_time_offset: i64,
    /// Start of daylight saving time (µUTC).
    pub dst_start_time: i64,
    /// End of daylight saving time (µUTC).
    pub dst_end_time: i64,
    /// Offset from GMT (seconds).
    pub gmt_offset: i32,
    /// Subject first name.
    pub subject_name_1: String,
    /// Subject last name.
    pub subject_name_2: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Where the recording took place.
    pub recording_location: String,
}

/// Summary statistics the segment writer derives from the blocks it wrote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSummary {
    /// Samples written.
    pub number_of_samples: i64,
    /// Blocks written.
    pub number_of_blocks: i64,
    /// Largest block (bytes).
    pub maximum_block_bytes: i64,
    /// Largest block (samples).
    pub maximum_block_samples: u32,
    /// Largest difference stream (bytes).
    pub maximum_difference_bytes: u32,
    /// Nominal full-block duration (µs).
    pub block_interval: i64,
    /// Number of contiguous runs.
    pub number_of_discontinuities: i64,
    /// Longest contiguous run (bytes).
    pub maximum_contiguous_block_bytes: i64,
    /// Longest contiguous run (blocks).
    pub maximum_contiguous_blocks: i64,
    /// Longest contiguous run (samples).
    pub maximum_contiguous_samples: i64,
    /// Largest value in native units.
    pub maximum_native_sample_value: f64,
    /// Smallest value in native units.
    pub minimum_native_sample_value: f64,
    /// Duration of the written samples (µs).
    pub recording_duration: i64,
}

impl From<&TimeSeriesSection2> for SegmentSummary {
    fn from(section2: &TimeSeriesSection2) -> Self {
        Self {
            number_of_samples: section2.number_of_samples,
            number_of_blocks: section2.number_of_blocks,
            maximum_block_bytes: section2.maximum_block_bytes,
            maximum_block_samples: section2.maximum_block_samples,
            maximum_difference_bytes: section2.maximum_difference_bytes,
            block_interval: section2.block_interval,
            number_of_discontinuities: section2.number_of_discontinuities,
            maximum_contiguous_block_bytes: section2.maximum_contiguous_block_bytes,
            maximum_contiguous_blocks: section2.maximum_contiguous_blocks,
            maximum_contiguous_samples: section2.maximum_contiguous_samples,
            maximum_native_sample_value: section2.maximum_native_sample_value,
            minimum_native_sample_value: section2.minimum_native_sample_value,
            recording_duration: section2.recording_duration,
        }
    }
}

/// Parsed contents of a segment metadata file.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMetadata {
    /// Universal header of the metadata file.
    pub header: UniversalHeader,
    /// Time-series section 2.
    pub section2: TimeSeriesSection2,
    /// Section 3.
    pub section3: Section3,
}

impl SegmentMetadata {
    /// Creates metadata with a fresh metadata-file header.
    #[must_use]
    pub fn new(section2: TimeSeriesSection2, section3: Section3) -> Self {
        Self {
            header: UniversalHeader::new(FileType::TimeSeriesMetadata),
            section2,
            section3,
        }
    }

    /// Returns the summary currently recorded in section 2.
    #[must_use]
    pub fn summary(&self) -> SegmentSummary {
        SegmentSummary::from(&self.section2)
    }

    /// Returns a copy with `summary` folded into section 2 and the header end
    /// time moved to the end of the recorded data.
    #[must_use]
    pub fn with_summary(&self, summary: &SegmentSummary) -> Self {
        let mut updated = self.clone();
        let s2 = &mut updated.section2;
        s2.number_of_samples = summary.number_of_samples;
        s2.number_of_blocks = summary.number_of_blocks;
        s2.maximum_block_bytes = summary.maximum_block_bytes;
        s2.maximum_block_samples = summary.maximum_block_samples;
        s2.maximum_difference_bytes = summary.maximum_difference_bytes;
        s2.block_interval = summary.block_interval;
        s2.number_of_discontinuities = summary.number_of_discontinuities;
        s2.maximum_contiguous_block_bytes = summary.maximum_contiguous_block_bytes;
        s2.maximum_contiguous_blocks = summary.maximum_contiguous_blocks;
        s2.maximum_contiguous_samples = summary.maximum_contiguous_samples;
        s2.maximum_native_sample_value = summary.maximum_native_sample_value;
        s2.minimum_native_sample_value = summary.minimum_native_sample_value;
        s2.recording_duration = summary.recording_duration;
        updated.header.end_time = updated
            .header
            .start_time
            .saturating_add(summary.recording_duration);
        updated
    }

    /// Encodes the full metadata file (header and body).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a text field exceeds its MEF width.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let body = self.encode_body()?;

        let mut header = self.header.clone();
        header.file_type = FileType::TimeSeriesMetadata;
        header.number_of_entries = 1;
        header.maximum_entry_size = body.len() as i64;
        header.body_crc = compute_crc32(&body);

        let mut buf = Vec::with_capacity(UNIVERSAL_HEADER_BYTES + body.len());
        buf.extend_from_slice(&header.encode()?);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decodes and verifies a metadata file.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or body is corrupt or truncated.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let header = UniversalHeader::decode_expecting(data, FileType::TimeSeriesMetadata)?;
        let body = &data[UNIVERSAL_HEADER_BYTES..];

        let computed = compute_crc32(body);
        if computed != header.body_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: header.body_crc,
                actual: computed,
            });
        }

        let mut r = BodyReader::new(body);
        let section2 = TimeSeriesSection2 {
            channel_description: r.string("channel_description")?,
            session_description: r.string("session_description")?,
            recording_duration: r.i64()?,
            reference_description: r.string("reference_description")?,
            acquisition_channel_number: r.i64()?,
            sampling_frequency: r.f64()?,
            low_frequency_filter_setting: r.f64()?,
            high_frequency_filter_setting: r.f64()?,
            notch_filter_frequency_setting: r.f64()?,
            ac_line_frequency: r.f64()?,
            units_conversion_factor: r.f64()?,
            units_description: r.string("units_description")?,
            maximum_native_sample_value: r.f64()?,
            minimum_native_sample_value: r.f64()?,
            start_sample: r.i64()?,
            number_of_samples: r.i64()?,
            number_of_blocks: r.i64()?,
            maximum_block_bytes: r.i64()?,
            maximum_block_samples: r.u32()?,
            maximum_difference_bytes: r.u32()?,
            block_interval: r.i64()?,
            number_of_discontinuities: r.i64()?,
            maximum_contiguous_blocks: r.i64()?,
            maximum_contiguous_block_bytes: r.i64()?,
            maximum_contiguous_samples: r.i64()?,
        };
        let section3 = Section3 {
            recording_time_offset: r.i64()?,
            dst_start_time: r.i64()?,
            dst_end_time: r.i64()?,
            gmt_offset: r.i32()?,
            subject_name_1: r.string("subject_name_1")?,
            subject_name_2: r.string("subject_name_2")?,
            subject_id: r.string("subject_id")?,
            recording_location: r.string("recording_location")?,
        };
        r.finish()?;

        Ok(Self {
            header,
            section2,
            section3,
        })
    }

    fn encode_body(&self) -> CoreResult<Vec<u8>> {
        let s2 = &self.section2;
        let s3 = &self.section3;
        let mut buf = Vec::with_capacity(512);

        put_string(&mut buf, "channel_description", &s2.channel_description, DESCRIPTION_BYTES)?;
        put_string(&mut buf, "session_description", &s2.session_description, DESCRIPTION_BYTES)?;
        buf.extend_from_slice(&s2.recording_duration.to_le_bytes());
        put_string(
            &mut buf,
            "reference_description",
            &s2.reference_description,
            REFERENCE_DESCRIPTION_BYTES,
        )?;
        buf.extend_from_slice(&s2.acquisition_channel_number.to_le_bytes());
        for value in [
            s2.sampling_frequency,
            s2.low_frequency_filter_setting,
            s2.high_frequency_filter_setting,
            s2.notch_filter_frequency_setting,
            s2.ac_line_frequency,
            s2.units_conversion_factor,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        put_string(&mut buf, "units_description", &s2.units_description, UNITS_DESCRIPTION_BYTES)?;
        buf.extend_from_slice(&s2.maximum_native_sample_value.to_le_bytes());
        buf.extend_from_slice(&s2.minimum_native_sample_value.to_le_bytes());
        for value in [
            s2.start_sample,
            s2.number_of_samples,
            s2.number_of_blocks,
            s2.maximum_block_bytes,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&s2.maximum_block_samples.to_le_bytes());
        buf.extend_from_slice(&s2.maximum_difference_bytes.to_le_bytes());
        for value in [
            s2.block_interval,
            s2.number_of_discontinuities,
            s2.maximum_contiguous_blocks,
            s2.maximum_contiguous_block_bytes,
            s2.maximum_contiguous_samples,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }

        buf.extend_from_slice(&s3.recording_time_offset.to_le_bytes());
        buf.extend_from_slice(&s3.dst_start_time.to_le_bytes());
        buf.extend_from_slice(&s3.dst_end_time.to_le_bytes());
        buf.extend_from_slice(&s3.gmt_offset.to_le_bytes());
        put_string(&mut buf, "subject_name_1", &s3.subject_name_1, SUBJECT_FIELD_BYTES)?;
        put_string(&mut buf, "subject_name_2", &s3.subject_name_2, SUBJECT_FIELD_BYTES)?;
        put_string(&mut buf, "subject_id", &s3.subject_id, SUBJECT_FIELD_BYTES)?;
        put_string(
            &mut buf,
            "recording_location",
            &s3.recording_location,
            RECORDING_LOCATION_BYTES,
        )?;

        Ok(buf)
    }
}

fn put_string(buf: &mut Vec<u8>, field: &str, value: &str, limit: usize) -> CoreResult<()> {
    let bytes = value.as_bytes();
    if bytes.len() > limit {
        return Err(CoreError::invalid_argument(format!(
            "{field} is {} bytes, at most {limit} allowed",
            bytes.len()
        )));
    }
    // limit < u16::MAX for every field
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct BodyReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> BodyReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn take<const N: usize>(&mut self) -> CoreResult<[u8; N]> {
        let end = self.cursor + N;
        if end > self.data.len() {
            return Err(CoreError::invalid_format("metadata body too short"));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.cursor..end]);
        self.cursor = end;
        Ok(out)
    }

    fn u32(&mut self) -> CoreResult<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn i32(&mut self) -> CoreResult<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> CoreResult<i64> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn f64(&mut self) -> CoreResult<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn string(&mut self, field: &str) -> CoreResult<String> {
        let len = usize::from(u16::from_le_bytes(self.take()?));
        let end = self.cursor + len;
        if end > self.data.len() {
            return Err(CoreError::invalid_format(format!("{field} runs past end of metadata")));
        }
        let value = std::str::from_utf8(&self.data[self.cursor..end])
            .map_err(|_| CoreError::invalid_format(format!("{field} is not valid UTF-8")))?;
        self.cursor = end;
        Ok(value.to_string())
    }

    fn finish(self) -> CoreResult<()> {
        if self.cursor != self.data.len() {
            return Err(CoreError::invalid_format(format!(
                "{} trailing bytes after metadata body",
                self.data.len() - self.cursor
            )));
        }
        Ok(())
    }
}
