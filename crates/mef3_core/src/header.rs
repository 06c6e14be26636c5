//! Universal header carried at the start of every segment file.
//!
//! ## Layout (little-endian, 256 bytes)
//!
//! ```text
//! | header_crc (4) | body_crc (4) | file_type (5) | version (2) | byte_order (1) |
//! | start_time (8) | end_time (8) | number_of_entries (8) | maximum_entry_size (8) |
//! | segment_number (4) | channel_name (64) | session_name (64) |
//! | file_uuid (16) | level_uuid (16) | provenance_uuid (16) | reserved (28) |
//! ```
//!
//! `header_crc` covers bytes `4..256`. `body_crc` covers every byte of the file
//! after the header.

use crate::crc::compute_crc32;
use crate::error::{CoreError, CoreResult};
use crate::types::{SegmentNumber, UUTC_NO_ENTRY};
use uuid::Uuid;

/// Size of the universal header in bytes.
pub const UNIVERSAL_HEADER_BYTES: usize = 256;

/// Major format version written to new files.
pub const MEF_VERSION_MAJOR: u8 = 3;

/// Minor format version written to new files.
pub const MEF_VERSION_MINOR: u8 = 0;

/// Maximum bytes of a channel or session name, excluding the terminator.
pub const NAME_BYTES: usize = 63;

const LITTLE_ENDIAN_CODE: u8 = 1;
const NO_SEGMENT: i32 = -1;

/// Type of a segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Time-series metadata (`.tmet`).
    TimeSeriesMetadata,
    /// Time-series compressed data (`.tdat`).
    TimeSeriesData,
    /// Time-series block index (`.tidx`).
    TimeSeriesIndex,
}

impl FileType {
    /// Returns the file extension, which is also the on-disk type string.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TimeSeriesMetadata => "tmet",
            Self::TimeSeriesData => "tdat",
            Self::TimeSeriesIndex => "tidx",
        }
    }

    fn from_code(code: &[u8]) -> Option<Self> {
        match code {
            b"tmet\0" => Some(Self::TimeSeriesMetadata),
            b"tdat\0" => Some(Self::TimeSeriesData),
            b"tidx\0" => Some(Self::TimeSeriesIndex),
            _ => None,
        }
    }

    fn code(self) -> [u8; 5] {
        let mut code = [0u8; 5];
        code[..4].copy_from_slice(self.extension().as_bytes());
        code
    }
}

/// Identity and provenance preamble of a segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversalHeader {
    /// CRC over the file body.
    pub body_crc: u32,
    /// Which segment file this header belongs to.
    pub file_type: FileType,
    /// Start of the recorded interval (µUTC).
    pub start_time: i64,
    /// End of the recorded interval (µUTC).
    pub end_time: i64,
    /// Number of entries in the body (blocks, index records, or 1 for metadata).
    pub number_of_entries: i64,
    /// Size of the largest entry in bytes.
    pub maximum_entry_size: i64,
    /// Segment this file belongs to.
    pub segment_number: Option<SegmentNumber>,
    /// Channel name.
    pub channel_name: String,
    /// Session name.
    pub session_name: String,
    /// Identity of this file.
    pub file_uuid: Uuid,
    /// Identity shared by the files of one segment.
    pub level_uuid: Uuid,
    /// Identity of the file this one was derived from.
    pub provenance_uuid: Uuid,
}

impl UniversalHeader {
    /// Creates a header for a new file with a fresh file UUID.
    #[must_use]
    pub fn new(file_type: FileType) -> Self {
        let file_uuid = Uuid::new_v4();
        Self {
            body_crc: 0,
            file_type,
            start_time: UUTC_NO_ENTRY,
            end_time: UUTC_NO_ENTRY,
            number_of_entries: 0,
            maximum_entry_size: 0,
            segment_number: None,
            channel_name: String::new(),
            session_name: String::new(),
            file_uuid,
            level_uuid: Uuid::new_v4(),
            provenance_uuid: file_uuid,
        }
    }

    /// Creates the header of a sibling file in the same segment.
    ///
    /// Names, segment number, times, and level UUID are inherited; the entry
    /// counters and body CRC start empty and the file gets its own UUID.
    #[must_use]
    pub fn sibling(&self, file_type: FileType) -> Self {
        let file_uuid = Uuid::new_v4();
        Self {
            body_crc: 0,
            file_type,
            number_of_entries: 0,
            maximum_entry_size: 0,
            file_uuid,
            provenance_uuid: file_uuid,
            channel_name: self.channel_name.clone(),
            session_name: self.session_name.clone(),
            ..*self
        }
    }

    /// Serialises the header and seals it with its CRC.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a name exceeds [`NAME_BYTES`].
    pub fn encode(&self) -> CoreResult<[u8; UNIVERSAL_HEADER_BYTES]> {
        let mut buf = [0u8; UNIVERSAL_HEADER_BYTES];

        buf[4..8].copy_from_slice(&self.body_crc.to_le_bytes());
        buf[8..13].copy_from_slice(&self.file_type.code());
        buf[13] = MEF_VERSION_MAJOR;
        buf[14] = MEF_VERSION_MINOR;
        buf[15] = LITTLE_ENDIAN_CODE;
        buf[16..24].copy_from_slice(&self.start_time.to_le_bytes());
        buf[24..32].copy_from_slice(&self.end_time.to_le_bytes());
        buf[32..40].copy_from_slice(&self.number_of_entries.to_le_bytes());
        buf[40..48].copy_from_slice(&self.maximum_entry_size.to_le_bytes());

        let segment = match self.segment_number {
            Some(number) => i32::try_from(number.as_u32())
                .map_err(|_| CoreError::invalid_argument("segment number out of range"))?,
            None => NO_SEGMENT,
        };
        buf[48..52].copy_from_slice(&segment.to_le_bytes());

        write_name(&mut buf[52..116], "channel_name", &self.channel_name)?;
        write_name(&mut buf[116..180], "session_name", &self.session_name)?;

        buf[180..196].copy_from_slice(self.file_uuid.as_bytes());
        buf[196..212].copy_from_slice(self.level_uuid.as_bytes());
        buf[212..228].copy_from_slice(self.provenance_uuid.as_bytes());

        let crc = compute_crc32(&buf[4..]);
        buf[0..4].copy_from_slice(&crc.to_le_bytes());

        Ok(buf)
    }

    /// Parses and verifies a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too short, the header CRC does not
    /// match, or a field is invalid.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < UNIVERSAL_HEADER_BYTES {
            return Err(CoreError::invalid_format(format!(
                "universal header needs {UNIVERSAL_HEADER_BYTES} bytes, got {}",
                data.len()
            )));
        }
        let data = &data[..UNIVERSAL_HEADER_BYTES];

        let stored_crc = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let computed_crc = compute_crc32(&data[4..]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let file_type = FileType::from_code(&data[8..13])
            .ok_or_else(|| CoreError::invalid_format("unknown file type code"))?;
        if data[13] != MEF_VERSION_MAJOR {
            return Err(CoreError::invalid_format(format!(
                "unsupported MEF major version: {}",
                data[13]
            )));
        }
        if data[15] != LITTLE_ENDIAN_CODE {
            return Err(CoreError::invalid_format("only little-endian files are supported"));
        }

        let i64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[at..at + 8]);
            i64::from_le_bytes(raw)
        };
        let uuid_at = |at: usize| {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&data[at..at + 16]);
            Uuid::from_bytes(raw)
        };

        let segment = i32::from_le_bytes([data[48], data[49], data[50], data[51]]);
        let segment_number = match segment {
            NO_SEGMENT => None,
            n => Some(SegmentNumber::new(u32::try_from(n).map_err(|_| {
                CoreError::invalid_format(format!("invalid segment number: {n}"))
            })?)),
        };

        Ok(Self {
            body_crc: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            file_type,
            start_time: i64_at(16),
            end_time: i64_at(24),
            number_of_entries: i64_at(32),
            maximum_entry_size: i64_at(40),
            segment_number,
            channel_name: read_name(&data[52..116], "channel_name")?,
            session_name: read_name(&data[116..180], "session_name")?,
            file_uuid: uuid_at(180),
            level_uuid: uuid_at(196),
            provenance_uuid: uuid_at(212),
        })
    }

    /// Parses a header and checks that it belongs to the expected file type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the file type differs, or any error of
    /// [`UniversalHeader::decode`].
    pub fn decode_expecting(data: &[u8], expected: FileType) -> CoreResult<Self> {
        let header = Self::decode(data)?;
        if header.file_type != expected {
            return Err(CoreError::invalid_format(format!(
                "expected a {} file, found {}",
                expected.extension(),
                header.file_type.extension()
            )));
        }
        Ok(header)
    }
}

fn write_name(dst: &mut [u8], field: &str, name: &str) -> CoreResult<()> {
    let bytes = name.as_bytes();
    if bytes.len() > NAME_BYTES {
        return Err(CoreError::invalid_argument(format!(
            "{field} is {} bytes, at most {NAME_BYTES} allowed",
            bytes.len()
        )));
    }
    dst[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn read_name(src: &[u8], field: &str) -> CoreResult<String> {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8(src[..end].to_vec())
        .map_err(|_| CoreError::invalid_format(format!("{field} is not valid UTF-8")))
}
