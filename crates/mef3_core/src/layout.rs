//! Segment directory layout.
//!
//! ```text
//! [<session>.mefd/]
//! <channel>.timd/
//! └─ <channel>-NNNNNN.segd/
//!    ├─ <channel>-NNNNNN.tmet   # metadata
//!    ├─ <channel>-NNNNNN.tdat   # compressed blocks
//!    └─ <channel>-NNNNNN.tidx   # block index
//! ```

use crate::error::{CoreError, CoreResult};
use crate::header::FileType;
use crate::types::SegmentNumber;
use std::path::{Path, PathBuf};

/// Extension of a session directory.
pub const SESSION_EXTENSION: &str = "mefd";
/// Extension of a time-series channel directory.
pub const CHANNEL_EXTENSION: &str = "timd";
/// Extension of a segment directory.
pub const SEGMENT_EXTENSION: &str = "segd";

/// Paths of one segment inside a channel directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPaths {
    session_name: Option<String>,
    channel_name: String,
    segment_number: SegmentNumber,
    segment_dir: PathBuf,
}

impl SegmentPaths {
    /// Resolves the paths of segment `segment_number` of `channel_dir`.
    ///
    /// When `channel_dir` sits inside a `.mefd` directory, its stem becomes
    /// the session name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `channel_dir` does not end in `.timd`.
    pub fn new(channel_dir: &Path, segment_number: SegmentNumber) -> CoreResult<Self> {
        let extension = channel_dir.extension().and_then(|e| e.to_str());
        if extension != Some(CHANNEL_EXTENSION) {
            return Err(CoreError::invalid_argument(format!(
                "channel directory must have a .{CHANNEL_EXTENSION} extension: {}",
                channel_dir.display()
            )));
        }
        let channel_name = channel_dir
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CoreError::invalid_argument(format!(
                    "channel directory has no usable name: {}",
                    channel_dir.display()
                ))
            })?
            .to_string();

        let session_name = channel_dir
            .parent()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SESSION_EXTENSION))
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let segment_dir =
            channel_dir.join(format!("{channel_name}-{segment_number}.{SEGMENT_EXTENSION}"));
        Ok(Self {
            session_name,
            channel_name,
            segment_number,
            segment_dir,
        })
    }

    /// Session name derived from an enclosing `.mefd` directory, if any.
    #[must_use]
    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    /// Channel name derived from the channel directory.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Segment number.
    #[must_use]
    pub fn segment_number(&self) -> SegmentNumber {
        self.segment_number
    }

    /// The `.segd` directory.
    #[must_use]
    pub fn segment_dir(&self) -> &Path {
        &self.segment_dir
    }

    /// Path of the segment file of the given type.
    #[must_use]
    pub fn file(&self, file_type: FileType) -> PathBuf {
        self.segment_dir.join(format!(
            "{}-{}.{}",
            self.channel_name,
            self.segment_number,
            file_type.extension()
        ))
    }

    /// Path of the `.tmet` file.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.file(FileType::TimeSeriesMetadata)
    }

    /// Path of the `.tdat` file.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.file(FileType::TimeSeriesData)
    }

    /// Path of the `.tidx` file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.file(FileType::TimeSeriesIndex)
    }
}

/// Parses the trailing `-NNNNNN` segment number of a segment or file name.
///
/// Any extension is ignored, so `"Fp1-000003"`, `"Fp1-000003.segd"` and
/// `"Fp1-000003.tdat"` all yield segment 3.
///
/// # Errors
///
/// Returns `InvalidArgument` if the name has no numeric suffix.
pub fn extract_segment_number(name: &str) -> CoreResult<SegmentNumber> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let digits = stem
        .rsplit_once('-')
        .map(|(_, digits)| digits)
        .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| {
            CoreError::invalid_argument(format!("no segment number in name: {name}"))
        })?;
    digits
        .parse::<u32>()
        .map(SegmentNumber::new)
        .map_err(|_| CoreError::invalid_argument(format!("segment number out of range: {name}")))
}
