//! # MEF3 Core
//!
//! Segment data writer for MEF3 time-series recordings.
//!
//! This crate provides:
//! - Block compression through the [`BlockCodec`](codec::BlockCodec) trait
//! - Segmentation of sample buffers into fixed-size blocks
//! - The segment writer producing the `.tdat` and `.tidx` files
//! - Reconciliation of the `.tmet` summary with what was written
//! - Encoding and decoding of all three segment files
//!
//! ## Example
//!
//! ```rust,ignore
//! use mef3_core::{write_segment_data, write_segment_metadata, SegmentPaths};
//!
//! let paths = SegmentPaths::new(Path::new("Fp1.timd"), SegmentNumber::new(0))?;
//! write_segment_metadata(&paths, &metadata)?;
//! let write = write_segment_data(&paths, &samples, &WriterConfig::new())?;
//! println!("{} blocks", write.index.len());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod crc;
mod error;
mod files;
mod header;
mod layout;
mod metadata;
pub mod segment;
mod types;

pub use codec::{BlockCodec, BlockFlags, CodecError, CompressedBlock, DifferenceCodec};
pub use config::WriterConfig;
pub use crc::{compute_crc32, Crc32};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use files::{
    read_segment_index, read_segment_metadata, read_segment_samples, write_segment_data,
    write_segment_metadata,
};
pub use header::{
    FileType, UniversalHeader, MEF_VERSION_MAJOR, MEF_VERSION_MINOR, UNIVERSAL_HEADER_BYTES,
};
pub use layout::{
    extract_segment_number, SegmentPaths, CHANNEL_EXTENSION, SEGMENT_EXTENSION, SESSION_EXTENSION,
};
pub use metadata::{SegmentMetadata, SegmentSummary, Section3, TimeSeriesSection2};
pub use segment::{
    BlockPlan, BlockSegmenter, ExtentTracker, IndexBuilder, IndexRecord, MetadataReconciler,
    SegmentWrite, SegmentWriter,
};
pub use types::{SegmentNumber, UUTC_NO_ENTRY};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
