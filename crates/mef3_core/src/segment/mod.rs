//! Segment data writing.
//!
//! A segment write runs in four stages:
//!
//! 1. [`BlockSegmenter`] splits the sample buffer into [`BlockPlan`]s.
//! 2. [`SegmentWriter`] compresses each block through a
//!    [`BlockCodec`](crate::codec::BlockCodec) and appends it to the data file.
//! 3. [`ExtentTracker`] and [`IndexBuilder`] collect extrema and block
//!    locations as blocks land.
//! 4. [`MetadataReconciler`] turns the collected state into the segment
//!    summary stored in the metadata file.

mod extents;
mod index;
mod plan;
mod reconcile;
mod writer;

pub use extents::ExtentTracker;
pub use index::{
    check_contiguous, decode_index_file, encode_index_file, IndexBuilder, IndexRecord,
    INDEX_RECORD_BYTES,
};
pub use plan::{BlockPlan, BlockSegmenter};
pub use reconcile::MetadataReconciler;
pub use writer::{SegmentWrite, SegmentWriter};
