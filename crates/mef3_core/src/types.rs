//! Core type definitions.

use std::fmt;

/// Time value used by MEF3 for "no entry" (µUTC).
pub const UUTC_NO_ENTRY: i64 = i64::MIN;

/// Number of a segment within a channel.
///
/// Segment numbers appear zero-padded to six digits in file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentNumber(pub u32);

impl SegmentNumber {
    /// Creates a new segment number.
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// Returns the raw number.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SegmentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}
