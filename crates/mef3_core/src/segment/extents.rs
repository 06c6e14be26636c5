//! Running extrema across the blocks of one write.

use crate::codec::BlockHeader;

/// Tracks global extrema and block counters while blocks are written.
///
/// Only a single contiguous run is modelled, so the contiguous block count
/// equals the number of observed blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentTracker {
    global_min: i32,
    global_max: i32,
    blocks: u64,
    maximum_difference_bytes: u32,
}

impl Default for ExtentTracker {
    fn default() -> Self {
        Self {
            global_min: i32::MAX,
            global_max: i32::MIN,
            blocks: 0,
            maximum_difference_bytes: 0,
        }
    }
}

impl ExtentTracker {
    /// Creates a tracker with sentinel extrema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one block's header into the running state.
    pub fn observe(&mut self, header: &BlockHeader) {
        self.global_min = self.global_min.min(header.min_sample);
        self.global_max = self.global_max.max(header.max_sample);
        self.maximum_difference_bytes = self.maximum_difference_bytes.max(header.difference_bytes);
        self.blocks += 1;
    }

    /// Smallest sample seen, or `i32::MAX` before any block.
    #[must_use]
    pub const fn global_min(&self) -> i32 {
        self.global_min
    }

    /// Largest sample seen, or `i32::MIN` before any block.
    #[must_use]
    pub const fn global_max(&self) -> i32 {
        self.global_max
    }

    /// Number of blocks in the (single) contiguous run.
    #[must_use]
    pub const fn contiguous_block_count(&self) -> u64 {
        self.blocks
    }

    /// Largest difference stream reported by the codec.
    #[must_use]
    pub const fn maximum_difference_bytes(&self) -> u32 {
        self.maximum_difference_bytes
    }

    /// Whether no block has been observed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.blocks == 0
    }
}
