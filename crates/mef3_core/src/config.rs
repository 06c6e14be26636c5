//! Segment writer configuration.

use crate::error::{CoreError, CoreResult};

/// Configuration for a segment data write.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Number of samples per compressed block (the last block may be shorter).
    pub samples_per_block: u32,

    /// Whether blocks are quantised before compression.
    pub lossy: bool,

    /// Quantisation step applied in lossy mode.
    pub lossy_scale: u32,

    /// Whether to `fsync` the data file after the header patch.
    pub sync_on_finish: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            samples_per_block: 1000,
            lossy: false,
            lossy_scale: 1,
            sync_on_finish: true,
        }
    }
}

impl WriterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of samples per block.
    #[must_use]
    pub const fn samples_per_block(mut self, value: u32) -> Self {
        self.samples_per_block = value;
        self
    }

    /// Enables lossy compression with the given quantisation step.
    #[must_use]
    pub const fn lossy(mut self, scale: u32) -> Self {
        self.lossy = true;
        self.lossy_scale = scale;
        self
    }

    /// Sets whether to sync the data file when the write completes.
    #[must_use]
    pub const fn sync_on_finish(mut self, value: bool) -> Self {
        self.sync_on_finish = value;
        self
    }

    /// Checks the configuration before any I/O happens.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `samples_per_block` is zero, or if lossy
    /// mode is on with a zero quantisation step.
    pub fn validate(&self) -> CoreResult<()> {
        if self.samples_per_block == 0 {
            return Err(CoreError::invalid_argument(
                "samples_per_block must be at least 1",
            ));
        }
        if self.lossy && self.lossy_scale == 0 {
            return Err(CoreError::invalid_argument("lossy_scale must be at least 1"));
        }
        Ok(())
    }
}
