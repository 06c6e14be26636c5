//! # MEF3 Testkit
//!
//! Test utilities for the MEF3 segment writer.
//!
//! This crate provides:
//! - Temporary channel directories with ready-made segment metadata
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mef3_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_segment() {
//!     let segment = TestSegment::new(250.0);
//!     let write = segment.write(&[1, 2, 3], 2);
//!     assert_eq!(write.index.len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
