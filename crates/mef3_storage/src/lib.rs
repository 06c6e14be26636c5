//! # MEF3 Storage
//!
//! Byte-store backends underneath the MEF3 segment files.
//!
//! Backends are **opaque byte stores**: they know nothing about universal
//! headers, compressed blocks, or index records. `mef3_core` owns every
//! byte-level interpretation.
//!
//! ## Design Principles
//!
//! - Backends support reading, appending, flushing, and overwriting a range
//!   that has already been written (used for the one-time header patch)
//! - Must be `Send + Sync`
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use mef3_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"tdat header").unwrap();
//! backend.write_at(offset, b"TDAT").unwrap();
//! assert_eq!(&backend.read_at(0, 11).unwrap(), b"TDAT header");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
