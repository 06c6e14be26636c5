//! CLI command implementations.

pub mod init_metadata;
pub mod inspect;
pub mod verify;
pub mod write_data;
