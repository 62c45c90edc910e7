//! Virtual filesystem contract.
//!
//! Key components:
//!
//! - [`Fs`] / [`File`] - the backend-agnostic filesystem and handle traits
//! - [`FileInfo`], [`FileMode`], [`FileType`] - metadata model
//! - [`VfsError`] - shared error taxonomy
//! - [`listing`] - `readdir(count)` pagination over single-entry cursors
//!
//! ## Design Decisions
//!
//! - **Blocking**: every call runs to completion on the caller's thread.
//!   Concurrency guarantees are whatever the backend provides.
//! - **Explicit close**: handles hold backend resources until
//!   [`File::close`]; there is no cleanup on drop.
//! - **Paths pass through**: no normalization happens at this layer.

mod error;
pub mod listing;
mod ops;
mod types;

pub use error::{Listing, PartialListing, VfsError, VfsResult};
pub use ops::{File, Fs};
pub use types::{FileInfo, FileMode, FileType, OpenFlags, base_name, child_path};
