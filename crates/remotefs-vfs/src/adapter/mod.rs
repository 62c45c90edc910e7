//! The remote filesystem as a [`Fs`](crate::vfs::Fs) backend.
//!
//! Key components:
//!
//! - [`RemoteFs`] - filesystem operations over an owned mount
//! - [`RemoteHandle`] - open file and/or directory
//! - [`RemoteFileInfo`] - metadata record over a raw stat
//! - [`to_file_mode`], [`convert_err`] - mode and error translation
//!
//! ## Error shape
//!
//! Namespace operations wrap failures with the operation and path
//! (`mkdir /a/b: ...`). `stat` returns the translated error bare, so a
//! missing path is exactly [`VfsError::NotFound`](crate::vfs::VfsError).
//! Use [`VfsError::is_not_found`](crate::vfs::VfsError::is_not_found) to
//! test either shape.

mod error;
mod fs;
mod handle;
mod info;
mod mode;

pub use error::{convert_err, convert_result};
pub use fs::RemoteFs;
pub use handle::{Capability, RemoteHandle};
pub use info::RemoteFileInfo;
pub use mode::to_file_mode;
