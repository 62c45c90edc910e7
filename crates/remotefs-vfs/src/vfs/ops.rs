//! The generic filesystem contract.
//!
//! [`Fs`] is what callers program against; [`File`] is the handle it hands
//! out. Any backend implementing both can be swapped in for any other.

use std::io;
use std::time::SystemTime;

use super::error::{Listing, VfsResult};
use super::types::{FileInfo, FileMode, OpenFlags};

/// Core filesystem operations.
///
/// All calls block until the backend answers. Paths are slash-separated
/// strings passed through to the backend as given.
pub trait Fs {
    /// Metadata record returned by [`Fs::stat`] and directory listings.
    type Info: FileInfo;

    /// Open handle type.
    type File: File<Info = Self::Info>;

    /// Name of this filesystem implementation.
    fn name(&self) -> &str;

    // ========================================================================
    // Opening
    // ========================================================================

    /// Create or truncate a file, opened for reading and writing.
    fn create(&self, path: &str) -> VfsResult<Self::File>;

    /// Open a file read-only.
    fn open(&self, path: &str) -> VfsResult<Self::File> {
        self.open_file(path, OpenFlags::read(), FileMode::default())
    }

    /// Open a file with explicit flags; `perm` applies if it is created.
    fn open_file(&self, path: &str, flags: OpenFlags, perm: FileMode) -> VfsResult<Self::File>;

    // ========================================================================
    // Namespace
    // ========================================================================

    /// Create a single directory. Fails with already-exists if present;
    /// does not create parents.
    fn mkdir(&self, path: &str, perm: FileMode) -> VfsResult<()>;

    /// Create a directory and any missing parents. Succeeds if it already
    /// exists.
    fn mkdir_all(&self, path: &str, perm: FileMode) -> VfsResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&self, path: &str) -> VfsResult<()>;

    /// Remove a path and everything below it. Succeeds if the path does not
    /// exist.
    fn remove_all(&self, path: &str) -> VfsResult<()>;

    /// Rename a file or directory.
    fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Get file metadata.
    fn stat(&self, path: &str) -> VfsResult<Self::Info>;

    /// Change permission bits.
    fn chmod(&self, path: &str, mode: FileMode) -> VfsResult<()>;

    /// Change owner and group.
    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()>;

    /// Change access and modification times. Not every backend supports
    /// this.
    fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()>;

    /// Check if a path exists.
    fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// An open file or directory.
///
/// Sequential I/O goes through the `std::io` traits. Handles are not closed
/// on drop: call [`File::close`], or the backend resource leaks.
pub trait File: io::Read + io::Write + io::Seek {
    /// Metadata record type.
    type Info: FileInfo;

    /// The path this handle was opened with, unchanged.
    fn name(&self) -> &str;

    /// Read at an absolute offset without moving the cursor.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize>;

    /// Write at an absolute offset without moving the cursor.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize>;

    /// Write a string at the cursor.
    fn write_str(&mut self, s: &str) -> VfsResult<usize>;

    /// Metadata of the open file.
    fn stat(&mut self) -> VfsResult<Self::Info>;

    /// Flush data to the backend.
    fn sync(&mut self) -> VfsResult<()>;

    /// Resize the file.
    fn truncate(&mut self, size: u64) -> VfsResult<()>;

    /// Read up to `count` directory entries (`count <= 0` reads them all).
    ///
    /// Successive calls continue where the previous one stopped; a bounded
    /// call returning an empty vector means the directory is exhausted.
    /// Entry order is whatever the backend yields and is not stable across
    /// listings.
    fn readdir(&mut self, count: i64) -> Listing<Self::Info>;

    /// Like [`File::readdir`], returning only names.
    fn readdir_names(&mut self, count: i64) -> Listing<String>;

    /// Release the handle.
    fn close(self) -> VfsResult<()>
    where
        Self: Sized;
}
