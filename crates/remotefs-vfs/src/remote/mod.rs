//! The remote filesystem client, as seen by the adapter.
//!
//! The networked client itself lives elsewhere; these traits describe the
//! primitives the adapter relies on. In production they are backed by the
//! real client library; [`MemoryRemote`] provides an in-process stand-in
//! with the same conventions.
//!
//! Every call blocks. Errors are [`RemoteError`] values carrying the
//! client's negative return codes.

pub mod consts;
mod error;
pub mod memory;

use std::io::SeekFrom;
use std::path::Path;

use crate::vfs::listing::NamedEntry;

pub use error::{RemoteError, RemoteResult};
pub use memory::MemoryRemote;

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: u32,
}

/// Extended stat result as returned by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawStat {
    pub ino: u64,
    /// Packed type nibble, special bits and permissions.
    pub mode: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

/// Entry type reported by the directory cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Fifo,
    Chr,
    Dir,
    Blk,
    Reg,
    Lnk,
    Sock,
    Unknown,
}

impl DType {
    /// Decode the `d_type` byte.
    pub fn from_raw(d_type: u8) -> Self {
        match d_type {
            1 => Self::Fifo,
            2 => Self::Chr,
            4 => Self::Dir,
            6 => Self::Blk,
            8 => Self::Reg,
            10 => Self::Lnk,
            12 => Self::Sock,
            _ => Self::Unknown,
        }
    }

    /// Derive the entry type from a packed mode.
    pub fn from_mode(mode: u16) -> Self {
        match mode & consts::S_IFMT {
            consts::S_IFIFO => Self::Fifo,
            consts::S_IFCHR => Self::Chr,
            consts::S_IFDIR => Self::Dir,
            consts::S_IFBLK => Self::Blk,
            consts::S_IFREG => Self::Reg,
            consts::S_IFLNK => Self::Lnk,
            consts::S_IFSOCK => Self::Sock,
            _ => Self::Unknown,
        }
    }
}

/// One entry from a directory cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirEntry {
    pub ino: u64,
    pub name: String,
    pub dtype: DType,
}

/// A directory entry together with its stat, from one cursor step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryPlus {
    pub entry: RawDirEntry,
    pub stat: RawStat,
}

impl NamedEntry for RawDirEntry {
    fn entry_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntry for DirEntryPlus {
    fn entry_name(&self) -> &str {
        &self.entry.name
    }
}

/// A mount of the remote filesystem.
///
/// Lifecycle: [`create_with_id`](RemoteMount::create_with_id), configure,
/// [`mount`](RemoteMount::mount), use, [`unmount`](RemoteMount::unmount),
/// [`release`](RemoteMount::release).
pub trait RemoteMount: Sized {
    /// Open file object.
    type File: RemoteFile;
    /// Open directory cursor.
    type Dir: RemoteDir;

    /// Allocate an unmounted client, optionally under a client id.
    fn create_with_id(id: Option<&str>) -> RemoteResult<Self>;

    /// Load client configuration from a file.
    fn read_config_file(&mut self, path: &Path) -> RemoteResult<()>;

    /// Load client configuration from the default search path.
    fn read_default_config_file(&mut self) -> RemoteResult<()>;

    /// Set a single configuration option.
    fn set_config_option(&mut self, key: &str, value: &str) -> RemoteResult<()>;

    /// Connect and mount.
    fn mount(&mut self) -> RemoteResult<()>;

    /// Unmount; the client can be released afterwards.
    fn unmount(&mut self) -> RemoteResult<()>;

    /// Free the client's resources.
    fn release(self) -> RemoteResult<()>;

    /// Open a file with POSIX flags; `mode` applies when creating.
    fn open(&self, path: &str, flags: i32, mode: u32) -> RemoteResult<Self::File>;

    /// Open a directory cursor.
    fn open_dir(&self, path: &str) -> RemoteResult<Self::Dir>;

    fn make_dir(&self, path: &str, mode: u32) -> RemoteResult<()>;

    /// Create a directory and any missing parents.
    fn make_dirs(&self, path: &str, mode: u32) -> RemoteResult<()>;

    fn remove_dir(&self, path: &str) -> RemoteResult<()>;

    fn unlink(&self, path: &str) -> RemoteResult<()>;

    fn rename(&self, from: &str, to: &str) -> RemoteResult<()>;

    fn statx(&self, path: &str) -> RemoteResult<RawStat>;

    fn chmod(&self, path: &str, mode: u32) -> RemoteResult<()>;

    fn chown(&self, path: &str, uid: u32, gid: u32) -> RemoteResult<()>;
}

/// An open remote file.
pub trait RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> RemoteResult<usize>;

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> RemoteResult<usize>;

    fn write(&mut self, buf: &[u8]) -> RemoteResult<usize>;

    fn write_at(&mut self, buf: &[u8], offset: u64) -> RemoteResult<usize>;

    fn seek(&mut self, pos: SeekFrom) -> RemoteResult<u64>;

    fn fstatx(&self) -> RemoteResult<RawStat>;

    fn sync(&mut self) -> RemoteResult<()>;

    fn truncate(&mut self, size: u64) -> RemoteResult<()>;

    fn close(&mut self) -> RemoteResult<()>;
}

/// An open remote directory with an implicit, forward-only cursor.
pub trait RemoteDir {
    /// Next entry, or `None` once the cursor is exhausted. Includes `.` and
    /// `..`.
    fn read_dir(&mut self) -> RemoteResult<Option<RawDirEntry>>;

    /// Like [`read_dir`](RemoteDir::read_dir), with the entry's stat.
    fn read_dir_plus(&mut self) -> RemoteResult<Option<DirEntryPlus>>;

    fn close(&mut self) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_from_raw() {
        assert_eq!(DType::from_raw(4), DType::Dir);
        assert_eq!(DType::from_raw(8), DType::Reg);
        assert_eq!(DType::from_raw(10), DType::Lnk);
        assert_eq!(DType::from_raw(0), DType::Unknown);
        assert_eq!(DType::from_raw(14), DType::Unknown);
    }

    #[test]
    fn test_dtype_from_mode() {
        assert_eq!(DType::from_mode(consts::S_IFDIR | 0o755), DType::Dir);
        assert_eq!(DType::from_mode(consts::S_IFREG | 0o644), DType::Reg);
        assert_eq!(DType::from_mode(consts::S_IFSOCK), DType::Sock);
        assert_eq!(DType::from_mode(0o644), DType::Unknown);
    }
}
