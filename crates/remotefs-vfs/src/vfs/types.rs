//! Core VFS types.
//!
//! These are backend-agnostic: a `FileMode` from the remote adapter and one
//! from the local backend mean the same thing.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// File type enumeration.
///
/// Every [`FileMode`] classifies as exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Block device.
    BlockDevice,
    /// Character device.
    CharDevice,
    /// Named pipe (FIFO).
    NamedPipe,
    /// Unix domain socket.
    Socket,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

bitflags! {
    /// Permission bits plus type and special-bit flags.
    ///
    /// The low nine bits are the usual `rwxrwxrwx` permissions. Type and
    /// setuid/setgid/sticky information lives in high flag bits, so a mode can
    /// be compared and combined without knowing which backend produced it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FileMode: u32 {
        const DIR = 1 << 31;
        const SYMLINK = 1 << 27;
        const DEVICE = 1 << 26;
        const NAMED_PIPE = 1 << 25;
        const SOCKET = 1 << 24;
        const SETUID = 1 << 23;
        const SETGID = 1 << 22;
        const CHAR_DEVICE = 1 << 21;
        const STICKY = 1 << 20;

        /// All type flags.
        const TYPE = Self::DIR.bits()
            | Self::SYMLINK.bits()
            | Self::DEVICE.bits()
            | Self::NAMED_PIPE.bits()
            | Self::SOCKET.bits()
            | Self::CHAR_DEVICE.bits();

        /// The permission bits.
        const PERM = 0o777;
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self::empty()
    }
}

impl FileMode {
    /// Permission bits only (`rwxrwxrwx`).
    pub const fn perm(self) -> u32 {
        self.bits() & Self::PERM.bits()
    }

    pub const fn is_dir(self) -> bool {
        self.contains(Self::DIR)
    }

    pub const fn is_symlink(self) -> bool {
        self.contains(Self::SYMLINK)
    }

    /// Returns true if no type flag is set.
    pub const fn is_regular(self) -> bool {
        !self.intersects(Self::TYPE)
    }

    /// Classify this mode into exactly one file type.
    pub fn file_type(self) -> FileType {
        if self.contains(Self::DIR) {
            FileType::Directory
        } else if self.contains(Self::SYMLINK) {
            FileType::Symlink
        } else if self.contains(Self::DEVICE) {
            if self.contains(Self::CHAR_DEVICE) {
                FileType::CharDevice
            } else {
                FileType::BlockDevice
            }
        } else if self.contains(Self::NAMED_PIPE) {
            FileType::NamedPipe
        } else if self.contains(Self::SOCKET) {
            FileType::Socket
        } else {
            FileType::File
        }
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }
}

/// Renders like `ls -l`: a type character followed by nine permission
/// characters, with `s`/`t` overlays for the special bits.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.file_type() {
            FileType::File => '-',
            FileType::Directory => 'd',
            FileType::Symlink => 'l',
            FileType::BlockDevice => 'b',
            FileType::CharDevice => 'c',
            FileType::NamedPipe => 'p',
            FileType::Socket => 's',
        };
        let mut out = String::with_capacity(10);
        out.push(kind);

        let perm = self.perm();
        let special = [
            self.contains(Self::SETUID),
            self.contains(Self::SETGID),
            self.contains(Self::STICKY),
        ];
        for (i, &set) in special.iter().enumerate() {
            let bits = (perm >> (6 - 3 * i)) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            let exec = bits & 0o1 != 0;
            let overlay = if i == 2 { 't' } else { 's' };
            out.push(match (set, exec) {
                (true, true) => overlay,
                (true, false) => overlay.to_ascii_uppercase(),
                (false, true) => 'x',
                (false, false) => '-',
            });
        }
        f.write_str(&out)
    }
}

/// Metadata about a file or directory.
pub trait FileInfo {
    /// Base name of the file.
    fn name(&self) -> &str;

    /// Length in bytes.
    fn size(&self) -> i64;

    /// Permission and type bits.
    fn mode(&self) -> FileMode;

    /// Last modification time.
    fn modified(&self) -> SystemTime;

    /// Returns true if this is a directory.
    fn is_dir(&self) -> bool {
        self.mode().is_dir()
    }
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write access (also enables read).
    pub fn write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Append to the end of the file on every write.
    pub fn append() -> Self {
        Self {
            read: true,
            write: true,
            append: true,
            ..Default::default()
        }
    }

    /// Create with write access.
    pub fn create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }
}

/// Last element of a slash-separated path.
///
/// Trailing slashes are ignored. An empty path yields `"."` and a path made
/// only of slashes yields `"/"`.
pub fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Join a directory path and an entry name the way listings build child
/// paths: plain concatenation with a `/`, no normalization.
pub fn child_path(parent: &str, name: &str) -> String {
    format!("{parent}/{name}")
}
