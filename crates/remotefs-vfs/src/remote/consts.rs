//! Numeric conventions of the remote client: open flags, packed mode bits
//! and errno values. These follow Linux numbering and are part of the
//! client's wire contract, independent of the host platform.

// Open flags.
pub const O_RDONLY: i32 = 0o0;
pub const O_WRONLY: i32 = 0o1;
pub const O_RDWR: i32 = 0o2;
pub const O_ACCMODE: i32 = 0o3;
pub const O_CREAT: i32 = 0o100;
pub const O_EXCL: i32 = 0o200;
pub const O_TRUNC: i32 = 0o1000;
pub const O_APPEND: i32 = 0o2000;

// Packed mode: type nibble.
pub const S_IFMT: u16 = 0o170000;
pub const S_IFSOCK: u16 = 0o140000;
pub const S_IFLNK: u16 = 0o120000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFBLK: u16 = 0o060000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFCHR: u16 = 0o020000;
pub const S_IFIFO: u16 = 0o010000;

// Packed mode: special bits.
pub const S_ISUID: u16 = 0o4000;
pub const S_ISGID: u16 = 0o2000;
pub const S_ISVTX: u16 = 0o1000;

// errno values. The client reports failures as the negated value.
pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EBADF: i32 = 9;
pub const EBUSY: i32 = 16;
pub const EEXIST: i32 = 17;
pub const ENOTDIR: i32 = 20;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const EFBIG: i32 = 27;
pub const ENOTEMPTY: i32 = 39;
pub const EISCONN: i32 = 106;
pub const ENOTCONN: i32 = 107;
pub const ESTALE: i32 = 116;

/// Short description for an errno value.
///
/// The remote renders errors with the Linux numbering and glibc wording no
/// matter where the client runs, so this is a fixed table rather than a
/// lookup in the host's libc. A test checks it against the host on
/// Linux/glibc.
pub fn strerror(errno: i32) -> &'static str {
    match errno {
        ENOENT => "No such file or directory",
        EIO => "Input/output error",
        EBADF => "Bad file descriptor",
        EBUSY => "Device or resource busy",
        EEXIST => "File exists",
        ENOTDIR => "Not a directory",
        EISDIR => "Is a directory",
        EINVAL => "Invalid argument",
        EFBIG => "File too large",
        ENOTEMPTY => "Directory not empty",
        EISCONN => "Transport endpoint is already connected",
        ENOTCONN => "Transport endpoint is not connected",
        ESTALE => "Stale file handle",
        _ => "Unknown error",
    }
}
