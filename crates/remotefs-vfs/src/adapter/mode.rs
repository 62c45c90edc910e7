//! Packed remote mode to [`FileMode`].

use crate::remote::consts::{
    S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFSOCK, S_ISGID, S_ISUID, S_ISVTX,
};
use crate::vfs::FileMode;

/// Translate a packed 16-bit remote mode into the generic representation.
///
/// The type nibble picks at most one type flag; an unrecognised nibble
/// yields none. Special bits are carried over independently of the type.
pub fn to_file_mode(raw: u16) -> FileMode {
    let mut mode = FileMode::from_bits_retain(u32::from(raw) & FileMode::PERM.bits());

    mode |= match raw & S_IFMT {
        S_IFBLK => FileMode::DEVICE,
        S_IFCHR => FileMode::DEVICE | FileMode::CHAR_DEVICE,
        S_IFDIR => FileMode::DIR,
        S_IFIFO => FileMode::NAMED_PIPE,
        S_IFLNK => FileMode::SYMLINK,
        S_IFSOCK => FileMode::SOCKET,
        // regular files and unknown nibbles carry no type flag
        _ => FileMode::empty(),
    };

    if raw & S_ISUID != 0 {
        mode |= FileMode::SETUID;
    }
    if raw & S_ISGID != 0 {
        mode |= FileMode::SETGID;
    }
    if raw & S_ISVTX != 0 {
        mode |= FileMode::STICKY;
    }
    mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::consts::S_IFREG;
    use crate::vfs::FileType;

    #[test]
    fn test_type_nibbles() {
        let cases = [
            (S_IFREG, FileType::File),
            (S_IFDIR, FileType::Directory),
            (S_IFLNK, FileType::Symlink),
            (S_IFBLK, FileType::BlockDevice),
            (S_IFCHR, FileType::CharDevice),
            (S_IFIFO, FileType::NamedPipe),
            (S_IFSOCK, FileType::Socket),
        ];
        for (nibble, expected) in cases {
            let mode = to_file_mode(nibble | 0o644);
            assert_eq!(mode.file_type(), expected, "nibble {nibble:o}");
            assert_eq!(mode.perm(), 0o644);
        }
    }

    #[test]
    fn test_regular_has_no_type_flag() {
        let mode = to_file_mode(S_IFREG | 0o755);
        assert_eq!(mode.bits() & FileMode::TYPE.bits(), 0);
        assert!(mode.is_regular());
    }

    #[test]
    fn test_unknown_nibble_has_no_type_flag() {
        let mode = to_file_mode(0o644);
        assert_eq!(mode.bits(), 0o644);
    }

    #[test]
    fn test_char_device_is_also_device() {
        let mode = to_file_mode(S_IFCHR | 0o600);
        assert!(mode.contains(FileMode::DEVICE));
        assert!(mode.contains(FileMode::CHAR_DEVICE));

        let block = to_file_mode(S_IFBLK | 0o600);
        assert!(block.contains(FileMode::DEVICE));
        assert!(!block.contains(FileMode::CHAR_DEVICE));
    }

    #[test]
    fn test_special_bits_independent_of_type() {
        for nibble in [S_IFREG, S_IFDIR, S_IFLNK, S_IFSOCK] {
            let mode = to_file_mode(nibble | S_ISUID | S_ISGID | S_ISVTX | 0o755);
            assert!(mode.contains(FileMode::SETUID));
            assert!(mode.contains(FileMode::SETGID));
            assert!(mode.contains(FileMode::STICKY));
            assert_eq!(mode.perm(), 0o755);
        }

        let sticky_dir = to_file_mode(S_IFDIR | S_ISVTX | 0o777);
        assert!(sticky_dir.is_dir());
        assert!(sticky_dir.contains(FileMode::STICKY));
        assert!(!sticky_dir.contains(FileMode::SETUID));
    }

    #[test]
    fn test_perm_masks_low_bits() {
        for raw in [0u16, 0o1, 0o640, 0o777] {
            assert_eq!(to_file_mode(S_IFREG | raw).perm(), u32::from(raw));
        }
    }
}
