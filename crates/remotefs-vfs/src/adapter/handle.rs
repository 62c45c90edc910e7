//! Open handles on the remote filesystem.
//!
//! A handle holds a file capability, a directory capability, or both. File
//! operations need the former, directory listings need the latter; asking
//! for an absent capability is a caller error and never reaches the remote.

use std::fmt;
use std::io::{self, SeekFrom};

use super::error::convert_result;
use super::info::RemoteFileInfo;
use crate::remote::{DirEntryPlus, RawDirEntry, RemoteDir, RemoteFile, RemoteMount};
use crate::vfs::listing::{self, read_entries};
use crate::vfs::{File, Listing, VfsError, VfsResult, child_path};

/// What an open handle can do. There is no empty variant: a handle always
/// holds at least one remote object.
pub enum Capability<F, D> {
    File(F),
    Dir(D),
    Both { file: F, dir: D },
}

impl<F, D> Capability<F, D> {
    fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Dir(_) => "dir",
            Self::Both { .. } => "file+dir",
        }
    }
}

/// An open file and/or directory on a remote mount.
///
/// Must be released with [`File::close`]; dropping it leaks the remote
/// objects.
pub struct RemoteHandle<M: RemoteMount> {
    path: String,
    cap: Capability<M::File, M::Dir>,
}

impl<M: RemoteMount> fmt::Debug for RemoteHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("path", &self.path)
            .field("capability", &self.cap.kind())
            .finish()
    }
}

impl<M: RemoteMount> RemoteHandle<M> {
    pub(crate) fn new(path: impl Into<String>, cap: Capability<M::File, M::Dir>) -> Self {
        Self {
            path: path.into(),
            cap,
        }
    }

    pub fn has_file(&self) -> bool {
        !matches!(self.cap, Capability::Dir(_))
    }

    pub fn has_dir(&self) -> bool {
        !matches!(self.cap, Capability::File(_))
    }

    fn file(&self) -> VfsResult<&M::File> {
        match &self.cap {
            Capability::File(file) | Capability::Both { file, .. } => Ok(file),
            Capability::Dir(_) => Err(VfsError::NotAFile(self.path.clone())),
        }
    }

    fn file_mut(&mut self) -> VfsResult<&mut M::File> {
        match &mut self.cap {
            Capability::File(file) | Capability::Both { file, .. } => Ok(file),
            Capability::Dir(_) => Err(VfsError::NotAFile(self.path.clone())),
        }
    }

    fn dir_mut(&mut self) -> VfsResult<&mut M::Dir> {
        match &mut self.cap {
            Capability::Dir(dir) | Capability::Both { dir, .. } => Ok(dir),
            Capability::File(_) => Err(VfsError::NotADirectory(self.path.clone())),
        }
    }

    /// Remaining raw entries of the directory, `.` and `..` excluded.
    ///
    /// Forward-only: entries consumed here are gone for later `readdir`
    /// calls on the same handle.
    pub fn entries(&mut self) -> VfsResult<impl Iterator<Item = VfsResult<RawDirEntry>> + '_> {
        let dir = self.dir_mut()?;
        Ok(listing::entries(move || convert_result(dir.read_dir())))
    }
}

impl<M: RemoteMount> File for RemoteHandle<M> {
    type Info = RemoteFileInfo;

    fn name(&self) -> &str {
        &self.path
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        convert_result(self.file_mut()?.read_at(buf, offset))
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize> {
        convert_result(self.file_mut()?.write_at(buf, offset))
    }

    fn write_str(&mut self, s: &str) -> VfsResult<usize> {
        convert_result(self.file_mut()?.write(s.as_bytes()))
    }

    fn stat(&mut self) -> VfsResult<RemoteFileInfo> {
        let stat = convert_result(self.file()?.fstatx())?;
        Ok(RemoteFileInfo::new(self.path.clone(), stat))
    }

    fn sync(&mut self) -> VfsResult<()> {
        convert_result(self.file_mut()?.sync())
    }

    fn truncate(&mut self, size: u64) -> VfsResult<()> {
        convert_result(self.file_mut()?.truncate(size))
    }

    fn readdir(&mut self, count: i64) -> Listing<RemoteFileInfo> {
        let path = self.path.clone();
        let dir = self.dir_mut()?;
        read_entries(
            || convert_result(dir.read_dir_plus()),
            count,
            |plus: DirEntryPlus| {
                Ok(RemoteFileInfo::new(
                    child_path(&path, &plus.entry.name),
                    plus.stat,
                ))
            },
        )
    }

    fn readdir_names(&mut self, count: i64) -> Listing<String> {
        let dir = self.dir_mut()?;
        read_entries(
            || convert_result(dir.read_dir()),
            count,
            |entry: RawDirEntry| Ok(entry.name),
        )
    }

    fn close(self) -> VfsResult<()> {
        let Self { path, cap } = self;
        let (first, second) = match cap {
            Capability::File(mut file) => (convert_result(file.close()).err(), None),
            Capability::Dir(mut dir) => (convert_result(dir.close()).err(), None),
            Capability::Both { mut file, mut dir } => (
                convert_result(file.close()).err(),
                convert_result(dir.close()).err(),
            ),
        };
        match (first, second) {
            (None, None) => Ok(()),
            (Some(err), None) | (None, Some(err)) => Err(err.during("close", path)),
            (Some(first), Some(second)) => Err(VfsError::CloseFailed {
                first: Box::new(first),
                second: Box::new(second),
            }
            .during("close", path)),
        }
    }
}

impl<M: RemoteMount> io::Read for RemoteHandle<M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(convert_result(self.file_mut()?.read(buf))?)
    }
}

impl<M: RemoteMount> io::Write for RemoteHandle<M> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(convert_result(self.file_mut()?.write(buf))?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<M: RemoteMount> io::Seek for RemoteHandle<M> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(convert_result(self.file_mut()?.seek(pos))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::remote::consts::{O_CREAT, O_RDONLY, O_RDWR};
    use crate::vfs::FileInfo;
    use std::io::{Read, Seek, Write};

    type Handle = RemoteHandle<MemoryRemote>;

    fn remote() -> MemoryRemote {
        let mut remote = MemoryRemote::new();
        remote.mount().unwrap();
        remote
    }

    fn file_handle(remote: &MemoryRemote, path: &str) -> Handle {
        let file = remote.open(path, O_RDWR | O_CREAT, 0o644).unwrap();
        RemoteHandle::new(path, Capability::File(file))
    }

    fn dir_handle(remote: &MemoryRemote, path: &str) -> Handle {
        RemoteHandle::new(path, Capability::Dir(remote.open_dir(path).unwrap()))
    }

    fn populated() -> MemoryRemote {
        let remote = remote();
        remote.make_dir("/d", 0o755).unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            remote
                .open(&format!("/d/{name}"), O_RDWR | O_CREAT, 0o644)
                .unwrap()
                .close()
                .unwrap();
        }
        remote
    }

    #[test]
    fn test_file_io() {
        let remote = remote();
        let mut h = file_handle(&remote, "/f");
        h.write_all(b"hello").unwrap();
        assert_eq!(h.write_str(" world").unwrap(), 6);
        h.seek(SeekFrom::Start(0)).unwrap();
        let mut text = String::new();
        h.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello world");

        let mut buf = [0u8; 5];
        assert_eq!(h.read_at(&mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");

        h.write_at(b"W", 6).unwrap();
        h.truncate(7).unwrap();
        h.sync().unwrap();
        let info = h.stat().unwrap();
        assert_eq!(info.size(), 7);
        assert_eq!(info.name(), "f");
        h.close().unwrap();
    }

    #[test]
    fn test_file_ops_need_file_capability() {
        let remote = populated();
        let mut h = dir_handle(&remote, "/d");
        assert!(!h.has_file());

        let mut buf = [0u8; 4];
        assert!(matches!(h.read_at(&mut buf, 0), Err(VfsError::NotAFile(p)) if p == "/d"));
        assert!(matches!(h.stat(), Err(VfsError::NotAFile(_))));
        assert!(matches!(h.truncate(0), Err(VfsError::NotAFile(_))));
        assert!(matches!(h.write_str("x"), Err(VfsError::NotAFile(_))));

        let io_err = h.read(&mut buf).unwrap_err();
        assert_eq!(io_err.kind(), io::ErrorKind::IsADirectory);
        h.close().unwrap();
    }

    #[test]
    fn test_dir_ops_need_dir_capability() {
        let remote = remote();
        let mut h = file_handle(&remote, "/f");
        assert!(!h.has_dir());
        let err = h.readdir(0).unwrap_err();
        assert!(err.entries.is_empty());
        assert!(matches!(err.source, VfsError::NotADirectory(p) if p == "/f"));
        assert!(matches!(
            h.readdir_names(3).unwrap_err().source,
            VfsError::NotADirectory(_)
        ));
        h.close().unwrap();
    }

    #[test]
    fn test_readdir_builds_child_paths() {
        let remote = populated();
        let mut h = dir_handle(&remote, "/d");
        let infos = h.readdir(0).unwrap();
        let paths: Vec<_> = infos.iter().map(|i| i.path().to_string()).collect();
        assert_eq!(paths, vec!["/d/a", "/d/b", "/d/c", "/d/d", "/d/e"]);
        assert!(infos.iter().all(|i| !i.is_dir()));
        h.close().unwrap();
    }

    #[test]
    fn test_readdir_names_paginates() {
        let remote = populated();
        let mut h = dir_handle(&remote, "/d");
        assert_eq!(h.readdir_names(2).unwrap(), vec!["a", "b"]);
        assert_eq!(h.readdir_names(2).unwrap(), vec!["c", "d"]);
        assert_eq!(h.readdir_names(2).unwrap(), vec!["e"]);
        assert!(h.readdir_names(2).unwrap().is_empty());
        h.close().unwrap();
    }

    #[test]
    fn test_entries_is_forward_only() {
        let remote = populated();
        let mut h = dir_handle(&remote, "/d");
        let first: Vec<_> = h
            .entries()
            .unwrap()
            .take(3)
            .map(|e| e.unwrap().name)
            .collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(h.readdir_names(0).unwrap(), vec!["d", "e"]);
        h.close().unwrap();
    }

    #[test]
    fn test_close_single_failure() {
        let remote = populated();
        let h = dir_handle(&remote, "/d");
        remote.fail_closes(true);
        let err = h.close().unwrap_err();
        assert!(matches!(err.root_cause(), VfsError::Remote(_)));
        assert!(err.to_string().starts_with("close /d: "));
    }

    #[test]
    fn test_close_both_failures_are_reported() {
        let remote = populated();
        let file = remote.open("/d", O_RDONLY, 0).unwrap();
        let dir = remote.open_dir("/d").unwrap();
        let h: Handle = RemoteHandle::new("/d", Capability::Both { file, dir });
        assert!(h.has_file() && h.has_dir());

        remote.fail_closes(true);
        let err = h.close().unwrap_err();
        match err.root_cause() {
            VfsError::CloseFailed { first, second } => {
                assert!(first.to_string().contains("ret=-5"));
                assert!(second.to_string().contains("ret=-5"));
            }
            other => panic!("expected CloseFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_shows_capability() {
        let remote = remote();
        let h = file_handle(&remote, "/f");
        assert_eq!(
            format!("{h:?}"),
            r#"RemoteHandle { path: "/f", capability: "file" }"#
        );
        h.close().unwrap();
    }
}
