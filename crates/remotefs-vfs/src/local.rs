//! Local filesystem backend.
//!
//! Provides the same [`Fs`] contract over a directory on local disk, with
//! path security to prevent escaping the root directory.

use std::fs::{self, DirBuilder, FileTimes, OpenOptions, Permissions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, FileExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::adapter::to_file_mode;
use crate::vfs::listing::{NamedEntry, read_entries};
use crate::vfs::{File, FileInfo, FileMode, Fs, Listing, OpenFlags, VfsError, VfsResult, base_name};

/// Permissions given to files made by [`Fs::create`].
const CREATE_PERM: u32 = 0o666;

/// Map an I/O error onto the shared taxonomy.
fn io_err(e: io::Error, path: &str) -> VfsError {
    match e.kind() {
        io::ErrorKind::NotFound => VfsError::not_found(path),
        io::ErrorKind::AlreadyExists => VfsError::already_exists(path),
        _ => VfsError::Io(e),
    }
}

/// Local filesystem backend.
///
/// All paths are relative to `root`: with a root of `/srv/data`,
/// `open("/logs/a.txt")` opens `/srv/data/logs/a.txt`. Attempts to escape
/// via `..` or symlinked parent directories are rejected.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Create a local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time so later prefix checks
    /// compare like with like.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a slash-separated path to a location under the root.
    ///
    /// `.` and `..` are resolved lexically and may not climb above the root.
    /// The parent directory is canonicalized when it exists; the final
    /// component never is, so operations act on a symlink rather than its
    /// target.
    fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        let mut rel = PathBuf::new();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => rel.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !rel.pop() {
                        return Err(VfsError::path_escapes_root(path));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(VfsError::invalid_path(path));
                }
            }
        }

        if rel.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }
        let full = self.root.join(&rel);
        let (Some(parent), Some(file_name)) = (full.parent(), full.file_name()) else {
            return Err(VfsError::invalid_path(path));
        };

        let resolved = match dunce::canonicalize(parent) {
            Ok(parent) => parent.join(file_name),
            Err(_) => full.clone(),
        };
        if !resolved.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                resolved.display(),
                self.root.display()
            )));
        }
        Ok(resolved)
    }
}

impl Fs for LocalFs {
    type Info = LocalFileInfo;
    type File = LocalFile;

    fn name(&self) -> &str {
        "LocalFs"
    }

    fn create(&self, path: &str) -> VfsResult<LocalFile> {
        self.open_file(
            path,
            OpenFlags::create_truncate(),
            FileMode::from_bits_retain(CREATE_PERM),
        )
    }

    fn open_file(&self, path: &str, flags: OpenFlags, perm: FileMode) -> VfsResult<LocalFile> {
        let full = self.resolve(path)?;
        let file = OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.create && flags.exclusive)
            .truncate(flags.truncate)
            .mode(perm.perm())
            .open(&full)
            .map_err(|e| io_err(e, path).during("open", path))?;
        let is_dir = file
            .metadata()
            .map_err(|e| io_err(e, path).during("open", path))?
            .is_dir();
        Ok(LocalFile {
            name: path.to_string(),
            full,
            file,
            is_dir,
            dir: None,
        })
    }

    fn mkdir(&self, path: &str, perm: FileMode) -> VfsResult<()> {
        let full = self.resolve(path)?;
        DirBuilder::new()
            .mode(perm.perm())
            .create(&full)
            .map_err(|e| io_err(e, path).during("mkdir", path))
    }

    fn mkdir_all(&self, path: &str, perm: FileMode) -> VfsResult<()> {
        let full = self.resolve(path)?;
        DirBuilder::new()
            .recursive(true)
            .mode(perm.perm())
            .create(&full)
            .map_err(|e| io_err(e, path).during("mkdir_all", path))
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full).map_err(|e| io_err(e, path).during("remove", path))?;
        let res = if meta.is_dir() {
            fs::remove_dir(&full)
        } else {
            fs::remove_file(&full)
        };
        res.map_err(|e| io_err(e, path).during("remove", path))
    }

    fn remove_all(&self, path: &str) -> VfsResult<()> {
        let full = self.resolve(path)?;
        let meta = match fs::symlink_metadata(&full) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err(e, path).during("remove_all", path)),
        };
        if full == self.root {
            return Err(VfsError::invalid_path("refusing to remove the root"));
        }
        debug!(path, dir = meta.is_dir(), "removing tree");
        let res = if meta.is_dir() {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_file(&full)
        };
        res.map_err(|e| io_err(e, path).during("remove_all", path))
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        fs::rename(&src, &dst).map_err(|e| io_err(e, from).during("rename", from))
    }

    fn stat(&self, path: &str) -> VfsResult<LocalFileInfo> {
        let full = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full).map_err(|e| io_err(e, path))?;
        Ok(LocalFileInfo::new(base_name(path), meta))
    }

    fn chmod(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        let full = self.resolve(path)?;
        fs::set_permissions(&full, Permissions::from_mode(mode.perm()))
            .map_err(|e| io_err(e, path).during("chmod", path))
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        let full = self.resolve(path)?;
        std::os::unix::fs::lchown(&full, Some(uid), Some(gid))
            .map_err(|e| io_err(e, path).during("chown", path))
    }

    fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full).map_err(|e| io_err(e, path).during("chtimes", path))?;
        file.set_times(FileTimes::new().set_accessed(atime).set_modified(mtime))
            .map_err(|e| io_err(e, path).during("chtimes", path))
    }
}

/// Metadata of a local file.
#[derive(Debug, Clone)]
pub struct LocalFileInfo {
    name: String,
    meta: fs::Metadata,
}

impl LocalFileInfo {
    fn new(name: impl Into<String>, meta: fs::Metadata) -> Self {
        Self {
            name: name.into(),
            meta,
        }
    }

    /// The platform metadata.
    pub fn metadata(&self) -> &fs::Metadata {
        &self.meta
    }
}

impl FileInfo for LocalFileInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> i64 {
        self.meta.len() as i64
    }

    fn mode(&self) -> FileMode {
        // the packed unix mode fits in 16 bits
        to_file_mode(self.meta.mode() as u16)
    }

    fn modified(&self) -> SystemTime {
        self.meta.modified().unwrap_or(UNIX_EPOCH)
    }
}

/// A `std::fs` directory entry with its name decoded.
struct LocalEntry {
    name: String,
    entry: fs::DirEntry,
}

impl NamedEntry for LocalEntry {
    fn entry_name(&self) -> &str {
        &self.name
    }
}

/// An open local file or directory.
#[derive(Debug)]
pub struct LocalFile {
    name: String,
    full: PathBuf,
    file: fs::File,
    is_dir: bool,
    /// Directory cursor, opened on the first listing call.
    dir: Option<fs::ReadDir>,
}

impl LocalFile {
    fn cursor(&mut self) -> VfsResult<&mut fs::ReadDir> {
        if !self.is_dir {
            return Err(VfsError::NotADirectory(self.name.clone()));
        }
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => fs::read_dir(&self.full).map_err(|e| io_err(e, &self.name))?,
        };
        Ok(self.dir.insert(dir))
    }

    fn next_entry(dir: &mut fs::ReadDir) -> VfsResult<Option<LocalEntry>> {
        match dir.next() {
            None => Ok(None),
            Some(Err(e)) => Err(VfsError::Io(e)),
            Some(Ok(entry)) => Ok(Some(LocalEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                entry,
            })),
        }
    }
}

impl File for LocalFile {
    type Info = LocalFileInfo;

    fn name(&self) -> &str {
        &self.name
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        Ok(self.file.read_at(buf, offset)?)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> VfsResult<usize> {
        Ok(self.file.write_at(buf, offset)?)
    }

    fn write_str(&mut self, s: &str) -> VfsResult<usize> {
        Ok(self.file.write(s.as_bytes())?)
    }

    fn stat(&mut self) -> VfsResult<LocalFileInfo> {
        let meta = self.file.metadata()?;
        Ok(LocalFileInfo::new(base_name(&self.name), meta))
    }

    fn sync(&mut self) -> VfsResult<()> {
        Ok(self.file.sync_all()?)
    }

    fn truncate(&mut self, size: u64) -> VfsResult<()> {
        Ok(self.file.set_len(size)?)
    }

    fn readdir(&mut self, count: i64) -> Listing<LocalFileInfo> {
        let dir = self.cursor()?;
        read_entries(
            || Self::next_entry(dir),
            count,
            |e: LocalEntry| {
                let meta = fs::symlink_metadata(e.entry.path())?;
                Ok(LocalFileInfo::new(e.name, meta))
            },
        )
    }

    fn readdir_names(&mut self, count: i64) -> Listing<String> {
        let dir = self.cursor()?;
        read_entries(|| Self::next_entry(dir), count, |e: LocalEntry| Ok(e.name))
    }

    fn close(self) -> VfsResult<()> {
        drop(self.file);
        Ok(())
    }
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LocalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LocalFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
