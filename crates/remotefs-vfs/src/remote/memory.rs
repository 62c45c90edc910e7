//! In-process remote client.
//!
//! Behaves like the networked client from the adapter's point of view:
//! errno-carrying errors, a mount lifecycle, directory cursors that yield
//! `.` and `..` and end with `None`. Used for `memory` sessions and tests.
//! All data is lost when the last reference is dropped.
//!
//! Symlinks are stored but never followed.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::consts::*;
use super::{
    DType, DirEntryPlus, RawDirEntry, RawStat, RemoteDir, RemoteError, RemoteFile, RemoteMount,
    RemoteResult, Timespec,
};

/// Largest file a [`MemoryRemote`] holds unless configured otherwise.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

fn now() -> Timespec {
    let since = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timespec {
        sec: since.as_secs() as i64,
        nsec: since.subsec_nanos(),
    }
}

fn err(errno: i32) -> RemoteError {
    RemoteError::errno(errno)
}

/// Normalize a path: make it absolute, resolve `.`, `..` and repeated `/`.
fn normalize(path: &str) -> RemoteResult<String> {
    if path.is_empty() {
        return Err(err(ENOENT));
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

/// Parent of a normalized path; `None` for the root.
fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    let idx = path.rfind('/')?;
    Some(if idx == 0 { "/" } else { &path[..idx] })
}

fn name_of(path: &str) -> &str {
    path.rfind('/').map_or(path, |idx| &path[idx + 1..])
}

fn is_dir(mode: u16) -> bool {
    mode & S_IFMT == S_IFDIR
}

fn is_reg(mode: u16) -> bool {
    mode & S_IFMT == S_IFREG
}

#[derive(Debug)]
struct Inode {
    stat: RawStat,
    data: Vec<u8>,
    target: Option<String>,
}

#[derive(Debug)]
struct Tree {
    inodes: HashMap<u64, Inode>,
    /// Normalized path to inode number.
    names: BTreeMap<String, u64>,
    next_ino: u64,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self {
            inodes: HashMap::new(),
            names: BTreeMap::new(),
            next_ino: 1,
        };
        tree.insert("/", S_IFDIR | 0o755);
        tree
    }

    fn insert(&mut self, path: &str, mode: u16) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        let t = now();
        let stat = RawStat {
            ino,
            mode,
            nlink: if is_dir(mode) { 2 } else { 1 },
            uid: 0,
            gid: 0,
            size: 0,
            atime: t,
            mtime: t,
            ctime: t,
        };
        self.inodes.insert(
            ino,
            Inode {
                stat,
                data: Vec::new(),
                target: None,
            },
        );
        self.names.insert(path.to_string(), ino);
        ino
    }

    fn lookup(&self, path: &str) -> RemoteResult<u64> {
        self.names.get(path).copied().ok_or_else(|| err(ENOENT))
    }

    fn node(&self, ino: u64) -> RemoteResult<&Inode> {
        self.inodes.get(&ino).ok_or_else(|| err(ESTALE))
    }

    fn node_mut(&mut self, ino: u64) -> RemoteResult<&mut Inode> {
        self.inodes.get_mut(&ino).ok_or_else(|| err(ESTALE))
    }

    fn stat_of(&self, path: &str) -> RemoteResult<RawStat> {
        let ino = self.lookup(path)?;
        Ok(self.node(ino)?.stat.clone())
    }

    /// The parent of `path` must exist and be a directory.
    fn check_parent(&self, path: &str) -> RemoteResult<()> {
        let parent = parent_of(path).ok_or_else(|| err(EEXIST))?;
        let ino = self.lookup(parent)?;
        if is_dir(self.node(ino)?.stat.mode) {
            Ok(())
        } else {
            Err(err(ENOTDIR))
        }
    }

    /// Direct children of a directory as `(path, ino)`.
    fn children(&self, dir: &str) -> Vec<(String, u64)> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        self.names
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.len() > prefix.len() && !k[prefix.len()..].contains('/'))
            .map(|(k, ino)| (k.clone(), *ino))
            .collect()
    }

    fn remove(&mut self, path: &str) {
        if let Some(ino) = self.names.remove(path) {
            self.inodes.remove(&ino);
        }
    }
}

#[derive(Debug)]
struct Shared {
    tree: Mutex<Tree>,
    mounted: AtomicBool,
    fail_close: AtomicBool,
    max_file_size: AtomicU64,
}

impl Shared {
    fn check_mounted(&self) -> RemoteResult<()> {
        if self.mounted.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(err(ENOTCONN))
        }
    }

    /// Validate a file length against the size limit.
    fn file_len(&self, len: u64) -> RemoteResult<usize> {
        if len > self.max_file_size.load(Ordering::Acquire) {
            return Err(err(EFBIG));
        }
        usize::try_from(len).map_err(|_| err(EFBIG))
    }

    fn close_result(&self) -> RemoteResult<()> {
        if self.fail_close.load(Ordering::Acquire) {
            Err(RemoteError::errno_with(EIO, "injected close failure"))
        } else {
            Ok(())
        }
    }
}

/// In-memory remote client.
#[derive(Debug)]
pub struct MemoryRemote {
    id: Option<String>,
    config_file: Option<PathBuf>,
    options: HashMap<String, String>,
    shared: Arc<Shared>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Create an unmounted client with an empty tree.
    pub fn new() -> Self {
        Self {
            id: None,
            config_file: None,
            options: HashMap::new(),
            shared: Arc::new(Shared {
                tree: Mutex::new(Tree::new()),
                mounted: AtomicBool::new(false),
                fail_close: AtomicBool::new(false),
                max_file_size: AtomicU64::new(DEFAULT_MAX_FILE_SIZE),
            }),
        }
    }

    /// Client id given at creation.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Configuration file loaded with `read_config_file`.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Value of a configuration option.
    pub fn config_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.mounted.load(Ordering::Acquire)
    }

    /// Make every subsequent file and directory close fail with `EIO`.
    pub fn fail_closes(&self, on: bool) {
        self.shared.fail_close.store(on, Ordering::Release);
    }

    /// Cap file length; writes or truncates past it fail with `EFBIG`.
    pub fn set_max_file_size(&self, max: u64) {
        self.shared.max_file_size.store(max, Ordering::Release);
    }

    /// Create a symbolic link at `path` pointing at `target`.
    pub fn symlink(&self, target: &str, path: &str) -> RemoteResult<()> {
        let ino = self.make_node(path, S_IFLNK | 0o777)?;
        let mut tree = self.shared.tree.lock();
        let node = tree.node_mut(ino)?;
        node.stat.size = target.len() as u64;
        node.target = Some(target.to_string());
        Ok(())
    }

    /// Target of a symbolic link.
    pub fn readlink(&self, path: &str) -> RemoteResult<String> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let tree = self.shared.tree.lock();
        let ino = tree.lookup(&path)?;
        tree.node(ino)?.target.clone().ok_or_else(|| err(EINVAL))
    }

    /// Create a node with an arbitrary packed mode (fifo, socket, device).
    pub fn mknod(&self, path: &str, mode: u16) -> RemoteResult<()> {
        self.make_node(path, mode).map(|_| ())
    }

    fn make_node(&self, path: &str, mode: u16) -> RemoteResult<u64> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let mut tree = self.shared.tree.lock();
        if tree.names.contains_key(&path) {
            return Err(err(EEXIST));
        }
        tree.check_parent(&path)?;
        Ok(tree.insert(&path, mode))
    }
}

impl RemoteMount for MemoryRemote {
    type File = MemoryFile;
    type Dir = MemoryDir;

    fn create_with_id(id: Option<&str>) -> RemoteResult<Self> {
        let mut remote = Self::new();
        remote.id = id.map(str::to_string);
        Ok(remote)
    }

    fn read_config_file(&mut self, path: &Path) -> RemoteResult<()> {
        if !path.is_file() {
            return Err(RemoteError::errno_with(
                ENOENT,
                format!("config file {} not found", path.display()),
            ));
        }
        self.config_file = Some(path.to_path_buf());
        Ok(())
    }

    fn read_default_config_file(&mut self) -> RemoteResult<()> {
        self.config_file = None;
        Ok(())
    }

    fn set_config_option(&mut self, key: &str, value: &str) -> RemoteResult<()> {
        self.options.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn mount(&mut self) -> RemoteResult<()> {
        if self.shared.mounted.swap(true, Ordering::AcqRel) {
            return Err(err(EISCONN));
        }
        Ok(())
    }

    fn unmount(&mut self) -> RemoteResult<()> {
        if !self.shared.mounted.swap(false, Ordering::AcqRel) {
            return Err(err(ENOTCONN));
        }
        Ok(())
    }

    fn release(self) -> RemoteResult<()> {
        if self.is_mounted() {
            return Err(err(EBUSY));
        }
        Ok(())
    }

    fn open(&self, path: &str, flags: i32, mode: u32) -> RemoteResult<MemoryFile> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let access = flags & O_ACCMODE;
        let readable = access == O_RDONLY || access == O_RDWR;
        let writable = access == O_WRONLY || access == O_RDWR;

        let mut tree = self.shared.tree.lock();
        let ino = match tree.names.get(&path).copied() {
            Some(ino) => {
                if flags & O_CREAT != 0 && flags & O_EXCL != 0 {
                    return Err(err(EEXIST));
                }
                let node = tree.node_mut(ino)?;
                if is_dir(node.stat.mode) && writable {
                    return Err(err(EISDIR));
                }
                if flags & O_TRUNC != 0 && writable && is_reg(node.stat.mode) {
                    node.data.clear();
                    node.stat.size = 0;
                    node.stat.mtime = now();
                }
                ino
            }
            None => {
                if flags & O_CREAT == 0 {
                    return Err(err(ENOENT));
                }
                tree.check_parent(&path)?;
                tree.insert(&path, S_IFREG | (mode as u16 & 0o7777))
            }
        };

        Ok(MemoryFile {
            shared: Arc::clone(&self.shared),
            ino,
            pos: 0,
            readable,
            writable,
            append: flags & O_APPEND != 0,
            closed: false,
        })
    }

    fn open_dir(&self, path: &str) -> RemoteResult<MemoryDir> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let tree = self.shared.tree.lock();
        let stat = tree.stat_of(&path)?;
        if !is_dir(stat.mode) {
            return Err(err(ENOTDIR));
        }
        let parent = match parent_of(&path) {
            Some(p) => tree.stat_of(p)?,
            None => stat.clone(),
        };

        let plus = |name: &str, stat: RawStat| DirEntryPlus {
            entry: RawDirEntry {
                ino: stat.ino,
                name: name.to_string(),
                dtype: DType::from_mode(stat.mode),
            },
            stat,
        };

        let mut entries = VecDeque::new();
        entries.push_back(plus(".", stat));
        entries.push_back(plus("..", parent));
        for (child, ino) in tree.children(&path) {
            entries.push_back(plus(name_of(&child), tree.node(ino)?.stat.clone()));
        }

        Ok(MemoryDir {
            shared: Arc::clone(&self.shared),
            entries,
            closed: false,
        })
    }

    fn make_dir(&self, path: &str, mode: u32) -> RemoteResult<()> {
        self.make_node(path, S_IFDIR | (mode as u16 & 0o7777))
            .map(|_| ())
    }

    fn make_dirs(&self, path: &str, mode: u32) -> RemoteResult<()> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let mut tree = self.shared.tree.lock();

        let mut current = String::new();
        let last = path.split('/').filter(|p| !p.is_empty()).count();
        for (i, part) in path.split('/').filter(|p| !p.is_empty()).enumerate() {
            current.push('/');
            current.push_str(part);
            match tree.names.get(&current).copied() {
                Some(ino) if is_dir(tree.node(ino)?.stat.mode) => {}
                Some(_) if i + 1 == last => return Err(err(EEXIST)),
                Some(_) => return Err(err(ENOTDIR)),
                None => {
                    tree.insert(&current, S_IFDIR | (mode as u16 & 0o7777));
                }
            }
        }
        Ok(())
    }

    fn remove_dir(&self, path: &str) -> RemoteResult<()> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        if path == "/" {
            return Err(err(EBUSY));
        }
        let mut tree = self.shared.tree.lock();
        let stat = tree.stat_of(&path)?;
        if !is_dir(stat.mode) {
            return Err(err(ENOTDIR));
        }
        if !tree.children(&path).is_empty() {
            return Err(err(ENOTEMPTY));
        }
        tree.remove(&path);
        Ok(())
    }

    fn unlink(&self, path: &str) -> RemoteResult<()> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let mut tree = self.shared.tree.lock();
        let stat = tree.stat_of(&path)?;
        if is_dir(stat.mode) {
            return Err(err(EISDIR));
        }
        tree.remove(&path);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> RemoteResult<()> {
        self.shared.check_mounted()?;
        let from = normalize(from)?;
        let to = normalize(to)?;
        if from == "/" || to == "/" {
            return Err(err(EBUSY));
        }

        let mut tree = self.shared.tree.lock();
        let src = tree.stat_of(&from)?;
        if from == to {
            return Ok(());
        }
        if to.starts_with(&format!("{from}/")) {
            return Err(err(EINVAL));
        }
        tree.check_parent(&to)?;

        if let Ok(dst) = tree.stat_of(&to) {
            match (is_dir(src.mode), is_dir(dst.mode)) {
                (true, false) => return Err(err(ENOTDIR)),
                (false, true) => return Err(err(EISDIR)),
                (true, true) if !tree.children(&to).is_empty() => {
                    return Err(err(ENOTEMPTY));
                }
                _ => {}
            }
            tree.remove(&to);
        }

        let prefix = format!("{from}/");
        let moved: Vec<String> = tree
            .names
            .keys()
            .filter(|k| **k == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(ino) = tree.names.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                tree.names.insert(new, ino);
            }
        }

        let ino = tree.lookup(&to)?;
        tree.node_mut(ino)?.stat.ctime = now();
        Ok(())
    }

    fn statx(&self, path: &str) -> RemoteResult<RawStat> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        self.shared.tree.lock().stat_of(&path)
    }

    fn chmod(&self, path: &str, mode: u32) -> RemoteResult<()> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let mut tree = self.shared.tree.lock();
        let ino = tree.lookup(&path)?;
        let node = tree.node_mut(ino)?;
        node.stat.mode = (node.stat.mode & S_IFMT) | (mode as u16 & 0o7777);
        node.stat.ctime = now();
        Ok(())
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> RemoteResult<()> {
        self.shared.check_mounted()?;
        let path = normalize(path)?;
        let mut tree = self.shared.tree.lock();
        let ino = tree.lookup(&path)?;
        let node = tree.node_mut(ino)?;
        node.stat.uid = uid;
        node.stat.gid = gid;
        node.stat.ctime = now();
        Ok(())
    }
}

/// Open file on a [`MemoryRemote`].
#[derive(Debug)]
pub struct MemoryFile {
    shared: Arc<Shared>,
    ino: u64,
    pos: u64,
    readable: bool,
    writable: bool,
    append: bool,
    closed: bool,
}

impl MemoryFile {
    fn with_node<T>(&self, f: impl FnOnce(&mut Inode) -> RemoteResult<T>) -> RemoteResult<T> {
        if self.closed {
            return Err(err(EBADF));
        }
        self.shared.check_mounted()?;
        let mut tree = self.shared.tree.lock();
        f(tree.node_mut(self.ino)?)
    }

    fn end_of(&self, offset: u64, len: usize) -> RemoteResult<usize> {
        let end = offset.checked_add(len as u64).ok_or_else(|| err(EFBIG))?;
        self.shared.file_len(end)
    }

    fn read_node(node: &mut Inode, buf: &mut [u8], offset: u64) -> RemoteResult<usize> {
        if is_dir(node.stat.mode) {
            return Err(err(EISDIR));
        }
        let len = node.data.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
        let n = buf.len().min(len - start);
        buf[..n].copy_from_slice(&node.data[start..start + n]);
        node.stat.atime = now();
        Ok(n)
    }

    /// Write `buf` at `offset`; `end` is `offset + buf.len()`, already checked.
    fn write_node(node: &mut Inode, buf: &[u8], end: usize) -> RemoteResult<usize> {
        if is_dir(node.stat.mode) {
            return Err(err(EISDIR));
        }
        if !is_reg(node.stat.mode) {
            return Err(err(EINVAL));
        }
        let offset = end - buf.len();
        if end > node.data.len() {
            node.data.resize(end, 0);
        }
        node.data[offset..end].copy_from_slice(buf);
        node.stat.size = node.data.len() as u64;
        node.stat.mtime = now();
        Ok(buf.len())
    }
}

impl RemoteFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> RemoteResult<usize> {
        if !self.readable {
            return Err(err(EBADF));
        }
        let pos = self.pos;
        let n = self.with_node(|node| Self::read_node(node, buf, pos))?;
        self.pos += n as u64;
        Ok(n)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> RemoteResult<usize> {
        if !self.readable {
            return Err(err(EBADF));
        }
        self.with_node(|node| Self::read_node(node, buf, offset))
    }

    fn write(&mut self, buf: &[u8]) -> RemoteResult<usize> {
        if !self.writable {
            return Err(err(EBADF));
        }
        let (pos, append) = (self.pos, self.append);
        let (n, end) = self.with_node(|node| {
            let offset = if append { node.data.len() as u64 } else { pos };
            let end = self.end_of(offset, buf.len())?;
            Self::write_node(node, buf, end).map(|n| (n, end as u64))
        })?;
        self.pos = end;
        Ok(n)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> RemoteResult<usize> {
        if !self.writable {
            return Err(err(EBADF));
        }
        let end = self.end_of(offset, buf.len())?;
        self.with_node(|node| Self::write_node(node, buf, end))
    }

    fn seek(&mut self, pos: SeekFrom) -> RemoteResult<u64> {
        let size = self.with_node(|node| Ok(node.data.len() as i64))?;
        let (base, delta) = match pos {
            SeekFrom::Start(n) => (0, i64::try_from(n).map_err(|_| err(EINVAL))?),
            SeekFrom::Current(d) => (self.pos as i64, d),
            SeekFrom::End(d) => (size, d),
        };
        let new = base
            .checked_add(delta)
            .filter(|n| *n >= 0)
            .ok_or_else(|| err(EINVAL))?;
        self.pos = new as u64;
        Ok(self.pos)
    }

    fn fstatx(&self) -> RemoteResult<RawStat> {
        self.with_node(|node| Ok(node.stat.clone()))
    }

    fn sync(&mut self) -> RemoteResult<()> {
        self.with_node(|_| Ok(()))
    }

    fn truncate(&mut self, size: u64) -> RemoteResult<()> {
        if !self.writable {
            return Err(err(EBADF));
        }
        let len = self.shared.file_len(size)?;
        self.with_node(|node| {
            if is_dir(node.stat.mode) {
                return Err(err(EISDIR));
            }
            node.data.resize(len, 0);
            node.stat.size = size;
            node.stat.mtime = now();
            Ok(())
        })
    }

    fn close(&mut self) -> RemoteResult<()> {
        if self.closed {
            return Err(err(EBADF));
        }
        self.closed = true;
        self.shared.close_result()
    }
}

/// Open directory cursor on a [`MemoryRemote`].
///
/// The listing is captured when the directory is opened; later changes to
/// the directory are not reflected.
#[derive(Debug)]
pub struct MemoryDir {
    shared: Arc<Shared>,
    entries: VecDeque<DirEntryPlus>,
    closed: bool,
}

impl RemoteDir for MemoryDir {
    fn read_dir(&mut self) -> RemoteResult<Option<RawDirEntry>> {
        self.read_dir_plus().map(|e| e.map(|plus| plus.entry))
    }

    fn read_dir_plus(&mut self) -> RemoteResult<Option<DirEntryPlus>> {
        if self.closed {
            return Err(err(EBADF));
        }
        Ok(self.entries.pop_front())
    }

    fn close(&mut self) -> RemoteResult<()> {
        if self.closed {
            return Err(err(EBADF));
        }
        self.closed = true;
        self.shared.close_result()
    }
}
