//! [`Fs`] over a remote mount.

use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::error::{convert_err, convert_result};
use super::handle::{Capability, RemoteHandle};
use super::info::RemoteFileInfo;
use super::mode::to_file_mode;
use crate::config::RemoteConfig;
use crate::remote::consts::{
    EISDIR, O_APPEND, O_CREAT, O_EXCL, O_RDONLY, O_RDWR, O_TRUNC, O_WRONLY,
};
use crate::remote::{DType, RemoteFile, RemoteMount};
use crate::vfs::{File, FileMode, Fs, OpenFlags, VfsError, VfsResult, child_path};

/// Permissions given to files made by [`Fs::create`].
const CREATE_PERM: u32 = 0o666;

/// A mounted remote filesystem exposed through the generic contract.
///
/// Owns the mount. [`RemoteFs::unmount`] consumes the adapter, so nothing
/// can touch the mount after it is gone.
pub struct RemoteFs<M: RemoteMount> {
    mount: M,
}

impl<M: RemoteMount> std::fmt::Debug for RemoteFs<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFs").finish_non_exhaustive()
    }
}

impl<M: RemoteMount> RemoteFs<M> {
    /// Create a client, apply `config` and mount.
    ///
    /// A client that fails to configure or mount is released before the
    /// error is returned.
    pub fn connect(config: &RemoteConfig) -> VfsResult<Self> {
        let id = config.mount_id();
        info!(id = id.unwrap_or(""), "connecting to remote filesystem");

        let mut mount = convert_result(M::create_with_id(id))
            .map_err(|e| e.during("create mount", id.unwrap_or("")))?;

        if let Err(e) = Self::configure(&mut mount, config) {
            if let Err(release) = mount.release() {
                warn!(error = %release, "failed to release client after setup error");
            }
            return Err(e);
        }
        Ok(Self { mount })
    }

    fn configure(mount: &mut M, config: &RemoteConfig) -> VfsResult<()> {
        if let Some(keyring) = &config.keyring_path {
            let keyring = keyring.to_string_lossy();
            convert_result(mount.set_config_option("keyring", &keyring))
                .map_err(|e| e.during("set keyring", keyring.to_string()))?;
        }

        match &config.config_path {
            Some(path) => {
                debug!(path = %path.display(), "reading client config");
                convert_result(mount.read_config_file(path))
                    .map_err(|e| e.during("read config", path.display().to_string()))?;
            }
            None => {
                convert_result(mount.read_default_config_file())
                    .map_err(|e| e.during("read config", "<default>"))?;
            }
        }

        convert_result(mount.mount()).map_err(|e| e.during("mount", config.mount_id().unwrap_or("")))
    }

    /// Wrap a client that is already mounted.
    pub fn from_mount(mount: M) -> Self {
        Self { mount }
    }

    /// The underlying client.
    pub fn client(&self) -> &M {
        &self.mount
    }

    /// Unmount and release the client.
    pub fn unmount(mut self) -> VfsResult<()> {
        info!("unmounting remote filesystem");
        convert_result(self.mount.unmount()).map_err(|e| e.during("unmount", "/"))?;
        convert_result(self.mount.release()).map_err(|e| e.during("release", "/"))
    }

    /// Open a directory for listing. The handle has no file capability.
    #[tracing::instrument(skip(self), name = "remotefs.open_dir")]
    pub fn open_dir(&self, path: &str) -> VfsResult<RemoteHandle<M>> {
        let dir = convert_result(self.mount.open_dir(path)).map_err(|e| e.during("opendir", path))?;
        Ok(RemoteHandle::new(path, Capability::Dir(dir)))
    }

    fn unlink(&self, path: &str) -> VfsResult<()> {
        convert_result(self.mount.unlink(path)).map_err(|e| e.during("unlink", path))
    }

    /// Close a file whose open did not complete; the original error wins.
    fn discard(mut file: M::File, path: &str) {
        if let Err(e) = file.close() {
            warn!(path, error = %e, "failed to close file after open error");
        }
    }

    /// Delete every entry below `path`, which is open as `handle`.
    fn remove_children(&self, handle: &mut RemoteHandle<M>, path: &str) -> VfsResult<()> {
        for entry in handle.entries()? {
            let entry = entry?;
            let child = child_path(path, &entry.name);
            match entry.dtype {
                DType::Dir => self.remove_all(&child)?,
                DType::Lnk | DType::Reg => self.unlink(&child)?,
                other => {
                    debug!(path = %child, dtype = ?other, "unlinking special entry");
                    self.unlink(&child)?;
                }
            }
        }
        Ok(())
    }
}

/// Translate generic open flags to the remote's POSIX flags.
fn posix_flags(flags: OpenFlags) -> i32 {
    let writes = flags.write || flags.append;
    let mut out = match (flags.read, writes) {
        (true, true) => O_RDWR,
        (false, true) => O_WRONLY,
        (_, false) => O_RDONLY,
    };
    if flags.append {
        out |= O_APPEND;
    }
    if flags.create {
        out |= O_CREAT;
    }
    if flags.exclusive {
        out |= O_EXCL;
    }
    if flags.truncate {
        out |= O_TRUNC;
    }
    out
}

impl<M: RemoteMount> Fs for RemoteFs<M> {
    type Info = RemoteFileInfo;
    type File = RemoteHandle<M>;

    fn name(&self) -> &str {
        "RemoteFs"
    }

    fn create(&self, path: &str) -> VfsResult<RemoteHandle<M>> {
        self.open_file(
            path,
            OpenFlags::create_truncate(),
            FileMode::from_bits_retain(CREATE_PERM),
        )
    }

    #[tracing::instrument(skip(self), name = "remotefs.open_file")]
    fn open_file(&self, path: &str, flags: OpenFlags, perm: FileMode) -> VfsResult<RemoteHandle<M>> {
        let file = convert_result(self.mount.open(path, posix_flags(flags), perm.perm()))
            .map_err(|e| e.during("open", path))?;

        let stat = match file.fstatx() {
            Ok(stat) => stat,
            Err(e) => {
                Self::discard(file, path);
                return Err(convert_err(e).during("open", path));
            }
        };
        if !to_file_mode(stat.mode).is_dir() {
            return Ok(RemoteHandle::new(path, Capability::File(file)));
        }

        match self.mount.open_dir(path) {
            Ok(dir) => Ok(RemoteHandle::new(path, Capability::Both { file, dir })),
            Err(e) => {
                Self::discard(file, path);
                Err(convert_err(e).during("opendir", path))
            }
        }
    }

    #[tracing::instrument(skip(self), name = "remotefs.mkdir")]
    fn mkdir(&self, path: &str, perm: FileMode) -> VfsResult<()> {
        convert_result(self.mount.make_dir(path, perm.perm())).map_err(|e| e.during("mkdir", path))
    }

    #[tracing::instrument(skip(self), name = "remotefs.mkdir_all")]
    fn mkdir_all(&self, path: &str, perm: FileMode) -> VfsResult<()> {
        convert_result(self.mount.make_dirs(path, perm.perm()))
            .map_err(|e| e.during("mkdir_all", path))
    }

    #[tracing::instrument(skip(self), name = "remotefs.remove")]
    fn remove(&self, path: &str) -> VfsResult<()> {
        let res = match self.mount.unlink(path) {
            Err(e) if e.ret() == Some(-EISDIR) => self.mount.remove_dir(path),
            other => other,
        };
        convert_result(res).map_err(|e| e.during("remove", path))
    }

    #[tracing::instrument(skip(self), name = "remotefs.remove_all")]
    fn remove_all(&self, path: &str) -> VfsResult<()> {
        let stat = match self.mount.statx(path) {
            Ok(stat) => stat,
            Err(e) if e.is_not_exist() => return Ok(()),
            Err(e) => return Err(convert_err(e).during("stat", path)),
        };
        if !to_file_mode(stat.mode).is_dir() {
            return self.remove(path);
        }

        let mut handle = self.open_dir(path)?;
        let walked = self.remove_children(&mut handle, path);
        let closed = handle.close();
        if let (Err(_), Err(e)) = (&walked, &closed) {
            warn!(path, error = %e, "failed to close directory after walk error");
        }
        walked?;
        closed?;

        convert_result(self.mount.remove_dir(path)).map_err(|e| e.during("rmdir", path))
    }

    #[tracing::instrument(skip(self), name = "remotefs.rename")]
    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        convert_result(self.mount.rename(from, to))
            .map_err(|e| e.during("rename", format!("{from} -> {to}")))
    }

    fn stat(&self, path: &str) -> VfsResult<RemoteFileInfo> {
        let stat = convert_result(self.mount.statx(path))?;
        Ok(RemoteFileInfo::new(path, stat))
    }

    fn chmod(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        convert_result(self.mount.chmod(path, mode.perm())).map_err(|e| e.during("chmod", path))
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        convert_result(self.mount.chown(path, uid, gid)).map_err(|e| e.during("chown", path))
    }

    fn chtimes(&self, _path: &str, _atime: SystemTime, _mtime: SystemTime) -> VfsResult<()> {
        Err(VfsError::Unsupported("chtimes"))
    }
}
