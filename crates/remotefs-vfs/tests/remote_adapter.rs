//! Remote adapter behavior beyond the shared contract: handle capabilities,
//! close aggregation, error translation and the mount lifecycle.

use std::io::Read;
use std::time::SystemTime;

use remotefs_vfs::adapter::{convert_result, to_file_mode};
use remotefs_vfs::remote::consts::{S_IFCHR, S_IFDIR, S_IFSOCK, S_ISVTX};
use remotefs_vfs::remote::{RemoteError, RemoteMount};
use remotefs_vfs::vfs::{File, FileInfo, FileMode, FileType, Fs, VfsError};
use remotefs_vfs::{MemoryRemote, RemoteConfig, RemoteFs};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mounted() -> RemoteFs<MemoryRemote> {
    init_tracing();
    let mut remote = MemoryRemote::new();
    remote.mount().unwrap();
    RemoteFs::from_mount(remote)
}

fn dir(bits: u32) -> FileMode {
    FileMode::from_bits_retain(bits)
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_open_directory_supports_listing_and_stat() {
    let fs = mounted();
    fs.mkdir_all("/d/sub", dir(0o750)).unwrap();

    let mut h = fs.open("/d").unwrap();
    let info = h.stat().unwrap();
    assert!(info.is_dir());
    assert_eq!(info.mode().perm(), 0o750);
    assert_eq!(h.readdir_names(0).unwrap(), vec!["sub"]);
    h.close().unwrap();
}

#[test]
fn test_dir_only_handle_rejects_file_ops() {
    let fs = mounted();
    fs.mkdir("/d", dir(0o755)).unwrap();
    let mut h = fs.open_dir("/d").unwrap();

    let mut buf = [0u8; 8];
    assert!(matches!(h.stat(), Err(VfsError::NotAFile(p)) if p == "/d"));
    assert!(matches!(h.write_at(b"x", 0), Err(VfsError::NotAFile(_))));
    assert!(matches!(h.sync(), Err(VfsError::NotAFile(_))));
    assert!(h.read(&mut buf).is_err());
    assert!(h.readdir(0).unwrap().is_empty());
    h.close().unwrap();
}

#[test]
fn test_file_handle_rejects_listing() {
    let fs = mounted();
    let mut h = fs.create("/f").unwrap();
    let err = h.readdir(5).unwrap_err();
    assert!(err.entries.is_empty());
    assert!(matches!(err.source, VfsError::NotADirectory(p) if p == "/f"));
    h.close().unwrap();
}

#[test]
fn test_close_aggregates_both_failures() {
    let fs = mounted();
    fs.mkdir("/d", dir(0o755)).unwrap();
    let h = fs.open("/d").unwrap();
    assert!(h.has_file() && h.has_dir());

    fs.client().fail_closes(true);
    let err = h.close().unwrap_err();
    let VfsError::CloseFailed { first, second } = err.root_cause() else {
        panic!("expected CloseFailed, got {err:?}");
    };
    assert!(first.to_string().contains("injected close failure"));
    assert!(second.to_string().contains("injected close failure"));
    let msg = err.to_string();
    assert!(msg.starts_with("close /d: failed to close handle:"));
}

#[test]
fn test_close_single_failure_is_not_aggregated() {
    let fs = mounted();
    let h = fs.create("/f").unwrap();
    fs.client().fail_closes(true);
    let err = h.close().unwrap_err();
    assert!(matches!(err.root_cause(), VfsError::Remote(_)));
}

#[test]
fn test_oversized_io_is_an_error_not_a_panic() {
    let fs = mounted();
    let mut f = fs.create("/f").unwrap();
    let err = f.write_at(b"x", u64::MAX).unwrap_err();
    assert!(err.to_string().contains("ret=-27"));
    let err = f.truncate(u64::MAX).unwrap_err();
    assert!(matches!(err, VfsError::Remote(ref e) if e.ret() == Some(-27)));
    f.close().unwrap();
}

// ============================================================================
// Namespace
// ============================================================================

#[test]
fn test_remove_all_does_not_follow_symlinks() {
    let fs = mounted();
    fs.mkdir_all("/keep/inner", dir(0o755)).unwrap();
    fs.mkdir("/d", dir(0o755)).unwrap();
    fs.client().symlink("/keep", "/d/to-keep").unwrap();
    fs.client().mknod("/d/sock", S_IFSOCK | 0o600).unwrap();
    fs.client().mknod("/d/chr", S_IFCHR | 0o600).unwrap();

    fs.remove_all("/d").unwrap();
    assert!(!fs.exists("/d").unwrap());
    assert!(fs.stat("/keep/inner").unwrap().is_dir());
}

#[test]
fn test_remove_all_reports_close_failure() {
    let fs = mounted();
    fs.mkdir_all("/t/u", dir(0o755)).unwrap();
    fs.client().fail_closes(true);
    let err = fs.remove_all("/t").unwrap_err();
    assert!(matches!(err.root_cause(), VfsError::Remote(_)));
}

#[test]
fn test_stat_translates_mode() {
    let fs = mounted();
    fs.client().mknod("/tty", S_IFCHR | 0o620).unwrap();
    let info = fs.stat("/tty").unwrap();
    assert_eq!(info.mode().file_type(), FileType::CharDevice);
    assert_eq!(info.mode().perm(), 0o620);

    fs.mkdir("/tmp", dir(0o777)).unwrap();
    fs.chmod("/tmp", dir(0o777)).unwrap();
    let raw = fs.stat("/tmp").unwrap().raw().mode;
    assert_eq!(raw & S_IFDIR, S_IFDIR);
    assert!(!to_file_mode(raw).contains(FileMode::STICKY));
    assert!(to_file_mode(raw | S_ISVTX).contains(FileMode::STICKY));
}

#[test]
fn test_chtimes_is_unsupported() {
    let fs = mounted();
    let now = SystemTime::now();
    let err = fs.chtimes("/", now, now).unwrap_err();
    assert_eq!(err.to_string(), "not implemented: chtimes");
}

#[test]
fn test_name() {
    assert_eq!(mounted().name(), "RemoteFs");
}

// ============================================================================
// Errors and lifecycle
// ============================================================================

#[test]
fn test_unclassified_errors_pass_through() {
    init_tracing();
    // never mounted: every call fails with a transport error
    let fs = RemoteFs::from_mount(MemoryRemote::new());
    let err = fs.stat("/").unwrap_err();
    assert!(matches!(err, VfsError::Remote(_)));
    assert_eq!(
        err.to_string(),
        "remote: ret=-107, Transport endpoint is not connected"
    );
}

#[test]
fn test_convert_result_passes_success() {
    let ok: Result<&str, RemoteError> = Ok("fine");
    assert_eq!(convert_result(ok).unwrap(), "fine");
}

#[test]
fn test_connect_and_unmount() {
    init_tracing();
    let config = RemoteConfig::parse_args("--name=client.tester -k=/run/keyring");
    let fs = RemoteFs::<MemoryRemote>::connect(&config).unwrap();
    assert_eq!(fs.client().id(), Some("tester"));
    assert_eq!(fs.client().config_option("keyring"), Some("/run/keyring"));

    let mut f = fs.create("/x").unwrap();
    f.write_str("data").unwrap();
    f.close().unwrap();
    fs.unmount().unwrap();
}

#[test]
fn test_connect_with_config_file() {
    init_tracing();
    let conf = tempfile::NamedTempFile::new().unwrap();
    let config = RemoteConfig {
        config_path: Some(conf.path().to_path_buf()),
        ..Default::default()
    };
    let fs = RemoteFs::<MemoryRemote>::connect(&config).unwrap();
    assert_eq!(fs.client().config_file(), Some(conf.path()));
    assert_eq!(fs.client().id(), None);
    fs.unmount().unwrap();
}

#[test]
fn test_unmount_twice_is_impossible_but_unmounted_client_errors() {
    init_tracing();
    let mut remote = MemoryRemote::new();
    remote.mount().unwrap();
    remote.unmount().unwrap();
    let fs = RemoteFs::from_mount(remote);
    let err = fs.unmount().unwrap_err();
    assert!(err.to_string().starts_with("unmount /: "));
}
