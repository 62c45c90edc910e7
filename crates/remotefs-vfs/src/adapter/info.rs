//! Metadata records for remote entries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::mode::to_file_mode;
use crate::remote::{RawStat, Timespec};
use crate::vfs::{FileInfo, FileMode, base_name};

/// Metadata of a remote file, as of the stat call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileInfo {
    path: String,
    stat: RawStat,
}

impl RemoteFileInfo {
    pub fn new(path: impl Into<String>, stat: RawStat) -> Self {
        Self {
            path: path.into(),
            stat,
        }
    }

    /// Logical path the record was produced for.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw stat structure, for callers that need fields the generic
    /// record does not expose (inode, owner, link count).
    pub fn raw(&self) -> &RawStat {
        &self.stat
    }
}

impl FileInfo for RemoteFileInfo {
    fn name(&self) -> &str {
        base_name(&self.path)
    }

    fn size(&self) -> i64 {
        self.stat.size as i64
    }

    fn mode(&self) -> FileMode {
        to_file_mode(self.stat.mode)
    }

    fn modified(&self) -> SystemTime {
        to_system_time(self.stat.mtime)
    }
}

/// Seconds plus nanoseconds since the epoch; negative seconds count back.
pub(crate) fn to_system_time(ts: Timespec) -> SystemTime {
    let nanos = Duration::from_nanos(u64::from(ts.nsec));
    let base = if ts.sec >= 0 {
        UNIX_EPOCH + Duration::from_secs(ts.sec as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(ts.sec.unsigned_abs())
    };
    base + nanos
}
