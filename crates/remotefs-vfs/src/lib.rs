//! # remotefs-vfs
//!
//! A remote POSIX-like filesystem client presented as an interchangeable
//! virtual filesystem backend.
//!
//! Code written against [`vfs::Fs`] and [`vfs::File`] runs unchanged on:
//! - [`RemoteFs`] - a mounted remote client (anything implementing
//!   [`remote::RemoteMount`], including the in-process [`MemoryRemote`])
//! - [`LocalFs`] - a directory on local disk
//!
//! ```no_run
//! use remotefs_vfs::{MemoryRemote, RemoteConfig, RemoteFs};
//! use remotefs_vfs::vfs::{File, Fs};
//! use std::io::Write;
//!
//! # fn main() -> remotefs_vfs::vfs::VfsResult<()> {
//! let fs = RemoteFs::<MemoryRemote>::connect(&RemoteConfig::from_env())?;
//! let mut f = fs.create("/hello.txt")?;
//! f.write_all(b"hello")?;
//! f.close()?;
//! fs.remove_all("/hello.txt")?;
//! fs.unmount()
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod local;
pub mod remote;
pub mod vfs;

pub use adapter::{RemoteFileInfo, RemoteFs, RemoteHandle};
pub use config::RemoteConfig;
pub use local::LocalFs;
pub use remote::MemoryRemote;
