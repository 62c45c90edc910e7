//! Line-oriented shell over any [`Fs`] backend.
//!
//! Each input line is one command; failures are printed and the shell keeps
//! going. The same shell drives every backend, which is the point: nothing
//! here knows where the bytes live.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{BufRead, Read, Write};

use remotefs_vfs::vfs::{File, FileInfo, FileMode, Fs, OpenFlags};

pub const PROMPT: &str = ">>> ";

const HELP: &str = "\
commands:
  list [path] [count]   list a directory (count <= 0 lists everything)
  create <path>         create or truncate a file
  mkdir <path>          create a directory
  stat <path>           show metadata as JSON
  rm <path>             remove a file or empty directory
  rmall <path>          remove a path recursively
  mv <from> <to>        rename
  cat <path>            print a file
  write <path> <text>   replace a file's contents with text
  chmod <mode> <path>   set permission bits (octal)
  help                  show this help
  exit | quit           leave the shell";

/// Whether the shell should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Serialize)]
struct StatOutput<'a> {
    name: &'a str,
    size: i64,
    mode: u32,
    #[serde(rename = "isDir")]
    is_dir: bool,
}

/// Interactive shell over a filesystem.
pub struct Shell<F> {
    fs: F,
}

impl<F: Fs> Shell<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Give back the filesystem, e.g. to unmount it.
    pub fn into_inner(self) -> F {
        self.fs
    }

    /// Read commands from `input` until it ends or `exit` is given.
    pub fn run(&self, input: impl BufRead, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Interactive Shell ({})", self.fs.name())?;
        prompt(out)?;
        for line in input.lines() {
            let line = line.context("failed to read input")?;
            match self.execute(&line, out) {
                Ok(Flow::Exit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => writeln!(out, "error: {e:#}")?,
            }
            prompt(out)?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Run a single command line.
    pub fn execute(&self, line: &str, out: &mut dyn Write) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = words.collect();
        tracing::debug!(cmd, ?args, "executing");

        match cmd {
            "list" | "ls" => self.list(&args, out)?,
            "create" => {
                let path = one_arg(&args, "a file path or name")?;
                let file = self
                    .fs
                    .create(path)
                    .with_context(|| format!("failed to create {path}"))?;
                file.close().context("failed to close file")?;
                writeln!(out, "file created")?;
            }
            "mkdir" => {
                let path = one_arg(&args, "a directory path")?;
                self.fs
                    .mkdir(path, FileMode::from_bits_retain(0o755))
                    .context("failed to create directory")?;
            }
            "stat" => self.stat(&args, out)?,
            "rm" => {
                let path = one_arg(&args, "a file path")?;
                self.fs.remove(path).context("failed to remove file")?;
            }
            "rmall" => {
                let path = one_arg(&args, "a path")?;
                self.fs
                    .remove_all(path)
                    .with_context(|| format!("failed to remove {path}"))?;
            }
            "mv" => {
                let [from, to] = args[..] else {
                    bail!("usage: mv <from> <to>");
                };
                self.fs.rename(from, to).context("failed to rename")?;
            }
            "cat" => self.cat(&args, out)?,
            "write" => self.write_file(&args)?,
            "chmod" => {
                let [mode, path] = args[..] else {
                    bail!("usage: chmod <mode> <path>");
                };
                let mode = u32::from_str_radix(mode, 8)
                    .with_context(|| format!("invalid octal mode {mode:?}"))?;
                self.fs
                    .chmod(path, FileMode::from_bits_retain(mode))
                    .context("failed to change mode")?;
            }
            "help" => writeln!(out, "{HELP}")?,
            "exit" | "quit" => return Ok(Flow::Exit),
            other => bail!("unknown command {other:?}, try help"),
        }
        Ok(Flow::Continue)
    }

    fn list(&self, args: &[&str], out: &mut dyn Write) -> Result<()> {
        if args.len() > 2 {
            bail!("usage: list [path] [count]");
        }
        let path = args.first().copied().unwrap_or("/");
        let count = match args.get(1) {
            Some(n) => n
                .parse::<i64>()
                .with_context(|| format!("failed to parse {n:?} as a count"))?,
            None => 0,
        };

        let info = self
            .fs
            .stat(path)
            .with_context(|| format!("failed to access {path}"))?;
        if !info.is_dir() {
            writeln!(out, "{}", info.name())?;
            return Ok(());
        }

        let mut dir = self
            .fs
            .open(path)
            .with_context(|| format!("failed to open {path}"))?;
        let listing = dir.readdir_names(count);
        let closed = dir.close();

        // print whatever was read before reporting a failure
        let (names, failure) = match listing {
            Ok(names) => (names, None),
            Err(partial) => {
                let (names, err) = partial.into_parts();
                (names, Some(err))
            }
        };
        for name in names {
            writeln!(out, "{name}")?;
        }
        if let Some(err) = failure {
            return Err(err).context("failed to read directory");
        }
        closed.context("failed to close directory")
    }

    fn stat(&self, args: &[&str], out: &mut dyn Write) -> Result<()> {
        let path = one_arg(args, "a file path")?;
        let info = self.fs.stat(path).context("failed to open file")?;
        let json = serde_json::to_string_pretty(&StatOutput {
            name: info.name(),
            size: info.size(),
            mode: info.mode().bits(),
            is_dir: info.is_dir(),
        })
        .context("failed to marshal file info")?;
        writeln!(out, "{json}")?;
        Ok(())
    }

    fn cat(&self, args: &[&str], out: &mut dyn Write) -> Result<()> {
        let path = one_arg(args, "a file path")?;
        let mut file = self
            .fs
            .open(path)
            .with_context(|| format!("failed to open {path}"))?;
        let mut data = Vec::new();
        let read = file.read_to_end(&mut data);
        let closed = file.close();
        read.with_context(|| format!("failed to read {path}"))?;
        closed.context("failed to close file")?;

        out.write_all(&data)?;
        if !data.is_empty() && !data.ends_with(b"\n") {
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_file(&self, args: &[&str]) -> Result<()> {
        let Some((path, words)) = args.split_first() else {
            bail!("usage: write <path> <text>");
        };
        let mut file = self
            .fs
            .open_file(path, OpenFlags::create_truncate(), FileMode::from_bits_retain(0o644))
            .with_context(|| format!("failed to open {path}"))?;
        let written = file.write_str(&format!("{}\n", words.join(" ")));
        let closed = file.close();
        written.with_context(|| format!("failed to write {path}"))?;
        closed.context("failed to close file")
    }
}

fn one_arg<'a>(args: &[&'a str], what: &str) -> Result<&'a str> {
    match args {
        [] => bail!("you must provide {what}"),
        [one] => Ok(*one),
        _ => bail!("multiple inputs provided, we only expect one"),
    }
}

fn prompt(out: &mut dyn Write) -> Result<()> {
    write!(out, "{PROMPT}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use remotefs_vfs::remote::RemoteMount;
    use remotefs_vfs::{MemoryRemote, RemoteFs};

    fn shell() -> Shell<RemoteFs<MemoryRemote>> {
        let mut remote = MemoryRemote::new();
        remote.mount().unwrap();
        Shell::new(RemoteFs::from_mount(remote))
    }

    fn exec(shell: &Shell<RemoteFs<MemoryRemote>>, line: &str) -> Result<String> {
        let mut out = Vec::new();
        shell.execute(line, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_create_list_stat() {
        let sh = shell();
        assert_eq!(exec(&sh, "mkdir /d").unwrap(), "");
        assert_eq!(exec(&sh, "create /d/a").unwrap(), "file created\n");
        exec(&sh, "create /d/b").unwrap();

        assert_eq!(exec(&sh, "list /d").unwrap(), "a\nb\n");
        assert_eq!(exec(&sh, "list /d 1").unwrap(), "a\n");
        assert_eq!(exec(&sh, "list /d/a").unwrap(), "a\n");

        let json: serde_json::Value = serde_json::from_str(&exec(&sh, "stat /d").unwrap()).unwrap();
        assert_eq!(json["name"], "d");
        assert_eq!(json["isDir"], true);
        assert_eq!(json["size"], 0);
    }

    #[test]
    fn test_write_cat_mv_rm() {
        let sh = shell();
        exec(&sh, "write /f hello  there").unwrap();
        assert_eq!(exec(&sh, "cat /f").unwrap(), "hello there\n");

        exec(&sh, "mv /f /g").unwrap();
        assert!(exec(&sh, "cat /f").is_err());
        assert_eq!(exec(&sh, "cat /g").unwrap(), "hello there\n");

        exec(&sh, "chmod 600 /g").unwrap();
        let json: serde_json::Value = serde_json::from_str(&exec(&sh, "stat /g").unwrap()).unwrap();
        assert_eq!(json["mode"], 0o600);

        exec(&sh, "rm /g").unwrap();
        assert_eq!(exec(&sh, "list /").unwrap(), "");
    }

    #[test]
    fn test_rmall() {
        let sh = shell();
        exec(&sh, "mkdir /t").unwrap();
        exec(&sh, "mkdir /t/u").unwrap();
        exec(&sh, "write /t/u/f x").unwrap();
        assert!(exec(&sh, "rm /t").is_err());
        exec(&sh, "rmall /t").unwrap();
        exec(&sh, "rmall /t").unwrap();
        assert!(!sh.fs().exists("/t").unwrap());
    }

    #[test]
    fn test_argument_errors() {
        let sh = shell();
        let err = exec(&sh, "create").unwrap_err();
        assert_eq!(err.to_string(), "you must provide a file path or name");
        let err = exec(&sh, "rm a b").unwrap_err();
        assert_eq!(err.to_string(), "multiple inputs provided, we only expect one");
        assert!(exec(&sh, "list / many").is_err());
        assert!(exec(&sh, "chmod 9x9 /").is_err());
        assert!(exec(&sh, "frobnicate").is_err());
        assert_eq!(exec(&sh, "   ").unwrap(), "");
    }

    #[test]
    fn test_run_reports_errors_and_exits() {
        let sh = shell();
        let input = b"mkdir /a\nmkdir /a\nlist\nexit\ncreate /never\n";
        let mut out = Vec::new();
        sh.run(&input[..], &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.starts_with("Interactive Shell (RemoteFs)\n"));
        assert!(out.contains("error: failed to create directory: mkdir /a: already exists"));
        assert!(out.contains(">>> a\n"));
        assert!(!sh.fs().exists("/never").unwrap());
    }
}
