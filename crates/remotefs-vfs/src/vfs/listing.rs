//! Paginated directory listing over a single-entry cursor.
//!
//! Backends expose directories as a cursor that yields one entry per call
//! and `None` once exhausted. [`read_entries`] turns that into the
//! `readdir(count)` contract:
//!
//! - `count <= 0` reads until the cursor is exhausted.
//! - `count > 0` returns at most `count` entries. Running out early is not an
//!   error; the caller gets what was there. A bounded call that returns an
//!   empty vector means the directory has been fully read.
//! - `.` and `..` are dropped before they reach the transform and never count
//!   toward the bound.
//! - On a read or transform failure the entries collected so far come back
//!   inside [`PartialListing`].
//!
//! Entries come back in whatever order the cursor produces them. Nothing here
//! sorts, and two listings of the same directory may disagree on order.

use super::error::{Listing, PartialListing, VfsResult};

/// A raw directory entry that knows its own name.
pub trait NamedEntry {
    fn entry_name(&self) -> &str;
}

/// Returns true for the `.` and `..` pseudo-entries.
pub fn is_dot_entry(name: &str) -> bool {
    name == "." || name == ".."
}

/// Lazy, forward-only sequence of directory entries with `.` and `..`
/// removed.
///
/// The underlying cursor cannot be rewound; once this iterator has returned
/// `None` (or an error) it stays exhausted.
pub struct Entries<F> {
    next: F,
    done: bool,
}

/// Wrap a single-entry read primitive as an [`Entries`] iterator.
pub fn entries<E, F>(next: F) -> Entries<F>
where
    E: NamedEntry,
    F: FnMut() -> VfsResult<Option<E>>,
{
    Entries { next, done: false }
}

impl<E, F> Iterator for Entries<F>
where
    E: NamedEntry,
    F: FnMut() -> VfsResult<Option<E>>,
{
    type Item = VfsResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match (self.next)() {
                Ok(Some(entry)) if is_dot_entry(entry.entry_name()) => continue,
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Read up to `count` entries from a cursor, passing each through `transform`.
///
/// See the module docs for the meaning of `count`.
pub fn read_entries<E, T, F, G>(next: F, count: i64, mut transform: G) -> Listing<T>
where
    E: NamedEntry,
    F: FnMut() -> VfsResult<Option<E>>,
    G: FnMut(E) -> VfsResult<T>,
{
    let bound = usize::try_from(count).ok().filter(|n| *n > 0);
    let mut out = Vec::new();
    let mut cursor = entries(next);

    // Check the bound before pulling so no entry is consumed and dropped.
    while bound.is_none_or(|max| out.len() < max) {
        let entry = match cursor.next() {
            None => break,
            Some(Ok(entry)) => entry,
            Some(Err(e)) => return Err(PartialListing::new(out, e)),
        };
        match transform(entry) {
            Ok(item) => out.push(item),
            Err(e) => return Err(PartialListing::new(out, e)),
        }
    }
    Ok(out)
}
