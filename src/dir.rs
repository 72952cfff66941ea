//! Root directory enumeration.

use crate::device::ReadSeek;
use crate::dir_entry::{visible_entries, DirEntryView};
use crate::error::{Error, Result};
use crate::fs::Volume;

/// A handle over the root directory's entries.
///
/// Only the root path is supported: this crate does not traverse
/// subdirectories. The full visible-entry list is decoded once at
/// `open` time and then walked by `cursor`.
pub struct DirHandle<'vol, 'dev, R: ReadSeek> {
    #[allow(dead_code)]
    volume: &'vol Volume<'dev, R>,
    entries: Vec<DirEntryView>,
    cursor: usize,
}

impl<'vol, 'dev, R: ReadSeek> DirHandle<'vol, 'dev, R> {
    /// Opens a directory handle for `path`, which must be the root
    /// (conventionally `"\"`). Any other path is `NotFound`.
    pub fn open(volume: &'vol Volume<'dev, R>, path: &str) -> Result<Self> {
        if path != "\\" {
            return Err(Error::NotFound);
        }
        let raw = volume.read_root_dir_raw()?;
        let entries = visible_entries(&raw)?.into_iter().map(|(_, view)| view).collect();
        Ok(DirHandle { volume, entries, cursor: 0 })
    }

    /// Advances the cursor and returns the next visible entry, or
    /// `None` once the cursor reaches the end of the visible-entry
    /// list.
    pub fn read(&mut self) -> Option<&DirEntryView> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        let entry = &self.entries[self.cursor];
        self.cursor += 1;
        Some(entry)
    }

    /// Resets the cursor so a subsequent `read` starts from the first
    /// visible entry again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Releases the handle. Dropping it has the same effect; provided
    /// for symmetry with the rest of the API surface.
    pub fn close(self) {}
}
