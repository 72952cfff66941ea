//! A read-only FAT12 filesystem reader operating on a disk image.
//!
//! Mount a [`BlockDevice`] over any `Read + Seek` stream, open a
//! [`Volume`] against it, then list the root directory with
//! [`DirHandle`] or open individual files with [`FileHandle`]. There
//! is no write support, no subdirectory traversal, and no long
//! filename handling — see each module's doc comment for the exact
//! boundary.
//!
//! ```no_run
//! use fat12fs::{BlockDevice, Volume, DirHandle};
//!
//! # fn main() -> fat12fs::Result<()> {
//! let device = BlockDevice::open("floppy.img")?;
//! let volume = Volume::open(&device, 0)?;
//! let mut root = DirHandle::open(&volume, "\\")?;
//! while let Some(entry) = root.read() {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

mod bpb;
mod device;
mod dir;
mod dir_entry;
mod error;
mod file;
mod fs;
mod table;

#[cfg(test)]
mod test_util;

pub use bpb::Bpb;
pub use device::{BlockDevice, ReadSeek, SECTOR};
pub use dir::DirHandle;
pub use dir_entry::{DirEntryView, FileAttributes};
pub use error::{Error, Result};
pub use file::{FileHandle, Whence};
pub use fs::Volume;
pub use table::ClusterChain;
