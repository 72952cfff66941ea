use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Size in bytes of a single sector on any volume this crate reads.
pub const SECTOR: u64 = 512;

/// A sum of `Read` and `Seek`, the minimum a block device's backing
/// stream must support.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A seekable byte stream presented as a fixed-size-sector block
/// device.
///
/// `BlockDevice` owns the stream and the sector count, computed once
/// at open time. All other components read through `&BlockDevice`,
/// using the interior `RefCell` to serialize the seek-then-read
/// pattern a sector read requires.
pub struct BlockDevice<R: ReadSeek> {
    stream: RefCell<R>,
    sector_count: u64,
}

impl BlockDevice<File> {
    /// Opens a disk image backed by a regular file.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound
            } else {
                Error::Io(err)
            }
        })?;
        Self::from_stream(file)
    }
}

impl<R: ReadSeek> BlockDevice<R> {
    /// Wraps an arbitrary seekable byte stream as a block device.
    ///
    /// The stream's length is measured once (truncating to whole
    /// sectors) and cached as `sector_count`.
    pub fn from_stream(mut stream: R) -> Result<Self> {
        let len = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        let sector_count = len / SECTOR;
        log::debug!("opened block device: {} sectors of {} bytes", sector_count, SECTOR);
        Ok(BlockDevice { stream: RefCell::new(stream), sector_count })
    }

    /// Total number of whole sectors available on the device.
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Reads `sectors_to_read` contiguous sectors starting at
    /// `first_sector` into `buf` (which must be at least
    /// `sectors_to_read * SECTOR` bytes long).
    ///
    /// Returns the number of whole sectors actually read; this can be
    /// less than requested if the underlying stream returns a short
    /// read, which the read engine treats as end-of-file rather than
    /// an error.
    pub fn read(&self, first_sector: u64, buf: &mut [u8], sectors_to_read: u64) -> Result<u64> {
        if sectors_to_read < 1 {
            return Err(Error::Fault);
        }
        if first_sector.checked_add(sectors_to_read).map_or(true, |end| end > self.sector_count) {
            return Err(Error::OutOfRange);
        }
        let want = (sectors_to_read * SECTOR) as usize;
        if buf.len() < want {
            return Err(Error::Fault);
        }
        let mut stream = self.stream.borrow_mut();
        stream.seek(SeekFrom::Start(first_sector * SECTOR))?;
        let mut total_read = 0usize;
        while total_read < want {
            let n = stream.read(&mut buf[total_read..want])?;
            if n == 0 {
                break;
            }
            total_read += n;
        }
        let sectors_read = (total_read as u64) / SECTOR;
        if sectors_read < sectors_to_read {
            log::trace!(
                "short read: wanted {} sectors from {}, got {}",
                sectors_to_read,
                first_sector,
                sectors_read
            );
        }
        Ok(sectors_read)
    }

    /// Reads at an arbitrary byte offset within the device, spanning
    /// sector boundaries as needed. Used by the file read engine,
    /// which addresses a cluster by an absolute byte range rather than
    /// a whole number of sectors.
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset.checked_add(buf.len() as u64).ok_or(Error::OutOfRange)?;
        if end > self.sector_count * SECTOR {
            return Err(Error::OutOfRange);
        }
        let mut stream = self.stream.borrow_mut();
        stream.seek(SeekFrom::Start(offset))?;
        let mut total_read = 0usize;
        while total_read < buf.len() {
            let n = stream.read(&mut buf[total_read..])?;
            if n == 0 {
                break;
            }
            total_read += n;
        }
        Ok(total_read)
    }

    /// Releases the backing stream. Dropping a `BlockDevice` has the
    /// same effect; provided for symmetry with the rest of the API
    /// surface.
    pub fn close(self) {}
}
