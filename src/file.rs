//! File lookup and the cluster-chain read engine.

use std::io::{self, SeekFrom};

use crate::device::ReadSeek;
use crate::dir_entry::{format_short_name, FileAttributes, RawDirEntry, DIR_ENTRY_SIZE};
use crate::error::{Error, Result};
use crate::fs::Volume;
use crate::table::ClusterChain;

/// An open regular file: its size, cluster chain, and read cursor.
///
/// Borrows the `Volume` it was opened against (not the `BlockDevice`
/// directly) so a `FileHandle` can never outlive the volume that
/// computed its cluster offsets. It never closes or otherwise owns the
/// `Volume`.
pub struct FileHandle<'vol, 'dev, R: ReadSeek> {
    volume: &'vol Volume<'dev, R>,
    chain: ClusterChain,
    file_size: u64,
    pos: u64,
}

impl<'vol, 'dev, R: ReadSeek> FileHandle<'vol, 'dev, R> {
    /// Looks `name` up in the root directory and opens it for
    /// reading.
    pub fn open(volume: &'vol Volume<'dev, R>, name: &str) -> Result<Self> {
        let raw_table = volume.read_root_dir_raw()?;
        let entry = find_entry(&raw_table, name)?;

        if entry.attr.intersects(FileAttributes::DIRECTORY | FileAttributes::VOLUME_ID) {
            return Err(Error::IsDirectory);
        }

        let chain = volume.cluster_chain(entry.first_cluster())?;
        let file_size = entry.file_size as u64;
        if chain.is_empty() && file_size > 0 {
            log::warn!("file {:?} has size {} but an empty cluster chain", name, file_size);
            return Err(Error::Corrupt);
        }

        Ok(FileHandle { volume, chain, file_size, pos: 0 })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Reads up to `element_count` whole elements of `element_size`
    /// bytes each into `buf`, returning the number of whole elements
    /// actually produced.
    ///
    /// `buf` must be at least `element_size * element_count` bytes;
    /// a smaller buffer is a caller error (`Fault`).
    pub fn read_into(&mut self, buf: &mut [u8], element_size: usize, element_count: usize) -> Result<usize> {
        if element_size == 0 || element_count == 0 {
            return Ok(0);
        }
        let want = element_size.checked_mul(element_count).ok_or(Error::Fault)?;
        if buf.len() < want {
            return Err(Error::Fault);
        }

        let bytes_per_cluster = self.volume.bytes_per_cluster();
        let mut delivered = 0usize;

        while delivered < want && self.pos < self.file_size {
            let ci = (self.pos / bytes_per_cluster) as usize;
            if ci >= self.chain.len() {
                log::warn!("read cursor outpaced cluster chain (pos {}, chain len {})", self.pos, self.chain.len());
                break;
            }
            let co = self.pos % bytes_per_cluster;
            let cluster = self.chain.get(ci).expect("ci checked above");

            let remaining_in_cluster = bytes_per_cluster - co;
            let remaining_wanted = (want - delivered) as u64;
            let remaining_in_file = self.file_size - self.pos;
            let chunk = remaining_in_cluster.min(remaining_wanted).min(remaining_in_file) as usize;
            if chunk == 0 {
                break;
            }

            let offset = self.volume.cluster_offset(cluster) + co;
            let read = self.volume.device().read_bytes(offset, &mut buf[delivered..delivered + chunk])?;
            if read == 0 {
                break;
            }

            self.pos += read as u64;
            delivered += read;
            if read < chunk {
                break;
            }
        }

        Ok(delivered / element_size)
    }

    /// Moves the read cursor. On `OutOfRange`, `pos` is left
    /// unchanged.
    pub fn seek_to(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Set => 0i64,
            Whence::Cur => self.pos as i64,
            Whence::End => self.file_size as i64,
        };
        let target = base.checked_add(offset).ok_or(Error::OutOfRange)?;
        if target < 0 || target as u64 > self.file_size {
            return Err(Error::OutOfRange);
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    /// Releases the handle's cluster chain and directory-entry copy.
    /// Does not close the volume.
    pub fn close(self) {}
}

/// Seek origin for `FileHandle::seek_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Scans the raw root directory table for a byte-exact, case-sensitive
/// match of `name` against each entry's formatted 8.3 name. Deleted
/// entries, LFN fragments, and the end-of-directory marker are skipped
/// the same way directory enumeration skips them, since a lookup must
/// not match a slot a listing would never show.
fn find_entry(table: &[u8], name: &str) -> Result<RawDirEntry> {
    for chunk in table.chunks(DIR_ENTRY_SIZE) {
        if chunk.len() < DIR_ENTRY_SIZE {
            break;
        }
        let raw = RawDirEntry::decode(chunk);
        if raw.is_end() {
            break;
        }
        if raw.is_deleted() || raw.is_lfn_fragment() || raw.is_volume_label() {
            continue;
        }
        if format_short_name(&raw.name).as_deref() == Some(name) {
            return Ok(raw);
        }
    }
    Err(Error::NotFound)
}

/// Convenience layer over the element-counting API above: standard
/// `std::io::Read`/`Seek`, built in terms of `read_into`/`seek_to`.
impl<'vol, 'dev, R: ReadSeek> io::Read for FileHandle<'vol, 'dev, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_into(buf, 1, buf.len()).map_err(io_error)?;
        Ok(n)
    }
}

impl<'vol, 'dev, R: ReadSeek> io::Seek for FileHandle<'vol, 'dev, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (whence, offset) = match pos {
            SeekFrom::Start(n) => (Whence::Set, n as i64),
            SeekFrom::Current(n) => (Whence::Cur, n),
            SeekFrom::End(n) => (Whence::End, n),
        };
        self.seek_to(offset, whence).map_err(io_error)
    }
}

fn io_error(err: Error) -> io::Error {
    match err {
        Error::Io(io_err) => io_err,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BlockDevice;
    use crate::fs::Volume;
    use crate::test_util::{build_image, dir_entry_bytes, set_fat12_entry};
    use std::io::{Cursor, Read as _, Seek as _};

    fn open_volume(image: Vec<u8>) -> BlockDevice<Cursor<Vec<u8>>> {
        BlockDevice::from_stream(Cursor::new(image)).unwrap()
    }

    #[test]
    fn opens_and_reads_a_single_cluster_file() {
        let contents = b"Hello, FAT!\n";
        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 2, 0xFFF);
        let root = dir_entry_bytes(b"HELLO   TXT", 0x20, 2, contents.len() as u32);

        let mut data = vec![0u8; 512];
        data[0..contents.len()].copy_from_slice(contents);

        let image = build_image(&root, &fat, &data);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "HELLO.TXT").unwrap();

        let mut buf = [0u8; 64];
        let n = file.read_into(&mut buf, 1, 64).unwrap();
        assert_eq!(n, contents.len());
        assert_eq!(&buf[..n], contents);

        let n2 = file.read_into(&mut buf, 1, 64).unwrap();
        assert_eq!(n2, 0);
    }

    #[test]
    fn zero_size_file_opens_and_all_reads_return_zero() {
        let root = dir_entry_bytes(b"EMPTY      ", 0x20, 0, 0);
        let image = build_image(&root, &vec![0u8; 512], &[]);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "EMPTY").unwrap();
        assert_eq!(file.file_size(), 0);

        let mut buf = [0u8; 4];
        assert_eq!(file.read_into(&mut buf, 1, 4).unwrap(), 0);
        assert_eq!(file.pos(), 0);
    }

    #[test]
    fn zero_element_size_or_count_returns_zero_without_moving_pos() {
        let contents = b"abcdef";
        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 2, 0xFFF);
        let root = dir_entry_bytes(b"Z          ", 0x20, 2, contents.len() as u32);
        let mut data = vec![0u8; 512];
        data[0..contents.len()].copy_from_slice(contents);
        let image = build_image(&root, &fat, &data);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "Z").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(file.read_into(&mut buf, 0, 8).unwrap(), 0);
        assert_eq!(file.pos(), 0);
        assert_eq!(file.read_into(&mut buf, 8, 0).unwrap(), 0);
        assert_eq!(file.pos(), 0);
    }

    #[test]
    fn file_size_exact_multiple_of_cluster_size_reads_fully_without_phantom_cluster() {
        let contents: Vec<u8> = (0..512u32).map(|i| (i % 251) as u8).collect();
        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 2, 0xFFF);
        let root = dir_entry_bytes(b"EXACT      ", 0x20, 2, contents.len() as u32);
        let image = build_image(&root, &fat, &contents);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "EXACT").unwrap();

        let mut buf = vec![0u8; contents.len()];
        let n = file.read_into(&mut buf, 1, contents.len()).unwrap();
        assert_eq!(n, contents.len());
        assert_eq!(buf, contents);
        assert_eq!(file.pos(), contents.len() as u64);

        // Chain has exactly one cluster; a further read must not address a
        // phantom second cluster, it must see pos == file_size and stop.
        let mut extra = [0u8; 1];
        assert_eq!(file.read_into(&mut extra, 1, 1).unwrap(), 0);
    }

    #[test]
    fn not_found_for_unknown_name() {
        let image = build_image(&[], &[0u8; 512], &[]);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        assert!(matches!(FileHandle::open(&vol, "NOPE.TXT"), Err(Error::NotFound)));
    }

    #[test]
    fn directory_entry_is_rejected() {
        let root = dir_entry_bytes(b"SUBDIR     ", 0x10, 0, 0);
        let image = build_image(&root, &[0u8; 512], &[]);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        assert!(matches!(FileHandle::open(&vol, "SUBDIR"), Err(Error::IsDirectory)));
    }

    #[test]
    fn multi_cluster_read_concatenates_clusters_in_chain_order() {
        let bytes_per_cluster = 1024u64;
        let file_size = 2600usize;

        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 5, 9);
        set_fat12_entry(&mut fat, 9, 6);
        set_fat12_entry(&mut fat, 6, 0xFFF);
        let root = dir_entry_bytes(b"BIG        ", 0x20, 5, file_size as u32);

        let mut expected = vec![0u8; file_size];
        for (i, b) in expected.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }

        // cluster numbering in build_image is 1 sector == 1 cluster by
        // default, so build a custom image with 2-sector clusters.
        let image = build_custom_image(&root, &fat, &expected, bytes_per_cluster, &[5, 9, 6]);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "BIG").unwrap();

        let mut buf = vec![0u8; file_size];
        let n = file.read_into(&mut buf, 1, file_size).unwrap();
        assert_eq!(n, file_size);
        assert_eq!(buf, expected);
    }

    #[test]
    fn seek_past_end_is_rejected_and_leaves_pos_unchanged() {
        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 2, 0xFFF);
        let root = dir_entry_bytes(b"F          ", 0x20, 2, 100);
        let image = build_image(&root, &fat, &vec![0u8; 512]);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "F").unwrap();

        assert!(matches!(file.seek_to(101, Whence::Set), Err(Error::OutOfRange)));
        assert_eq!(file.pos(), 0);

        assert_eq!(file.seek_to(0, Whence::End).unwrap(), 100);
        let mut buf = [0u8; 1];
        assert_eq!(file.read_into(&mut buf, 1, 1).unwrap(), 0);
    }

    #[test]
    fn corrupt_self_referential_chain_fails_open() {
        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 2, 2); // points at itself
        let root = dir_entry_bytes(b"F          ", 0x20, 2, 10);
        let image = build_image(&root, &fat, &vec![0u8; 512]);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        assert!(matches!(FileHandle::open(&vol, "F"), Err(Error::Corrupt)));
    }

    #[test]
    fn std_io_read_and_seek_traits_delegate_to_element_api() {
        let contents = b"abcdef";
        let mut fat = vec![0u8; 512];
        set_fat12_entry(&mut fat, 2, 0xFFF);
        let root = dir_entry_bytes(b"T          ", 0x20, 2, contents.len() as u32);
        let mut data = vec![0u8; 512];
        data[0..contents.len()].copy_from_slice(contents);
        let image = build_image(&root, &fat, &data);
        let device = open_volume(image);
        let vol = Volume::open(&device, 0).unwrap();
        let mut file = FileHandle::open(&vol, "T").unwrap();

        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        assert_eq!(out, contents);

        file.seek(SeekFrom::Start(0)).unwrap();
        let mut one = [0u8; 1];
        file.read_exact(&mut one).unwrap();
        assert_eq!(&one, b"a");
    }

    /// Builds an image whose data region uses `bytes_per_cluster`-sized
    /// clusters (rather than the 512-byte default `build_image` uses)
    /// so a chain can be laid out at specific, non-contiguous cluster
    /// numbers with the data placed at the matching absolute offsets.
    fn build_custom_image(root: &[u8], fat: &[u8], data: &[u8], bytes_per_cluster: u64, chain: &[u16]) -> Vec<u8> {
        use byteorder::{ByteOrder, LittleEndian};

        let sectors_per_cluster = (bytes_per_cluster / 512) as u8;
        let root_dir_capacity: u16 = 16;
        let reserved_sectors: u16 = 1;
        let fats_count: u8 = 2;
        let sectors_per_fat: u16 = 1;

        let root_dir_bytes = root_dir_capacity as usize * DIR_ENTRY_SIZE;
        let root_dir_sectors = (root_dir_bytes + 511) / 512;
        let data_start = reserved_sectors as usize + fats_count as usize * sectors_per_fat as usize + root_dir_sectors;

        let highest_cluster = *chain.iter().max().unwrap() as usize;
        let data_region_sectors = (highest_cluster + 1) * sectors_per_cluster as usize;
        let total_sectors = data_start + data_region_sectors;

        let mut image = vec![0u8; total_sectors * 512];
        LittleEndian::write_u16(&mut image[11..13], 512);
        image[13] = sectors_per_cluster;
        LittleEndian::write_u16(&mut image[14..16], reserved_sectors);
        image[16] = fats_count;
        LittleEndian::write_u16(&mut image[17..19], root_dir_capacity);
        LittleEndian::write_u16(&mut image[19..21], total_sectors as u16);
        LittleEndian::write_u16(&mut image[22..24], sectors_per_fat);
        LittleEndian::write_u16(&mut image[510..512], 0xAA55);

        for fat_copy in 0..fats_count as usize {
            let start = (reserved_sectors as usize + fat_copy * sectors_per_fat as usize) * 512;
            image[start..start + fat.len()].copy_from_slice(fat);
        }

        let root_start = (reserved_sectors as usize + fats_count as usize * sectors_per_fat as usize) * 512;
        image[root_start..root_start + root.len()].copy_from_slice(root);

        let mut written = 0usize;
        for &cluster in chain {
            let cluster_start = (data_start * 512) + (cluster as usize - 2) * bytes_per_cluster as usize;
            let remaining = data.len() - written;
            let take = remaining.min(bytes_per_cluster as usize);
            image[cluster_start..cluster_start + take].copy_from_slice(&data[written..written + take]);
            written += take;
        }

        image
    }
}
