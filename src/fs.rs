//! The `Volume` type: binds a `BlockDevice` to a decoded `Bpb` and
//! computes the sector-level layout the rest of the crate reads
//! through.

use crate::bpb::Bpb;
use crate::device::{BlockDevice, ReadSeek, SECTOR};
use crate::dir_entry::DIR_ENTRY_SIZE;
use crate::error::{Error, Result};
use crate::table::{self, ClusterChain};

/// Derived, cached sector offsets computed once when the volume is
/// opened.
#[derive(Debug, Clone, Copy)]
struct Layout {
    fat_start: u64,
    root_dir_start: u64,
    root_dir_sectors: u64,
    data_start: u64,
    bytes_per_cluster: u64,
    total_data_clusters: u32,
}

/// A mounted FAT12 volume: a `BlockDevice` plus the decoded BPB and
/// the offsets derived from it.
///
/// Borrows the device rather than owning it so one `BlockDevice` can
/// back several volumes (e.g. one per partition); the device must
/// outlive every `Volume` opened against it, which the borrow checker
/// enforces directly instead of via a runtime check.
pub struct Volume<'dev, R: ReadSeek> {
    device: &'dev BlockDevice<R>,
    bpb: Bpb,
    layout: Layout,
}

impl<'dev, R: ReadSeek> Volume<'dev, R> {
    /// Reads the boot sector at `first_sector` (typically 0), decodes
    /// and validates the BPB, and computes the volume layout.
    pub fn open(device: &'dev BlockDevice<R>, first_sector: u64) -> Result<Self> {
        let mut sector = [0u8; SECTOR as usize];
        let read = device.read(first_sector, &mut sector, 1)?;
        if read < 1 {
            return Err(Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
        }
        let bpb = Bpb::decode(&sector)?;

        let root_dir_bytes = bpb.root_dir_capacity as u64 * DIR_ENTRY_SIZE as u64;
        let root_dir_sectors = (root_dir_bytes + SECTOR - 1) / SECTOR;
        let fat_start = first_sector + bpb.reserved_sectors as u64;
        let root_dir_start = fat_start + bpb.fats_count as u64 * bpb.sectors_per_fat as u64;
        let data_start = root_dir_start + root_dir_sectors;
        let bytes_per_cluster = bpb.sectors_per_cluster as u64 * SECTOR;

        let total_sectors = bpb.total_sectors() as u64;
        if total_sectors < data_start {
            log::warn!("BPB total_sectors {} smaller than computed data_start {}", total_sectors, data_start);
            return Err(Error::Corrupt);
        }
        let data_sectors = total_sectors - data_start;
        let total_data_clusters = (data_sectors / bpb.sectors_per_cluster as u64) as u32;

        let volume_end = first_sector + total_sectors;
        if volume_end > device.sector_count() {
            log::warn!(
                "volume claims {} sectors but device only has {}",
                volume_end,
                device.sector_count()
            );
            return Err(Error::Corrupt);
        }

        log::debug!(
            "volume layout: fat_start={} root_dir_start={} ({} sectors) data_start={} {} data clusters",
            fat_start,
            root_dir_start,
            root_dir_sectors,
            data_start,
            total_data_clusters
        );

        Ok(Volume {
            device,
            bpb,
            layout: Layout { fat_start, root_dir_start, root_dir_sectors, data_start, bytes_per_cluster, total_data_clusters },
        })
    }

    /// Releases the volume. Does not close the underlying device;
    /// dropping a `Volume` has the same effect, this is provided for
    /// symmetry with the rest of the API surface.
    pub fn close(self) {}

    pub fn bpb(&self) -> &Bpb {
        &self.bpb
    }

    pub(crate) fn device(&self) -> &'dev BlockDevice<R> {
        self.device
    }

    pub fn root_dir_capacity(&self) -> u16 {
        self.bpb.root_dir_capacity
    }

    pub(crate) fn bytes_per_cluster(&self) -> u64 {
        self.layout.bytes_per_cluster
    }

    /// Absolute byte offset where cluster `n` (n >= 2) begins.
    pub(crate) fn cluster_offset(&self, cluster: u16) -> u64 {
        debug_assert!(cluster >= 2);
        self.layout.data_start * SECTOR + (cluster as u64 - 2) * self.layout.bytes_per_cluster
    }

    /// Reads the raw root directory table: `root_dir_capacity` entries
    /// of `DIR_ENTRY_SIZE` bytes each.
    pub(crate) fn read_root_dir_raw(&self) -> Result<Vec<u8>> {
        let len = self.bpb.root_dir_capacity as usize * DIR_ENTRY_SIZE;
        let mut buf = vec![0u8; self.layout.root_dir_sectors as usize * SECTOR as usize];
        let read = self.device.read(self.layout.root_dir_start, &mut buf, self.layout.root_dir_sectors)?;
        if read < self.layout.root_dir_sectors {
            return Err(Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
        }
        buf.truncate(len);
        Ok(buf)
    }

    /// Reads exactly one copy of the FAT (`sectors_per_fat` sectors
    /// starting at `fat_start`).
    pub(crate) fn read_fat(&self) -> Result<Vec<u8>> {
        let sectors = self.bpb.sectors_per_fat as u64;
        let mut buf = vec![0u8; sectors as usize * SECTOR as usize];
        let read = self.device.read(self.layout.fat_start, &mut buf, sectors)?;
        if read < sectors {
            return Err(Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
        }
        Ok(buf)
    }

    /// Builds the cluster chain for a file whose directory entry names
    /// `first_cluster` as its first cluster.
    pub(crate) fn cluster_chain(&self, first_cluster: u16) -> Result<ClusterChain> {
        let fat = self.read_fat()?;
        table::walk_chain(&fat, first_cluster, self.layout.total_data_clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::build_image;
    use std::io::Cursor;

    #[test]
    fn opens_and_computes_layout() {
        let image = build_image(&[], &[0u8; 512], &[]);
        let device = BlockDevice::from_stream(Cursor::new(image)).unwrap();
        let vol = Volume::open(&device, 0).unwrap();
        assert_eq!(vol.bpb().sectors_per_fat, 1);
        assert_eq!(vol.root_dir_capacity(), 16);
        assert_eq!(vol.bytes_per_cluster(), 512);
    }

    #[test]
    fn rejects_truncated_device() {
        let mut image = build_image(&[], &[0u8; 512], &[]);
        image.truncate(600); // shorter than declared total_sectors
        let device = BlockDevice::from_stream(Cursor::new(image)).unwrap();
        assert!(matches!(Volume::open(&device, 0), Err(Error::Corrupt)));
    }
}
