//! BIOS Parameter Block decoding and validation.
//!
//! Layout and field order follow the FAT12/16 boot sector as described
//! at <http://wiki.osdev.org/FAT> and
//! <https://www.win.tue.nl/~aeb/linux/fs/fat/fat-1.html>.

use byteorder::{ByteOrder, LittleEndian};

use crate::device::SECTOR;
use crate::error::{Error, Result};

const BOOT_SIGNATURE: u16 = 0xAA55;

/// Decoded BIOS Parameter Block (sector 0 of the volume).
///
/// Stores the full on-disk layout (including fields this crate never
/// interprets, like the volume label or boot code) so the struct
/// mirrors the actual 512-byte sector; only the fields named in the
/// data model are validated or exposed.
#[derive(Debug, Clone)]
pub struct Bpb {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fats_count: u8,
    pub root_dir_capacity: u16,
    total_sectors_16: u16,
    total_sectors_32: u32,
    pub sectors_per_fat: u16,
    volume_label: [u8; 11],
    fs_type_label: [u8; 8],
}

impl Bpb {
    /// Decodes and validates a BPB from a full 512-byte boot sector.
    ///
    /// Checks, in order: the trailing `0xAA55` signature, then
    /// `bytes_per_sector == 512`, `sectors_per_cluster >= 1`,
    /// `reserved_sectors >= 1`, `fats_count >= 1`. No heuristic
    /// repair is attempted; any violation is reported verbatim as
    /// `BadSignature` or `Corrupt`.
    pub fn decode(sector: &[u8; 512]) -> Result<Bpb> {
        let signature = LittleEndian::read_u16(&sector[510..512]);
        if signature != BOOT_SIGNATURE {
            return Err(Error::BadSignature);
        }

        let bytes_per_sector = LittleEndian::read_u16(&sector[11..13]);
        let sectors_per_cluster = sector[13];
        let reserved_sectors = LittleEndian::read_u16(&sector[14..16]);
        let fats_count = sector[16];
        let root_dir_capacity = LittleEndian::read_u16(&sector[17..19]);
        let total_sectors_16 = LittleEndian::read_u16(&sector[19..21]);
        let sectors_per_fat = LittleEndian::read_u16(&sector[22..24]);
        let total_sectors_32 = LittleEndian::read_u32(&sector[32..36]);

        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&sector[43..54]);
        let mut fs_type_label = [0u8; 8];
        fs_type_label.copy_from_slice(&sector[54..62]);

        let bpb = Bpb {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fats_count,
            root_dir_capacity,
            total_sectors_16,
            total_sectors_32,
            sectors_per_fat,
            volume_label,
            fs_type_label,
        };

        bpb.validate()?;
        log::debug!(
            "BPB: {} bytes/sector, {} sectors/cluster, {} reserved, {} FATs, {} root entries, {} sectors/FAT",
            bpb.bytes_per_sector,
            bpb.sectors_per_cluster,
            bpb.reserved_sectors,
            bpb.fats_count,
            bpb.root_dir_capacity,
            bpb.sectors_per_fat
        );
        Ok(bpb)
    }

    fn validate(&self) -> Result<()> {
        if self.bytes_per_sector as u64 != SECTOR {
            log::warn!("unsupported bytes_per_sector {}", self.bytes_per_sector);
            return Err(Error::Corrupt);
        }
        if self.sectors_per_cluster < 1 || !self.sectors_per_cluster.is_power_of_two() {
            log::warn!("invalid sectors_per_cluster {}", self.sectors_per_cluster);
            return Err(Error::Corrupt);
        }
        if self.reserved_sectors < 1 {
            log::warn!("invalid reserved_sectors {}", self.reserved_sectors);
            return Err(Error::Corrupt);
        }
        if self.fats_count < 1 {
            log::warn!("invalid fats_count {}", self.fats_count);
            return Err(Error::Corrupt);
        }
        Ok(())
    }

    /// Total sector count declared in the BPB: the 16-bit field if
    /// non-zero, otherwise the 32-bit field.
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 == 0 {
            self.total_sectors_32
        } else {
            self.total_sectors_16 as u32
        }
    }

    /// Volume label as raw OEM-codepage bytes, trimmed of trailing
    /// spaces. Exposed for completeness; this crate does not interpret
    /// character encodings beyond ASCII.
    pub fn volume_label_bytes(&self) -> &[u8] {
        let len = self.volume_label.iter().rposition(|b| *b != b' ').map(|p| p + 1).unwrap_or(0);
        &self.volume_label[..len]
    }

    /// The `FSTYPE` label string from the extended BPB, trimmed of
    /// trailing spaces (e.g. `b"FAT12   "` -> `b"FAT12"`).
    pub fn fs_type_label_bytes(&self) -> &[u8] {
        let len = self.fs_type_label.iter().rposition(|b| *b != b' ').map(|p| p + 1).unwrap_or(0);
        &self.fs_type_label[..len]
    }
}
