//! 32-byte directory entry decoding and 8.3 name formatting.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Size in bytes of one on-disk directory entry.
pub const DIR_ENTRY_SIZE: usize = 32;

const DELETED_FLAG: u8 = 0xE5;
const END_FLAG: u8 = 0x00;
const LFN_ATTR_MASK: u8 = 0x0F;

bitflags::bitflags! {
    /// FAT directory-entry attribute byte.
    #[derive(Default)]
    pub struct FileAttributes: u8 {
        const READ_ONLY  = 0x01;
        const HIDDEN     = 0x02;
        const SYSTEM     = 0x04;
        const VOLUME_ID  = 0x08;
        const DIRECTORY  = 0x10;
        const ARCHIVE    = 0x20;
    }
}

/// A raw, 32-byte directory entry as stored on disk.
///
/// Field order matches the on-disk layout exactly so the struct can be
/// read field-by-field with `byteorder` at fixed offsets.
#[derive(Debug, Clone)]
pub struct RawDirEntry {
    pub name: [u8; 11],
    pub attr: FileAttributes,
    pub reserved: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub first_cluster_hi: u16,
    pub modify_time: u16,
    pub modify_date: u16,
    pub first_cluster_lo: u16,
    pub file_size: u32,
}

impl RawDirEntry {
    /// Decodes one 32-byte slot. Does not validate the entry is
    /// visible (callers apply the skip rules separately).
    pub fn decode(bytes: &[u8]) -> RawDirEntry {
        debug_assert!(bytes.len() >= DIR_ENTRY_SIZE);
        let mut name = [0u8; 11];
        name.copy_from_slice(&bytes[0..11]);
        RawDirEntry {
            name,
            attr: FileAttributes::from_bits_truncate(bytes[11]),
            reserved: bytes[12],
            create_time_tenth: bytes[13],
            create_time: LittleEndian::read_u16(&bytes[14..16]),
            create_date: LittleEndian::read_u16(&bytes[16..18]),
            access_date: LittleEndian::read_u16(&bytes[18..20]),
            first_cluster_hi: LittleEndian::read_u16(&bytes[20..22]),
            modify_time: LittleEndian::read_u16(&bytes[22..24]),
            modify_date: LittleEndian::read_u16(&bytes[24..26]),
            first_cluster_lo: LittleEndian::read_u16(&bytes[26..28]),
            file_size: LittleEndian::read_u32(&bytes[28..32]),
        }
    }

    pub fn first_cluster(&self) -> u16 {
        // FAT12/16 never use first_cluster_hi; kept around only
        // because it occupies a real byte range in the on-disk record.
        let _ = self.first_cluster_hi;
        self.first_cluster_lo
    }

    pub fn is_end(&self) -> bool {
        self.name[0] == END_FLAG
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == DELETED_FLAG
    }

    pub fn is_lfn_fragment(&self) -> bool {
        self.attr.bits() & LFN_ATTR_MASK == LFN_ATTR_MASK
    }

    pub fn is_volume_label(&self) -> bool {
        self.attr.contains(FileAttributes::VOLUME_ID)
    }

    pub fn is_directory(&self) -> bool {
        self.attr.contains(FileAttributes::DIRECTORY)
    }
}

/// Returns whether `b` is a character the FAT short-name charset
/// permits in either the base or extension component: letters,
/// digits, and the symbol set `! # $ % & ' ( ) - @ ^ _ \`  { } ~`, plus
/// lower-case letters as produced by common consumer tooling.
pub fn is_valid_sfn_byte(b: u8) -> bool {
    matches!(b,
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'(' | b')' |
        b'-' | b'@' | b'^' | b'_' | b'`' | b'{' | b'}' | b'~')
}

/// Formats the 11-byte raw short-name field as an ASCII `"NAME.EXT"`
/// string: base name truncated at the first space among the first 8
/// bytes, followed by `.` and the extension (truncated at the first
/// space among the last 3 bytes) if the extension is not all spaces.
///
/// Returns `None` if the formatted name would be empty (the base name
/// component is empty) or if any non-space byte in either component
/// falls outside the FAT short-name charset (`is_valid_sfn_byte`) —
/// both are treated the same way, as a skip condition, alongside the
/// deleted/LFN/volume-label cases the directory iterator applies.
pub fn format_short_name(raw: &[u8; 11]) -> Option<String> {
    let base_len = raw[0..8].iter().position(|&b| b == b' ').unwrap_or(8);
    if base_len == 0 || !raw[0..base_len].iter().all(|&b| is_valid_sfn_byte(b)) {
        return None;
    }
    let mut name = String::with_capacity(12);
    name.push_str(&decode_oem(&raw[0..base_len]));

    let ext_len = raw[8..11].iter().position(|&b| b == b' ').unwrap_or(3);
    if ext_len > 0 {
        if !raw[8..8 + ext_len].iter().all(|&b| is_valid_sfn_byte(b)) {
            return None;
        }
        name.push('.');
        name.push_str(&decode_oem(&raw[8..8 + ext_len]));
    }
    Some(name)
}

fn decode_oem(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| if b <= 0x7F { b as char } else { '\u{FFFD}' }).collect()
}

/// The caller-facing view of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryView {
    pub name: String,
    pub size: u32,
    pub archived: bool,
    pub readonly: bool,
    pub system: bool,
    pub hidden: bool,
    pub directory: bool,
}

impl DirEntryView {
    pub(crate) fn from_raw(raw: &RawDirEntry, name: String) -> DirEntryView {
        DirEntryView {
            name,
            size: raw.file_size,
            archived: raw.attr.contains(FileAttributes::ARCHIVE),
            readonly: raw.attr.contains(FileAttributes::READ_ONLY),
            system: raw.attr.contains(FileAttributes::SYSTEM),
            hidden: raw.attr.contains(FileAttributes::HIDDEN),
            directory: raw.attr.contains(FileAttributes::DIRECTORY),
        }
    }
}

/// Decodes a raw directory table (one entry per `DIR_ENTRY_SIZE`
/// bytes) and, for each visible entry, produces a `(RawDirEntry,
/// DirEntryView)` pair in slot order. End-of-directory, deleted, LFN
/// fragment, volume-label, and empty-after-formatting entries are all
/// omitted.
pub fn visible_entries(table: &[u8]) -> Result<Vec<(RawDirEntry, DirEntryView)>> {
    let mut out = Vec::new();
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
        match format_short_name(&raw.name) {
            Some(name) => out.push((raw.clone(), DirEntryView::from_raw(&raw, name))),
            None => continue,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(name: &[u8; 11], attr: u8, first_cluster: u16, size: u32) -> [u8; DIR_ENTRY_SIZE] {
        let mut bytes = [0u8; DIR_ENTRY_SIZE];
        bytes[0..11].copy_from_slice(name);
        bytes[11] = attr;
        LittleEndian::write_u16(&mut bytes[26..28], first_cluster);
        LittleEndian::write_u32(&mut bytes[28..32], size);
        bytes
    }

    #[test]
    fn formats_name_with_extension() {
        assert_eq!(format_short_name(b"FOO     BAR").as_deref(), Some("FOO.BAR"));
    }

    #[test]
    fn formats_name_without_extension() {
        assert_eq!(format_short_name(b"FOO        ").as_deref(), Some("FOO"));
    }

    #[test]
    fn accepts_digits_and_symbols_unlike_original_isalpha_check() {
        assert_eq!(format_short_name(b"FILE1~1 TXT").as_deref(), Some("FILE1~1.TXT"));
        assert!(is_valid_sfn_byte(b'1'));
        assert!(is_valid_sfn_byte(b'~'));
        assert!(!b"FILE1~1".iter().all(|&b| b.is_ascii_alphabetic()));
    }

    #[test]
    fn empty_base_name_formats_to_none() {
        assert_eq!(format_short_name(b"        EXT"), None);
    }

    #[test]
    fn byte_outside_sfn_charset_formats_to_none() {
        assert!(!is_valid_sfn_byte(0xE5));
        assert_eq!(format_short_name(&[0xE5, b'O', b'O', b' ', b' ', b' ', b' ', b' ', b' ', b' ', b' ']), None);
        assert!(!is_valid_sfn_byte(b'*'));
        assert_eq!(format_short_name(b"FOO     *  "), None);
    }

    #[test]
    fn visible_entries_skips_deleted_lfn_volume_and_stops_at_terminator() {
        let mut table = Vec::new();
        table.extend_from_slice(&entry_bytes(b"A       TXT", 0x20, 5, 10));
        let mut deleted = entry_bytes(b"B       TXT", 0x20, 6, 1);
        deleted[0] = 0xE5;
        table.extend_from_slice(&deleted);
        table.extend_from_slice(&entry_bytes(b"LFNFRAG    ", 0x0F, 0, 0));
        table.extend_from_slice(&entry_bytes(b"B          ", 0x20, 7, 2));
        let mut terminator = [0u8; DIR_ENTRY_SIZE];
        terminator[0] = 0x00;
        table.extend_from_slice(&terminator);
        table.extend_from_slice(&entry_bytes(b"C          ", 0x20, 8, 3));

        let entries = visible_entries(&table).unwrap();
        let names: Vec<_> = entries.iter().map(|(_, v)| v.name.clone()).collect();
        assert_eq!(names, vec!["A.TXT".to_string(), "B".to_string()]);
    }
}
