// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Short-name (8.3) directory entry decoding. Long-filename slots are
//! deliberately skipped, not assembled (spec §9): the short name on the
//! terminating entry is authoritative for this core.

use fat32_analyzer_err::Warning;
use log::warn;
use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawDirEntry {
    dir_name: [u8; 8],
    dir_ext: [u8; 3],
    dir_attr: u8,
    _ntres: u8,
    dir_crttimetenth: u8,
    dir_crttime: U16,
    dir_crtdate: U16,
    dir_lstaccdate: U16,
    dir_fstclushi: U16,
    dir_wrttime: U16,
    dir_wrtdate: U16,
    dir_fstcluslo: U16,
    dir_filesize: U32,
}

const ATTR_READ_ONLY: u8 = 0x01;
const ATTR_HIDDEN: u8 = 0x02;
const ATTR_SYSTEM: u8 = 0x04;
const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_ARCHIVE: u8 = 0x20;
const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

/// A calendar timestamp decoded from a packed FAT date/time pair. Absent
/// rather than an error when any component is out of range (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

/// A decoded short-name (8.3) directory entry.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub extension: String,
    pub attributes: u8,
    pub first_cluster: u32,
    pub file_size: u32,
    pub create_time: Option<FatTimestamp>,
    pub modify_time: Option<FatTimestamp>,
    pub access_time: Option<FatTimestamp>,
    pub is_directory: bool,
    pub is_volume_label: bool,
    pub is_deleted: bool,
}

impl DirectoryEntry {
    pub fn full_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }
}

/// Outcome of decoding one 32-byte directory slot.
enum SlotOutcome {
    /// `slot[0] == 0x00`: no further entries in this directory.
    EndOfDirectory,
    /// Slot skipped (deleted or LFN) — keep scanning.
    Skip,
    /// Slot skipped because it failed to decode — keep scanning, but the
    /// caller records a `MalformedDirectoryEntry` warning.
    Malformed,
    Entry(DirectoryEntry),
}

/// Decodes the concatenated bytes of a directory's cluster chain into an
/// ordered sequence of short-name entries (spec §4.5).
pub struct DirectoryDecoder;

impl DirectoryDecoder {
    pub fn decode(buffer: &[u8]) -> (Vec<DirectoryEntry>, Vec<Warning>) {
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for (slot_index, slot) in buffer.chunks(32).enumerate() {
            if slot.len() < 32 {
                break;
            }
            match decode_slot(slot) {
                SlotOutcome::EndOfDirectory => break,
                SlotOutcome::Skip => continue,
                SlotOutcome::Malformed => {
                    warnings.push(Warning::MalformedDirectoryEntry {
                        offset: (slot_index * 32) as u64,
                    });
                }
                SlotOutcome::Entry(entry) => entries.push(entry),
            }
        }

        (entries, warnings)
    }
}

fn decode_slot(slot: &[u8]) -> SlotOutcome {
    if slot[0] == 0x00 {
        return SlotOutcome::EndOfDirectory;
    }
    if slot[0] == 0xE5 {
        return SlotOutcome::Skip;
    }
    if slot[11] == ATTR_LONG_NAME {
        return SlotOutcome::Skip;
    }

    let Ok(raw) = RawDirEntry::ref_from_bytes(slot) else {
        warn!("malformed directory slot, skipping");
        return SlotOutcome::Malformed;
    };

    let mut name_bytes = raw.dir_name;
    let escaped_first_byte = name_bytes[0] == 0x05;
    if escaped_first_byte {
        name_bytes[0] = 0xE5;
    }
    let name = decode_ascii_trim(&name_bytes, escaped_first_byte);
    let extension = decode_ascii_trim(&raw.dir_ext, false);

    let attributes = raw.dir_attr;
    let is_directory = attributes & ATTR_DIRECTORY != 0;
    let is_volume_label = attributes & ATTR_VOLUME_ID != 0;

    let first_cluster = ((raw.dir_fstclushi.get() as u32) << 16) | raw.dir_fstcluslo.get() as u32;
    let file_size = raw.dir_filesize.get();

    let create_time = decode_timestamp(
        raw.dir_crttime.get(),
        raw.dir_crtdate.get(),
        raw.dir_crttimetenth,
    );
    let modify_time = decode_timestamp(raw.dir_wrttime.get(), raw.dir_wrtdate.get(), 0);
    let access_time = decode_timestamp(0, raw.dir_lstaccdate.get(), 0);

    SlotOutcome::Entry(DirectoryEntry {
        name,
        extension,
        attributes,
        first_cluster,
        file_size,
        create_time,
        modify_time,
        access_time,
        is_directory,
        is_volume_label,
        is_deleted: false,
    })
}

/// Decodes a name/extension field as ASCII, trimming trailing 0x20 padding.
/// Bytes outside the ASCII range decode to the replacement marker
/// `U+FFFD`, matching `decode('ascii', errors='replace')` (spec §4.5). The
/// one exception is the field's first byte when `escaped_first_byte` is
/// set: the caller has already turned a literal leading 0x05 into 0xE5 per
/// the FAT escape, and that byte is the real character 0xE5, not a
/// replacement.
fn decode_ascii_trim(bytes: &[u8], escaped_first_byte: bool) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map(|i| i + 1)
        .unwrap_or(0);
    bytes[..end]
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if i == 0 && escaped_first_byte {
                '\u{E5}'
            } else if b > 0x7F {
                '\u{FFFD}'
            } else {
                b as char
            }
        })
        .collect()
}

/// Decodes a packed FAT time/date pair into a calendar timestamp, per the
/// bit layout in spec §4.5. `tenths` is only meaningful for creation time.
fn decode_timestamp(time: u16, date: u16, tenths: u8) -> Option<FatTimestamp> {
    let second_base = (time & 0x1F) as u32 * 2;
    let minute = ((time >> 5) & 0x3F) as u8;
    let hour = ((time >> 11) & 0x1F) as u8;

    let day = (date & 0x1F) as u8;
    let month = ((date >> 5) & 0x0F) as u8;
    let year = ((date >> 9) & 0x7F) + 1980;

    let (second, microsecond) = if tenths > 0 {
        (second_base + tenths as u32 / 100, (tenths as u32 % 100) * 10000)
    } else {
        (second_base, 0)
    };
    let second = second as u8;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 59
    {
        return None;
    }

    Some(FatTimestamp {
        year,
        month,
        day,
        hour,
        minute,
        second,
        microsecond,
    })
}
