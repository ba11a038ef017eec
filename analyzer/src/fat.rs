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

//! The first FAT copy, and classification of its 32-bit entries.

use fat32_analyzer_err::Result;
use fat32_analyzer_io::ByteSource;
use zerocopy::{little_endian::U32, FromBytes};

use crate::boot_sector::BootSector;

/// Classification of one FAT entry, replacing sentinel-integer checks at
/// call sites (spec §9, "polymorphism over error classification").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLink {
    Free,
    Reserved,
    Next(u32),
    Bad,
    EndOfChain,
}

pub struct FatTable<'a, S: ByteSource> {
    source: &'a S,
    fat_offset_bytes: u64,
}

impl<'a, S: ByteSource> FatTable<'a, S> {
    pub fn new(source: &'a S, boot_sector: &BootSector) -> Self {
        Self {
            source,
            fat_offset_bytes: boot_sector.fat_offset_bytes,
        }
    }

    /// Classifies the successor of cluster `c` in the first FAT copy.
    /// Clusters 0 and 1 are reserved and must never be passed in by a
    /// caller that is following a chain (spec §4.2).
    pub fn next_cluster(&self, c: u32) -> Result<ClusterLink> {
        let offset = self.fat_offset_bytes + 4 * c as u64;
        let mut raw = [0u8; 4];
        let n = self.source.read_at(offset, &mut raw)?;
        if n < 4 {
            // Short read past end of image; treat as a hard chain
            // terminator rather than fabricating a successor.
            return Ok(ClusterLink::EndOfChain);
        }
        let value = U32::ref_from_bytes(&raw[..])
            .expect("fixed 4-byte buffer always matches U32's layout")
            .get()
            & 0x0FFF_FFFF;

        Ok(match value {
            0x0000000 => ClusterLink::Free,
            0x0000001 => ClusterLink::Reserved,
            0x0000002..=0x0FFF_FFEF => ClusterLink::Next(value),
            0x0FFF_FFF7 => ClusterLink::Bad,
            _ => ClusterLink::EndOfChain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fat32_analyzer_io::MemoryByteSource;

    fn fat_image(entries: &[u32]) -> (MemoryByteSource, u64) {
        let fat_offset = 0u64;
        let mut bytes = vec![0u8; entries.len() * 4];
        for (i, &v) in entries.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        (MemoryByteSource::new(bytes), fat_offset)
    }

    fn table(entries: &[u32]) -> (MemoryByteSource, BootSector) {
        let (src, fat_offset) = fat_image(entries);
        let mut bs = test_boot_sector();
        bs.fat_offset_bytes = fat_offset;
        (src, bs)
    }

    fn test_boot_sector() -> BootSector {
        BootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 0,
            num_fats: 1,
            total_sectors: 1000,
            sectors_per_fat: 10,
            root_dir_cluster: 2,
            signature: 0xAA55,
            fat_offset_bytes: 0,
            data_offset_bytes: 512,
            cluster_size_bytes: 512,
            total_clusters: 900,
        }
    }

    #[test]
    fn classifies_all_sentinel_kinds() {
        let (src, bs) = table(&[0, 1, 0, 5, 0x0FFF_FFF7, 0x0FFF_FFFF]);
        let fat = FatTable::new(&src, &bs);
        assert_eq!(fat.next_cluster(0).unwrap(), ClusterLink::Free);
        assert_eq!(fat.next_cluster(1).unwrap(), ClusterLink::Reserved);
        assert_eq!(fat.next_cluster(3).unwrap(), ClusterLink::Next(5));
        assert_eq!(fat.next_cluster(4).unwrap(), ClusterLink::Bad);
        assert_eq!(fat.next_cluster(5).unwrap(), ClusterLink::EndOfChain);
    }

    #[test]
    fn masks_to_28_bits() {
        let (src, bs) = table(&[0xF000_0002]);
        let fat = FatTable::new(&src, &bs);
        assert_eq!(fat.next_cluster(0).unwrap(), ClusterLink::Next(2));
    }
}
