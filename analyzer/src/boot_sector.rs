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

//! FAT32 boot sector (BPB) decoding.

use std::mem::size_of;

use fat32_analyzer_err::{Error, Result};
use fat32_analyzer_io::ByteSource;
use log::error;
use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

/// Raw on-disk layout of the 512-byte FAT32 boot sector, only the fields
/// the analyzer needs. Field offsets match the table in the spec.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawBootSector {
    bs_jmpboot: [u8; 3],
    bs_oemname: [u8; 8],
    bpb_bytspersec: U16,  // offset 11
    bpb_secperclus: u8,   // offset 13
    bpb_rsvdseccnt: U16,  // offset 14
    bpb_numfats: u8,      // offset 16
    _pad_to_32: [u8; 15],
    bpb_totsec32: U32, // offset 32
    bpb_fatsz32: U32,  // offset 36
    _pad_to_44: [u8; 4],
    bpb_rootclus: U32, // offset 44
    _pad_to_510: [u8; 462],
    signature: U16, // offset 510
}

/// Decoded, read-only boot sector plus the derived geometry from spec §3.
#[derive(Debug, Clone, Copy)]
pub struct BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub total_sectors: u32,
    pub sectors_per_fat: u32,
    pub root_dir_cluster: u32,
    pub signature: u16,

    pub fat_offset_bytes: u64,
    pub data_offset_bytes: u64,
    pub cluster_size_bytes: u32,
    pub total_clusters: u32,
}

impl BootSector {
    /// Reads and validates the boot sector from byte 0 of `source`.
    pub fn decode(source: &impl ByteSource) -> Result<Self> {
        let mut raw_bytes = [0u8; size_of::<RawBootSector>()];
        let n = source.read_at(0, &mut raw_bytes)?;
        if n < raw_bytes.len() || source.len() < 512 {
            error!("boot sector read returned {n} bytes, need 512");
            return Err(Error::TruncatedImage);
        }

        let raw = RawBootSector::ref_from_bytes(&raw_bytes)
            .expect("fixed-size buffer always matches RawBootSector's layout");

        let signature = raw.signature.get();
        if signature != 0xAA55 {
            error!("invalid boot sector signature: {signature:#06x}");
            return Err(Error::InvalidSignature);
        }

        let bytes_per_sector = raw.bpb_bytspersec.get();
        let sectors_per_cluster = raw.bpb_secperclus;
        let reserved_sectors = raw.bpb_rsvdseccnt.get();
        let num_fats = raw.bpb_numfats;
        let total_sectors = raw.bpb_totsec32.get();
        let sectors_per_fat = raw.bpb_fatsz32.get();
        let root_dir_cluster = raw.bpb_rootclus.get();

        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            error!("bytes_per_sector ({bytes_per_sector}) not in {{512,1024,2048,4096}}");
            return Err(Error::InvalidBootSector {
                reason: "bytes_per_sector must be one of 512, 1024, 2048, 4096",
            });
        }
        if sectors_per_cluster == 0
            || sectors_per_cluster > 128
            || !sectors_per_cluster.is_power_of_two()
        {
            error!("sectors_per_cluster ({sectors_per_cluster}) not a power of two in [1,128]");
            return Err(Error::InvalidBootSector {
                reason: "sectors_per_cluster must be a power of two in [1, 128]",
            });
        }
        if num_fats < 1 {
            error!("num_fats is 0");
            return Err(Error::InvalidBootSector {
                reason: "num_fats must be at least 1",
            });
        }
        if root_dir_cluster < 2 {
            error!("root_dir_cluster ({root_dir_cluster}) below 2");
            return Err(Error::InvalidBootSector {
                reason: "root_dir_cluster must be at least 2",
            });
        }

        let bytes_per_sector_u32 = bytes_per_sector as u32;
        let fat_offset_bytes = reserved_sectors as u64 * bytes_per_sector_u32 as u64;
        let data_offset_bytes = (reserved_sectors as u64
            + num_fats as u64 * sectors_per_fat as u64)
            * bytes_per_sector_u32 as u64;
        let cluster_size_bytes = sectors_per_cluster as u32 * bytes_per_sector_u32;

        let reserved_and_fats = reserved_sectors as u32 + num_fats as u32 * sectors_per_fat;
        let total_clusters = total_sectors
            .saturating_sub(reserved_and_fats)
            .checked_div(sectors_per_cluster as u32)
            .unwrap_or(0);

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            total_sectors,
            sectors_per_fat,
            root_dir_cluster,
            signature,
            fat_offset_bytes,
            data_offset_bytes,
            cluster_size_bytes,
            total_clusters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fat32_analyzer_io::MemoryByteSource;

    fn minimal_image(
        bytes_per_sector: u16,
        sectors_per_cluster: u8,
        reserved_sectors: u16,
        num_fats: u8,
        total_sectors: u32,
        sectors_per_fat: u32,
        root_dir_cluster: u32,
    ) -> Vec<u8> {
        let mut b = vec![0u8; 512];
        b[11..13].copy_from_slice(&bytes_per_sector.to_le_bytes());
        b[13] = sectors_per_cluster;
        b[14..16].copy_from_slice(&reserved_sectors.to_le_bytes());
        b[16] = num_fats;
        b[32..36].copy_from_slice(&total_sectors.to_le_bytes());
        b[36..40].copy_from_slice(&sectors_per_fat.to_le_bytes());
        b[44..48].copy_from_slice(&root_dir_cluster.to_le_bytes());
        b[510] = 0x55;
        b[511] = 0xAA;
        b
    }

    #[test]
    fn decodes_well_formed_boot_sector() {
        let img = minimal_image(512, 8, 32, 2, 65536, 512, 2);
        let src = MemoryByteSource::new(img);
        let bs = BootSector::decode(&src).unwrap();
        assert_eq!(bs.bytes_per_sector, 512);
        assert_eq!(bs.sectors_per_cluster, 8);
        assert_eq!(bs.cluster_size_bytes, 4096);
        assert_eq!(bs.fat_offset_bytes, 32 * 512);
        assert_eq!(bs.data_offset_bytes, (32 + 2 * 512) * 512);
        assert_eq!(bs.total_clusters, (65536 - 32 - 1024) / 8);
    }

    #[test]
    fn rejects_missing_signature() {
        let mut img = minimal_image(512, 8, 32, 2, 65536, 512, 2);
        img[511] = 0x00;
        let src = MemoryByteSource::new(img);
        assert!(matches!(
            BootSector::decode(&src).unwrap_err(),
            Error::InvalidSignature
        ));
    }

    #[test]
    fn rejects_truncated_image() {
        let src = MemoryByteSource::new(vec![0u8; 100]);
        assert!(matches!(
            BootSector::decode(&src).unwrap_err(),
            Error::TruncatedImage
        ));
    }

    #[test]
    fn rejects_non_power_of_two_sectors_per_cluster() {
        let img = minimal_image(512, 3, 32, 2, 65536, 512, 2);
        let src = MemoryByteSource::new(img);
        assert!(matches!(
            BootSector::decode(&src).unwrap_err(),
            Error::InvalidBootSector { .. }
        ));
    }

    #[test]
    fn rejects_root_cluster_below_two() {
        let img = minimal_image(512, 8, 32, 2, 65536, 512, 1);
        let src = MemoryByteSource::new(img);
        assert!(matches!(
            BootSector::decode(&src).unwrap_err(),
            Error::InvalidBootSector { .. }
        ));
    }
}
