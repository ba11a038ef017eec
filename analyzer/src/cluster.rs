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

//! Reads cluster bytes by number, and whole directory chains, with the
//! directory-chain cache described in spec §4.4.

use std::cell::RefCell;
use std::collections::HashMap;

use fat32_analyzer_err::{Error, Result, Warning};
use fat32_analyzer_io::ByteSource;
use log::warn;

use crate::boot_sector::BootSector;

pub struct ClusterReader<'a, S: ByteSource> {
    source: &'a S,
    data_offset_bytes: u64,
    cluster_size_bytes: u32,
    dir_bytes_cache: RefCell<HashMap<u32, Vec<u8>>>,
}

impl<'a, S: ByteSource> ClusterReader<'a, S> {
    pub fn new(source: &'a S, boot_sector: &BootSector) -> Self {
        Self {
            source,
            data_offset_bytes: boot_sector.data_offset_bytes,
            cluster_size_bytes: boot_sector.cluster_size_bytes,
            dir_bytes_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Reads exactly one cluster's worth of bytes. A short final read (end
    /// of image) is zero-padded and surfaced as a `TruncatedCluster`
    /// warning rather than failing the whole analysis. Fails with
    /// `InvalidClusterNumber` for `cluster < 2` (spec §4.4).
    pub fn read_cluster(&self, cluster: u32, warnings: &mut Vec<Warning>) -> Result<Vec<u8>> {
        if cluster < 2 {
            return Err(Error::InvalidClusterNumber { cluster });
        }
        let size = self.cluster_size_bytes as usize;
        let offset = self.data_offset_bytes + (cluster as u64 - 2) * size as u64;
        let mut buf = vec![0u8; size];
        let n = self.source.read_at(offset, &mut buf)?;
        if n < size {
            warn!("cluster {cluster}: short read ({n} of {size} bytes)");
            warnings.push(Warning::TruncatedCluster { cluster });
        }
        Ok(buf)
    }

    /// Concatenates `read_cluster` over the chain starting at `start`,
    /// memoized by `start` (used by the directory decoder).
    pub fn read_chain_bytes(
        &self,
        start: u32,
        chain: &[u32],
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<u8>> {
        if let Some(cached) = self.dir_bytes_cache.borrow().get(&start) {
            return Ok(cached.clone());
        }
        let mut bytes = Vec::with_capacity(chain.len() * self.cluster_size_bytes as usize);
        for &cluster in chain {
            bytes.extend(self.read_cluster(cluster, warnings)?);
        }
        self.dir_bytes_cache.borrow_mut().insert(start, bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fat32_analyzer_io::MemoryByteSource;

    fn boot_sector(cluster_size: u32, data_offset: u64) -> BootSector {
        BootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: (cluster_size / 512) as u8,
            reserved_sectors: 0,
            num_fats: 1,
            total_sectors: 1000,
            sectors_per_fat: 1,
            root_dir_cluster: 2,
            signature: 0xAA55,
            fat_offset_bytes: 0,
            data_offset_bytes: data_offset,
            cluster_size_bytes: cluster_size,
            total_clusters: 100,
        }
    }

    #[test]
    fn reads_cluster_at_expected_offset() {
        let mut img = vec![0u8; 64];
        img[16..16 + 16].copy_from_slice(&[7u8; 16]);
        let src = MemoryByteSource::new(img);
        let bs = boot_sector(16, 0);
        let reader = ClusterReader::new(&src, &bs);
        let mut warnings = Vec::new();
        let data = reader.read_cluster(2, &mut warnings).unwrap();
        assert_eq!(data, vec![7u8; 16]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn short_read_surfaces_truncated_cluster_warning() {
        let src = MemoryByteSource::new(vec![1u8; 10]);
        let bs = boot_sector(16, 0);
        let reader = ClusterReader::new(&src, &bs);
        let mut warnings = Vec::new();
        let data = reader.read_cluster(2, &mut warnings).unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::TruncatedCluster { cluster: 2 }));
    }

    #[test]
    fn cluster_below_two_is_invalid_cluster_number() {
        let src = MemoryByteSource::new(vec![0u8; 64]);
        let bs = boot_sector(16, 0);
        let reader = ClusterReader::new(&src, &bs);
        let mut warnings = Vec::new();
        assert!(matches!(
            reader.read_cluster(1, &mut warnings).unwrap_err(),
            Error::InvalidClusterNumber { cluster: 1 }
        ));
        assert!(warnings.is_empty());
    }

    #[test]
    fn chain_bytes_concatenates_in_order() {
        let mut img = vec![0u8; 48];
        img[0..16].copy_from_slice(&[1u8; 16]);
        img[16..32].copy_from_slice(&[2u8; 16]);
        let src = MemoryByteSource::new(img);
        let bs = boot_sector(16, 0);
        let reader = ClusterReader::new(&src, &bs);
        let mut warnings = Vec::new();
        let bytes = reader
            .read_chain_bytes(2, &[2, 3], &mut warnings)
            .unwrap();
        assert_eq!(&bytes[0..16], &[1u8; 16]);
        assert_eq!(&bytes[16..32], &[2u8; 16]);
    }
}
