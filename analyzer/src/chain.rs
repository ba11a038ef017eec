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

//! Cluster-chain following, memoized, with cycle and range guards the
//! donor's FAT driver does not have (spec §9: "the source does not defend
//! against FAT cycles ... this spec adds both guards").

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use fat32_analyzer_err::{Error, Result, Warning};
use fat32_analyzer_io::ByteSource;
use log::warn;

use crate::fat::{ClusterLink, FatTable};

pub struct ChainFollower<'a, S: ByteSource> {
    fat: FatTable<'a, S>,
    total_clusters: u32,
    cache: RefCell<HashMap<u32, Vec<u32>>>,
    warnings: RefCell<Vec<Warning>>,
}

impl<'a, S: ByteSource> ChainFollower<'a, S> {
    pub fn new(fat: FatTable<'a, S>, total_clusters: u32) -> Self {
        Self {
            fat,
            total_clusters,
            cache: RefCell::new(HashMap::new()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Drains the warnings accumulated so far (cyclic/out-of-range chains).
    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings.borrow_mut())
    }

    /// Returns the ordered cluster chain starting at `start`, memoized.
    /// `start < 2` fails with `InvalidClusterNumber` (spec §4.3); callers
    /// that model an empty file as "no chain" guard on `first_cluster >= 2`
    /// before calling this rather than passing 0 through (spec §3
    /// FileRecord, §6 empty-file scenario).
    pub fn chain(&self, start: u32) -> Result<Vec<u32>> {
        if start < 2 {
            return Err(Error::InvalidClusterNumber { cluster: start });
        }
        if let Some(cached) = self.cache.borrow().get(&start) {
            return Ok(cached.clone());
        }

        let max_valid = self.total_clusters + 1;
        let mut clusters = vec![start];
        let mut seen = HashSet::new();
        seen.insert(start);

        let mut current = start;
        loop {
            if current > max_valid {
                warn!("cluster {current}: link out of range (max {max_valid}), chain truncated");
                self.warnings
                    .borrow_mut()
                    .push(Warning::OutOfRangeLink { cluster: current });
                break;
            }
            match self.fat.next_cluster(current)? {
                ClusterLink::Next(next) => {
                    if !seen.insert(next) {
                        warn!("cluster {next}: cyclic chain detected, chain truncated");
                        self.warnings
                            .borrow_mut()
                            .push(Warning::CyclicChain { cluster: next });
                        break;
                    }
                    clusters.push(next);
                    current = next;
                }
                ClusterLink::Bad | ClusterLink::Reserved | ClusterLink::Free => break,
                ClusterLink::EndOfChain => break,
            }
        }

        self.cache.borrow_mut().insert(start, clusters.clone());
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot_sector::BootSector;
    use fat32_analyzer_io::MemoryByteSource;

    fn boot_sector(total_clusters: u32) -> BootSector {
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
            total_clusters,
        }
    }

    fn follower(entries: &[u32], total_clusters: u32) -> (MemoryByteSource, BootSector) {
        let mut bytes = vec![0u8; entries.len() * 4];
        for (i, &v) in entries.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        (MemoryByteSource::new(bytes), boot_sector(total_clusters))
    }

    const EOC: u32 = 0x0FFF_FFFF;

    #[test]
    fn follows_simple_chain_to_end_of_chain() {
        // cluster 2 -> 3 -> 4 -> EOC
        let (src, bs) = follower(&[0, 0, 3, 4, EOC], 10);
        let cf = ChainFollower::new(FatTable::new(&src, &bs), bs.total_clusters);
        assert_eq!(cf.chain(2).unwrap(), vec![2, 3, 4]);
        assert!(cf.take_warnings().is_empty());
    }

    #[test]
    fn detects_cycle_and_truncates() {
        // cluster 2 -> 3 -> 2 (cycle)
        let (src, bs) = follower(&[0, 0, 3, 2], 10);
        let cf = ChainFollower::new(FatTable::new(&src, &bs), bs.total_clusters);
        assert_eq!(cf.chain(2).unwrap(), vec![2, 3]);
        let warnings = cf.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::CyclicChain { cluster: 2 }));
    }

    #[test]
    fn detects_out_of_range_link() {
        let (src, bs) = follower(&[0, 0, 999_999], 5);
        let cf = ChainFollower::new(FatTable::new(&src, &bs), bs.total_clusters);
        assert_eq!(cf.chain(2).unwrap(), vec![2]);
        let warnings = cf.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::OutOfRangeLink { .. }));
    }

    #[test]
    fn start_below_two_is_invalid_cluster_number() {
        let (src, bs) = follower(&[0, 0], 10);
        let cf = ChainFollower::new(FatTable::new(&src, &bs), bs.total_clusters);
        assert!(matches!(
            cf.chain(0).unwrap_err(),
            Error::InvalidClusterNumber { cluster: 0 }
        ));
        assert!(matches!(
            cf.chain(1).unwrap_err(),
            Error::InvalidClusterNumber { cluster: 1 }
        ));
    }

    #[test]
    fn memoizes_repeat_lookups() {
        let (src, bs) = follower(&[0, 0, EOC], 10);
        let cf = ChainFollower::new(FatTable::new(&src, &bs), bs.total_clusters);
        assert_eq!(cf.chain(2).unwrap(), cf.chain(2).unwrap());
    }
}
