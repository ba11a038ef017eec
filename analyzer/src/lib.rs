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

//! Decodes a FAT32 volume image into a structural report: directory tree,
//! per-file cluster allocation, the volume allocation bitmap and free
//! runs, and fragmentation statistics.
//!
//! The only moving part a caller supplies is a [`ByteSource`]; everything
//! from boot-sector validation through the final [`Report`] happens inside
//! [`AnalysisSession::analyze`].

pub mod alloc;
pub mod boot_sector;
pub mod chain;
pub mod cluster;
pub mod dir_entry;
pub mod extent;
pub mod fat;
pub mod walker;

pub use alloc::{AllocationAnalyzer, FreeRun, Statistics};
pub use boot_sector::BootSector;
pub use chain::ChainFollower;
pub use cluster::ClusterReader;
pub use extent::Extent;
pub use fat::{ClusterLink, FatTable};
pub use walker::{FileRecord, Walker};

use fat32_analyzer_err::{Result, Warning};
use fat32_analyzer_io::ByteSource;
use serde::Serialize;

/// The complete result of analyzing one FAT32 image: the directory tree
/// split into files and directories, the derived free-space map, volume
/// statistics, and any non-fatal anomalies encountered along the way.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub stats: Statistics,
    pub files: Vec<FileRecord>,
    pub dirs: Vec<FileRecord>,
    pub free_extents: Vec<FreeRun>,
    pub warnings: Vec<Warning>,
}

/// Drives one analysis end to end over a borrowed [`ByteSource`], threading
/// the boot sector's geometry through the FAT table, chain follower,
/// cluster reader and walker, then deriving the allocation bitmap and
/// statistics from the walked records.
pub struct AnalysisSession<'a, S: ByteSource> {
    source: &'a S,
}

impl<'a, S: ByteSource> AnalysisSession<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn analyze(self) -> Result<Report> {
        let boot_sector = BootSector::decode(self.source)?;

        let fat = FatTable::new(self.source, &boot_sector);
        let chains = ChainFollower::new(fat, boot_sector.total_clusters);
        let clusters = ClusterReader::new(self.source, &boot_sector);

        let walker = Walker::new(&chains, &clusters, &boot_sector);
        let (records, mut warnings) = walker.walk()?;

        let allocator =
            AllocationAnalyzer::new(boot_sector.total_clusters, boot_sector.cluster_size_bytes);
        let bitmap = allocator.build_bitmap(&records);
        let free_extents = allocator.free_runs(&bitmap);
        let stats = allocator.stats(&records, &free_extents);

        let (dirs, files): (Vec<FileRecord>, Vec<FileRecord>) =
            records.into_iter().partition(|r| r.is_directory);

        warnings.sort_by_key(|w| format!("{w}"));

        Ok(Report {
            stats,
            files,
            dirs,
            free_extents,
            warnings,
        })
    }
}
