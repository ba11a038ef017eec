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

//! Volume allocation bitmap, free-run derivation, and fragmentation
//! statistics (spec §4.8).

use serde::Serialize;

use crate::walker::FileRecord;

/// A maximal run of unallocated clusters, `[start_lcn, start_lcn + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeRun {
    pub start_lcn: u32,
    pub length: u32,
}

/// Volume-wide fragmentation and occupancy summary (spec §4.8).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Statistics {
    pub files_total: u64,
    pub files_fragmented: u64,
    pub files_fragmented_pct: f64,
    pub avg_fragments_per_file: f64,
    pub max_fragments: u64,
    pub total_size_bytes: u64,
    pub cluster_size_bytes: u32,
    pub total_clusters: u32,
    pub free_runs_count: u64,
    pub largest_free_run_clusters: u32,
    pub largest_free_run_bytes: u64,
    pub volume_fragmentation_index: f64,
}

/// Derives the allocation bitmap, free runs and fragmentation statistics
/// from a set of walked `FileRecord`s.
pub struct AllocationAnalyzer {
    total_clusters: u32,
    cluster_size_bytes: u32,
}

impl AllocationAnalyzer {
    pub fn new(total_clusters: u32, cluster_size_bytes: u32) -> Self {
        Self {
            total_clusters,
            cluster_size_bytes,
        }
    }

    /// Sets bit `c - 2` for every cluster `c` referenced by `records`.
    /// References outside `[2, total_clusters + 1]` are silently ignored:
    /// ChainFollower has already reported them as `OutOfRangeLink`.
    pub fn build_bitmap(&self, records: &[FileRecord]) -> Vec<bool> {
        let mut bitmap = vec![false; self.total_clusters as usize];
        for record in records {
            for &cluster in &record.clusters {
                if cluster < 2 {
                    continue;
                }
                let index = (cluster - 2) as usize;
                if index < bitmap.len() {
                    bitmap[index] = true;
                }
            }
        }
        bitmap
    }

    /// Scans `bitmap` linearly, yielding one `FreeRun` per maximal run of
    /// unset bits.
    pub fn free_runs(&self, bitmap: &[bool]) -> Vec<FreeRun> {
        let mut runs = Vec::new();
        let mut i = 0usize;
        while i < bitmap.len() {
            if bitmap[i] {
                i += 1;
                continue;
            }
            let start = i;
            while i < bitmap.len() && !bitmap[i] {
                i += 1;
            }
            runs.push(FreeRun {
                start_lcn: start as u32 + 2,
                length: (i - start) as u32,
            });
        }
        runs
    }

    /// Computes volume-wide statistics over `records` and `free_runs`.
    pub fn stats(&self, records: &[FileRecord], free_runs: &[FreeRun]) -> Statistics {
        let files: Vec<&FileRecord> = records.iter().filter(|r| !r.is_directory).collect();
        let files_total = files.len() as u64;

        let files_fragmented = files.iter().filter(|r| r.fragments > 1).count() as u64;
        let files_fragmented_pct = if files_total == 0 {
            0.0
        } else {
            files_fragmented as f64 * 100.0 / files_total as f64
        };

        let total_fragments: u64 = files.iter().map(|r| r.fragments as u64).sum();
        let avg_fragments_per_file = if files_total == 0 {
            0.0
        } else {
            total_fragments as f64 / files_total as f64
        };

        let max_fragments = files.iter().map(|r| r.fragments as u64).max().unwrap_or(0);
        let total_size_bytes = files.iter().map(|r| r.size_bytes).sum();

        let free_runs_count = free_runs.len() as u64;
        let largest_free_run_clusters =
            free_runs.iter().map(|r| r.length).max().unwrap_or(0);
        let largest_free_run_bytes =
            largest_free_run_clusters as u64 * self.cluster_size_bytes as u64;

        let excess_fragments: u64 = files
            .iter()
            .map(|r| (r.fragments as u64).saturating_sub(1))
            .sum();
        let volume_fragmentation_index = excess_fragments as f64 / total_fragments.max(1) as f64;

        Statistics {
            files_total,
            files_fragmented,
            files_fragmented_pct,
            avg_fragments_per_file,
            max_fragments,
            total_size_bytes,
            cluster_size_bytes: self.cluster_size_bytes,
            total_clusters: self.total_clusters,
            free_runs_count,
            largest_free_run_clusters,
            largest_free_run_bytes,
            volume_fragmentation_index,
        }
    }
}
