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

//! Recursive depth-first descent from the root directory, emitting one
//! `FileRecord` per directory and file (spec §4.6).

use std::collections::HashSet;

use fat32_analyzer_err::{Result, Warning};
use fat32_analyzer_io::ByteSource;
use serde::Serialize;

use crate::boot_sector::BootSector;
use crate::chain::ChainFollower;
use crate::cluster::ClusterReader;
use crate::dir_entry::DirectoryDecoder;
use crate::extent::{self, Extent};

/// One directory or file discovered by the walker.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub size_bytes: u64,
    pub first_cluster: u32,
    pub clusters: Vec<u32>,
    pub extents: Vec<Extent>,
    pub fragments: usize,
    pub is_directory: bool,
}

pub struct Walker<'a, S: ByteSource> {
    chains: &'a ChainFollower<'a, S>,
    clusters: &'a ClusterReader<'a, S>,
    root_dir_cluster: u32,
    visited: HashSet<u32>,
    warnings: Vec<Warning>,
}

impl<'a, S: ByteSource> Walker<'a, S> {
    pub fn new(
        chains: &'a ChainFollower<'a, S>,
        clusters: &'a ClusterReader<'a, S>,
        boot_sector: &BootSector,
    ) -> Self {
        Self {
            chains,
            clusters,
            root_dir_cluster: boot_sector.root_dir_cluster,
            visited: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Walks the whole tree depth-first, pre-order: a parent directory's
    /// record always precedes its children's.
    pub fn walk(mut self) -> Result<(Vec<FileRecord>, Vec<Warning>)> {
        let mut records = Vec::new();
        let root_chain = self.chains.chain(self.root_dir_cluster)?;
        self.warnings.append(&mut self.chains.take_warnings());
        records.push(Self::record(
            "/".to_string(),
            self.root_dir_cluster,
            0,
            false,
            root_chain,
        ));
        self.visited.insert(self.root_dir_cluster);

        self.walk_dir(self.root_dir_cluster, "/", &mut records)?;
        Ok((records, self.warnings))
    }

    fn walk_dir(&mut self, cluster: u32, prefix: &str, out: &mut Vec<FileRecord>) -> Result<()> {
        let chain = self.chains.chain(cluster)?;
        self.warnings.append(&mut self.chains.take_warnings());
        let raw = self
            .clusters
            .read_chain_bytes(cluster, &chain, &mut self.warnings)?;
        let (entries, mut decode_warnings) = DirectoryDecoder::decode(&raw);
        self.warnings.append(&mut decode_warnings);

        for entry in entries {
            if entry.is_volume_label {
                continue;
            }
            let trimmed = entry.name.trim();
            if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
                continue;
            }

            let full_name = entry.full_name();
            let path = format!("{prefix}{full_name}");

            let entry_chain = if entry.first_cluster >= 2 {
                let c = self.chains.chain(entry.first_cluster)?;
                self.warnings.append(&mut self.chains.take_warnings());
                c
            } else {
                Vec::new()
            };

            out.push(Self::record(
                path.clone(),
                entry.first_cluster,
                entry.file_size as u64,
                entry.is_directory,
                entry_chain,
            ));

            if entry.is_directory && entry.first_cluster >= 2 {
                if !self.visited.insert(entry.first_cluster) {
                    continue;
                }
                let child_prefix = format!("{path}/");
                self.walk_dir(entry.first_cluster, &child_prefix, out)?;
            }
        }

        Ok(())
    }

    fn record(
        path: String,
        first_cluster: u32,
        size_bytes: u64,
        is_directory: bool,
        clusters: Vec<u32>,
    ) -> FileRecord {
        let extents = extent::encode(&clusters);
        let fragments = extents.len();
        FileRecord {
            path,
            size_bytes: if is_directory { 0 } else { size_bytes },
            first_cluster,
            clusters,
            extents,
            fragments,
            is_directory,
        }
    }
}
