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

//! Run-length encoding of a cluster chain into contiguous extents.

use serde::Serialize;

/// A maximal contiguous run of clusters: `(start_cluster, length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub start_cluster: u32,
    pub length: u32,
}

/// Encodes a cluster chain into run-length extents (spec §4.7). Adjacent
/// extents are never contiguous: `encode` always merges a run that could
/// be merged.
pub fn encode(chain: &[u32]) -> Vec<Extent> {
    let mut extents = Vec::new();
    let mut iter = chain.iter().copied();
    let Some(first) = iter.next() else {
        return extents;
    };

    let mut start = first;
    let mut length = 1u32;
    let mut prev = first;

    for cluster in iter {
        if cluster == prev + 1 {
            length += 1;
        } else {
            extents.push(Extent { start_cluster: start, length });
            start = cluster;
            length = 1;
        }
        prev = cluster;
    }
    extents.push(Extent { start_cluster: start, length });
    extents
}
