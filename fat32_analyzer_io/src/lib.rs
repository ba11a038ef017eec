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

//! Opaque random-access byte source over a FAT32 image.
//!
//! The analyzer never opens a file itself; it is handed a `ByteSource` and
//! only ever does positioned reads against it. This is the seam at which a
//! real disk image, an in-memory test buffer, or (eventually) a live block
//! device can all stand in for the same trait.

pub use fat32_analyzer_err::{Error, Result};

pub trait ByteSource {
    /// Total length of the image in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads into `buf` starting at `offset`. Returns the number of bytes
    /// actually read, which is shorter than `buf.len()` only at end of
    /// image.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
}

/// An in-memory `ByteSource`, used by the core's unit tests to build small
/// synthetic images without touching the filesystem.
pub struct MemoryByteSource(Vec<u8>);

impl MemoryByteSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl ByteSource for MemoryByteSource {
    fn len(&self) -> u64 {
        self.0.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let offset = offset as usize;
        if offset >= self.0.len() {
            return Ok(0);
        }
        let end = (offset + buf.len()).min(self.0.len());
        let n = end - offset;
        buf[..n].copy_from_slice(&self.0[offset..end]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_at_end_of_image() {
        let src = MemoryByteSource::new(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        let n = src.read_at(1, &mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], &[2, 3]);
    }

    #[test]
    fn read_past_end_returns_zero() {
        let src = MemoryByteSource::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let n = src.read_at(10, &mut buf).unwrap();
        assert_eq!(n, 0);
    }
}
