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

use std::{fs::File, os::unix::fs::FileExt, path::Path};

use fat32_analyzer_io::{ByteSource, Error, Result};
use log::error;

/// A `ByteSource` backed by an open regular file, read with positioned
/// reads so the analyzer never has to seek.
///
/// The file is opened once and held for the lifetime of the session; it is
/// closed when this value drops, which covers every exit path (success,
/// fatal error, or an early return from the walker) without any explicit
/// cleanup code.
pub struct FileByteSource {
    file: File,
    len: u64,
}

impl FileByteSource {
    pub fn open(image_path: impl AsRef<Path>) -> Result<Self> {
        let image_path = image_path.as_ref();
        let file = File::open(image_path).map_err(|e| {
            error!("failed to open {}: {e}", image_path.display());
            Error::ImageNotFound(image_path.display().to_string())
        })?;
        let len = file.metadata().map_err(Error::Io)?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileByteSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.len - offset) as usize;
        let mut read = 0;
        while read < want {
            match self.file.read_at(&mut buf[read..want], offset + read as u64) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(read)
    }
}
