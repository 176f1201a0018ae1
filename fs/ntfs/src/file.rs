// Copyright 2026 The opal developers
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

//! Read-only stream over one `$DATA` attribute: a resident buffer, or a run
//! list where sparse extents and the tail beyond the initialized size read
//! as zeros.

use std::io::{self, SeekFrom};

use opal_ds::DataStorage;
use opal_fs::{Error, FileStream, FsError, Result};

use crate::attr::Extent;
use crate::NtfsFileSystem;

pub(crate) enum FileContent {
    Resident(Vec<u8>),
    NonResident {
        real_size: u64,
        initialized_size: u64,
        runs: Vec<Extent>,
    },
}

pub struct NtfsFile<'fs, DS: DataStorage> {
    fs: &'fs NtfsFileSystem<DS>,
    content: FileContent,
    position: u64,
}

impl<'fs, DS: DataStorage> NtfsFile<'fs, DS> {
    pub(crate) fn new(fs: &'fs NtfsFileSystem<DS>, content: FileContent) -> Self {
        Self {
            fs,
            content,
            position: 0,
        }
    }

    fn size(&self) -> u64 {
        match &self.content {
            FileContent::Resident(value) => value.len() as u64,
            FileContent::NonResident { real_size, .. } => *real_size,
        }
    }
}

impl<DS: DataStorage> FileStream for NtfsFile<'_, DS> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let size = self.size();
        if self.position >= size || buffer.is_empty() {
            return Ok(0);
        }
        let total = buffer.len().min((size - self.position) as usize);
        match &self.content {
            FileContent::Resident(value) => {
                let from = self.position as usize;
                buffer[..total].copy_from_slice(&value[from..from + total]);
            }
            FileContent::NonResident {
                initialized_size,
                runs,
                ..
            } => {
                self.fs
                    .read_runs(runs, *initialized_size, self.position, &mut buffer[..total])?;
            }
        }
        self.position += total as u64;
        Ok(total)
    }

    fn write(&mut self, _buffer: &[u8]) -> Result<usize> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn seek(&mut self, position: SeekFrom) -> Result<u64> {
        let target = match position {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.size() as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if target < 0 {
            return Err(Error::Io(io::Error::from(io::ErrorKind::InvalidInput)));
        }
        self.position = target as u64;
        Ok(self.position)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn len(&self) -> u64 {
        self.size()
    }

    fn set_len(&mut self, _length: u64) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
