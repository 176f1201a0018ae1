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

//! Seekable byte stream over a cluster chain. Extending writes allocate and
//! link clusters; the directory entry is written back on flush with the
//! final size, head cluster and last-write time.

use std::io::{self, SeekFrom};

use opal_ds::DataStorage;
use opal_fs::{Error, FileAttributes, FileStream, FsError, Result};

use crate::dir::DirEntryData;
use crate::table::Cluster;
use crate::FatFileSystem;

pub struct FatFile<'fs, DS: DataStorage> {
    fs: &'fs FatFileSystem<DS>,
    dir_key: u32,
    slot: usize,
    data: DirEntryData,
    chain: Vec<Cluster>,
    position: u64,
    writable: bool,
    dirty: bool,
}

impl<'fs, DS: DataStorage> FatFile<'fs, DS> {
    pub(crate) fn new(
        fs: &'fs FatFileSystem<DS>,
        dir_key: u32,
        slot: usize,
        data: DirEntryData,
        writable: bool,
    ) -> Result<Self> {
        let chain = if data.first_cluster >= 2 {
            fs.state.borrow().fat.chain(data.first_cluster)?
        } else {
            Vec::new()
        };
        Ok(Self {
            fs,
            dir_key,
            slot,
            data,
            chain,
            position: 0,
            writable,
            dirty: false,
        })
    }

    fn bytes_per_cluster(&self) -> u64 {
        self.fs.layout.bytes_per_cluster() as u64
    }

    /// Grow the chain until it covers `length` bytes.
    fn ensure_capacity(&mut self, length: u64) -> Result<()> {
        let bytes_per_cluster = self.bytes_per_cluster();
        let needed = length.div_ceil(bytes_per_cluster) as usize;
        while self.chain.len() < needed {
            let mut state = self.fs.state.borrow_mut();
            let cluster = match self.chain.last() {
                Some(&tail) => state.fat.extend_chain(tail)?,
                None => {
                    let head = state.fat.allocate()?;
                    self.data.first_cluster = head;
                    head
                }
            };
            drop(state);
            self.chain.push(cluster);
            self.dirty = true;
        }
        Ok(())
    }

    /// Raw positional write through the chain; the range must already be
    /// covered by allocated clusters.
    fn write_clusters(&self, offset: u64, mut buffer: &[u8]) -> Result<()> {
        let bytes_per_cluster = self.bytes_per_cluster();
        let mut position = offset;
        while !buffer.is_empty() {
            let index = (position / bytes_per_cluster) as usize;
            let within = position % bytes_per_cluster;
            let cluster = *self.chain.get(index).ok_or(Error::Fs(FsError::Corrupt))?;
            let count = buffer.len().min((bytes_per_cluster - within) as usize);
            self.fs.storage.write(
                self.fs.layout.cluster_offset(cluster) + within,
                &buffer[..count],
            )?;
            buffer = &buffer[count..];
            position += count as u64;
        }
        Ok(())
    }

    fn zero_range(&self, mut from: u64, to: u64) -> Result<()> {
        let zeroes = [0u8; 4096];
        while from < to {
            let count = (to - from).min(zeroes.len() as u64) as usize;
            self.write_clusters(from, &zeroes[..count])?;
            from += count as u64;
        }
        Ok(())
    }

    fn flush_inner(&mut self) -> Result<()> {
        if self.dirty {
            self.data.written = self.fs.clock.now();
            self.data.attributes = self.data.attributes | FileAttributes::ARCHIVE;
            self.fs
                .update_entry(self.dir_key, self.slot, &self.data)?;
            self.dirty = false;
        }
        self.fs.flush_fat()
    }
}

impl<DS: DataStorage> FileStream for FatFile<'_, DS> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let size = self.data.size as u64;
        if self.position >= size || buffer.is_empty() {
            return Ok(0);
        }
        let bytes_per_cluster = self.bytes_per_cluster();
        let total = buffer.len().min((size - self.position) as usize);
        let mut done = 0;
        while done < total {
            let index = (self.position / bytes_per_cluster) as usize;
            let within = self.position % bytes_per_cluster;
            let Some(&cluster) = self.chain.get(index) else {
                break;
            };
            let count = (total - done).min((bytes_per_cluster - within) as usize);
            self.fs.storage.read(
                self.fs.layout.cluster_offset(cluster) + within,
                &mut buffer[done..done + count],
            )?;
            done += count;
            self.position += count as u64;
        }
        Ok(done)
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        if buffer.is_empty() {
            return Ok(0);
        }
        let end = self.position + buffer.len() as u64;
        if end > u32::MAX as u64 {
            return Err(Error::Fs(FsError::NoSpace));
        }
        self.ensure_capacity(end)?;
        let old_size = self.data.size as u64;
        if self.position > old_size {
            self.zero_range(old_size, self.position)?;
        }
        self.write_clusters(self.position, buffer)?;
        self.position = end;
        if end > old_size {
            self.data.size = end as u32;
        }
        self.dirty = true;
        Ok(buffer.len())
    }

    fn seek(&mut self, position: SeekFrom) -> Result<u64> {
        let target = match position {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.size as i64 + offset,
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
        self.data.size as u64
    }

    fn set_len(&mut self, length: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        if length > u32::MAX as u64 {
            return Err(Error::Fs(FsError::NoSpace));
        }
        let old_size = self.data.size as u64;
        if length == old_size {
            return Ok(());
        }
        if length > old_size {
            self.ensure_capacity(length)?;
            self.zero_range(old_size, length)?;
        } else {
            let bytes_per_cluster = self.bytes_per_cluster();
            let needed = length.div_ceil(bytes_per_cluster) as usize;
            let mut state = self.fs.state.borrow_mut();
            if needed == 0 {
                if let Some(&head) = self.chain.first() {
                    state.fat.free_chain(head)?;
                }
                self.chain.clear();
                self.data.first_cluster = 0;
            } else if needed < self.chain.len() {
                state.fat.free_chain(self.chain[needed])?;
                state.fat.set_end_of_chain(self.chain[needed - 1])?;
                self.chain.truncate(needed);
            }
        }
        self.data.size = length as u32;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_inner()
    }
}

impl<DS: DataStorage> Drop for FatFile<'_, DS> {
    fn drop(&mut self) {
        if self.dirty {
            let _ = self.flush_inner();
        }
    }
}
