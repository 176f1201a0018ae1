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

use std::{
    cell::RefCell,
    fs::{File, OpenOptions},
    io,
    os::unix::fs::FileExt,
    path::Path,
};

use opal_ds::{DataStorage, Error, FsError, Result};

/// Positional file I/O over a disk image or block device.
pub struct FileStorage {
    file: File,
    writable: bool,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            writable: false,
        })
    }

    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: OpenOptions::new().read(true).write(true).open(path)?,
            writable: true,
        })
    }

    pub fn create(path: impl AsRef<Path>, length: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(length)?;
        Ok(Self {
            file,
            writable: true,
        })
    }
}

impl DataStorage for FileStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buffer, offset)?;
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        self.file.write_all_at(buffer, offset)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&self, length: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        self.file.set_len(length)?;
        Ok(())
    }

    fn writable(&self) -> bool {
        self.writable
    }
}

/// Growable in-memory buffer, mainly for formatting scratch images and for
/// tests. Single-threaded; interior mutability keeps the `DataStorage`
/// receivers shared.
pub struct MemoryStorage {
    data: RefCell<Vec<u8>>,
    writable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn with_len(length: u64) -> Self {
        Self::from_vec(vec![0; length as usize])
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: RefCell::new(data),
            writable: true,
        }
    }

    pub fn read_only(data: Vec<u8>) -> Self {
        Self {
            data: RefCell::new(data),
            writable: false,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStorage for MemoryStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let data = self.data.borrow();
        let start = offset as usize;
        let end = start
            .checked_add(buffer.len())
            .filter(|&end| end <= data.len())
            .ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)))?;
        buffer.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        let mut data = self.data.borrow_mut();
        let start = offset as usize;
        let end = start
            .checked_add(buffer.len())
            .ok_or_else(|| Error::Io(io::Error::from(io::ErrorKind::InvalidInput)))?;
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buffer);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.data.borrow().len() as u64)
    }

    fn set_len(&self, length: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        self.data.borrow_mut().resize(length as usize, 0);
        Ok(())
    }

    fn writable(&self) -> bool {
        self.writable
    }
}
