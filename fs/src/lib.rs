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

//! Common interface over on-disk filesystem images: the [`FileSystem`]
//! capability set implemented per format, the byte-stream handle it hands
//! out, and the path/wildcard/time utilities shared by the engines.

pub use opal_err::{Error, FsError, Result};

pub mod path;
pub mod pattern;
pub mod time;

mod oem;

pub use oem::OemTable;
pub use time::{Clock, FixedClock, SystemClock, TimeZone, Timestamp};

use std::io::SeekFrom;
use std::ops::{BitAnd, BitOr};

/// File attribute bits, layout-compatible with the FAT attribute byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileAttributes(u8);

impl FileAttributes {
    pub const NONE: Self = Self(0x00);
    pub const READ_ONLY: Self = Self(0x01);
    pub const HIDDEN: Self = Self(0x02);
    pub const SYSTEM: Self = Self(0x04);
    pub const VOLUME_LABEL: Self = Self(0x08);
    pub const DIRECTORY: Self = Self(0x10);
    pub const ARCHIVE: Self = Self(0x20);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x3F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    pub const fn is_read_only(self) -> bool {
        self.contains(Self::READ_ONLY)
    }

    pub const fn is_volume_label(self) -> bool {
        self.contains(Self::VOLUME_LABEL)
    }
}

impl BitOr for FileAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for FileAttributes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// How [`FileSystem::open_file`] treats an existing or missing target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// Existing file only.
    Open,
    /// Existing file, or create an empty one.
    OpenOrCreate,
    /// Create, truncating any existing content.
    Create,
    /// Create; an existing file is a collision.
    CreateNew,
    /// Existing file only, truncated to zero.
    Truncate,
    /// Existing file or empty one, positioned at the end.
    Append,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileAccess {
    Read,
    ReadWrite,
}

/// Per-mount configuration record.
#[derive(Clone, Copy, Default)]
pub struct FsOptions {
    pub time_zone: TimeZone,
    pub oem_table: OemTable,
    /// Refuse mutations even when the backing store is writable.
    pub read_only: bool,
}

/// Metadata snapshot for one directory entry.
#[derive(Clone, Debug)]
pub struct EntryInfo {
    /// Display (long) name of the final path component.
    pub name: String,
    pub attributes: FileAttributes,
    /// Byte length; zero for directories.
    pub length: u64,
    pub created: Timestamp,
    pub accessed: Timestamp,
    pub written: Timestamp,
}

/// A seekable byte stream over one file's contents.
///
/// Streams borrow the filesystem that produced them and must be dropped (or
/// flushed) before the filesystem itself is released. Dropping a writable
/// stream flushes best-effort; call [`FileStream::flush`] to observe errors.
pub trait FileStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buffer: &[u8]) -> Result<usize>;

    fn seek(&mut self, position: SeekFrom) -> Result<u64>;

    fn position(&self) -> u64;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_len(&mut self, length: u64) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn read_exact(&mut self, mut buffer: &mut [u8]) -> Result<()> {
        while !buffer.is_empty() {
            let count = self.read(buffer)?;
            if count == 0 {
                return Err(Error::Io(std::io::Error::from(
                    std::io::ErrorKind::UnexpectedEof,
                )));
            }
            buffer = &mut buffer[count..];
        }
        Ok(())
    }

    fn write_all(&mut self, mut buffer: &[u8]) -> Result<()> {
        while !buffer.is_empty() {
            let count = self.write(buffer)?;
            if count == 0 {
                return Err(Error::Io(std::io::Error::from(
                    std::io::ErrorKind::WriteZero,
                )));
            }
            buffer = &buffer[count..];
        }
        Ok(())
    }

    fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut contents = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let count = self.read(&mut chunk)?;
            if count == 0 {
                return Ok(contents);
            }
            contents.extend_from_slice(&chunk[..count]);
        }
    }
}

/// The capability set shared by every filesystem implementation.
///
/// Paths are backslash-separated and case-insensitive; the root is `""` or
/// `"\"`. All operations are synchronous and the instance owns its backing
/// store exclusively; sharing across threads requires external
/// serialization.
pub trait FileSystem {
    fn friendly_name(&self) -> &'static str;

    fn can_write(&self) -> bool;

    fn root(&self) -> &str {
        "\\"
    }

    /// Zone used by the local-form timestamp accessors.
    fn time_zone(&self) -> TimeZone {
        TimeZone::Utc
    }

    fn volume_label(&self) -> Result<String>;

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.file_exists(path)? || self.dir_exists(path)?)
    }

    fn file_exists(&self, path: &str) -> Result<bool>;

    fn dir_exists(&self, path: &str) -> Result<bool>;

    fn attributes(&self, path: &str) -> Result<FileAttributes>;

    fn set_attributes(&self, path: &str, attributes: FileAttributes) -> Result<()>;

    fn creation_time_utc(&self, path: &str) -> Result<Timestamp>;

    fn set_creation_time_utc(&self, path: &str, at: Timestamp) -> Result<()>;

    fn last_access_time_utc(&self, path: &str) -> Result<Timestamp>;

    fn set_last_access_time_utc(&self, path: &str, at: Timestamp) -> Result<()>;

    fn last_write_time_utc(&self, path: &str) -> Result<Timestamp>;

    fn set_last_write_time_utc(&self, path: &str, at: Timestamp) -> Result<()>;

    fn creation_time(&self, path: &str) -> Result<Timestamp> {
        Ok(self.creation_time_utc(path)?.to_local(self.time_zone()))
    }

    fn set_creation_time(&self, path: &str, at: Timestamp) -> Result<()> {
        self.set_creation_time_utc(path, at.to_utc(self.time_zone()))
    }

    fn last_access_time(&self, path: &str) -> Result<Timestamp> {
        Ok(self.last_access_time_utc(path)?.to_local(self.time_zone()))
    }

    fn set_last_access_time(&self, path: &str, at: Timestamp) -> Result<()> {
        self.set_last_access_time_utc(path, at.to_utc(self.time_zone()))
    }

    fn last_write_time(&self, path: &str) -> Result<Timestamp> {
        Ok(self.last_write_time_utc(path)?.to_local(self.time_zone()))
    }

    fn set_last_write_time(&self, path: &str, at: Timestamp) -> Result<()> {
        self.set_last_write_time_utc(path, at.to_utc(self.time_zone()))
    }

    fn file_length(&self, path: &str) -> Result<u64>;

    fn open_file<'a>(
        &'a self,
        path: &str,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<Box<dyn FileStream + 'a>>;

    /// Create a directory, including missing intermediate components.
    fn create_dir(&self, path: &str) -> Result<()>;

    fn delete_file(&self, path: &str) -> Result<()>;

    /// Delete an empty directory. A non-empty one fails with
    /// [`FsError::DirectoryNotEmpty`]; recursion is the caller's loop.
    fn delete_dir(&self, path: &str) -> Result<()>;

    fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()>;

    fn move_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()>;

    fn move_dir(&self, from: &str, to: &str) -> Result<()>;

    /// Full paths of files under `path`, optionally filtered by a wildcard
    /// pattern and recursing into subdirectories.
    fn files(&self, path: &str, pattern: Option<&str>, recurse: bool) -> Result<Vec<String>>;

    fn dirs(&self, path: &str, pattern: Option<&str>, recurse: bool) -> Result<Vec<String>>;

    fn entries(&self, path: &str, pattern: Option<&str>, recurse: bool) -> Result<Vec<String>>;

    fn entry_info(&self, path: &str) -> Result<EntryInfo>;

    fn file_info(&self, path: &str) -> Result<EntryInfo> {
        let info = self.entry_info(path)?;
        if info.attributes.is_directory() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        Ok(info)
    }

    fn dir_info(&self, path: &str) -> Result<EntryInfo> {
        let info = self.entry_info(path)?;
        if !info.attributes.is_directory() {
            return Err(Error::Fs(FsError::NotADirectory));
        }
        Ok(info)
    }
}
