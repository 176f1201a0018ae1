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

//! FAT12/16/32 filesystem over any [`DataStorage`]: path-based reads and
//! writes, directory mutation, and a formatter for fresh volumes.

mod boot_sector;
mod dir;
mod file;
mod format;
mod table;

pub use boot_sector::FatVariant;
pub use file::FatFile;
pub use format::{format_floppy, format_partition, format_volume, FloppyFormat, FormatSpec, Geometry};

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::SeekFrom;

use log::debug;
use opal_ds::DataStorage;
use opal_fs::{
    path, pattern, Clock, EntryInfo, Error, FileAccess, FileAttributes, FileMode, FileStream,
    FileSystem, FsError, FsOptions, Result, SystemClock, TimeZone, Timestamp,
};

use boot_sector::{Layout, SECTOR_SIZE};
use dir::{DirEntryData, DirLocation, Directory};
use table::Fat;

/// Cache key of the fixed FAT12/16 root region; real directories are keyed
/// by their first cluster, which is always >= 2.
const ROOT_REGION_KEY: u32 = 0;

pub struct FatFileSystem<DS: DataStorage> {
    pub(crate) storage: DS,
    pub(crate) layout: Layout,
    pub(crate) options: FsOptions,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) state: RefCell<State>,
}

pub(crate) struct State {
    pub fat: Fat,
    pub dirs: HashMap<u32, Directory>,
}

impl<DS: DataStorage> FatFileSystem<DS> {
    pub fn new(storage: DS) -> Result<Self> {
        Self::with_options(storage, FsOptions::default())
    }

    pub fn with_options(storage: DS, options: FsOptions) -> Result<Self> {
        Self::with_clock(storage, options, Box::new(SystemClock))
    }

    pub fn with_clock(storage: DS, options: FsOptions, clock: Box<dyn Clock>) -> Result<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        storage.read(0, &mut sector)?;
        let layout = Layout::from_boot_sector(&sector)?;
        debug!(
            "Mounted {} volume: {} clusters of {} bytes",
            layout.variant.label(),
            layout.cluster_count,
            layout.bytes_per_cluster()
        );
        let fat = Fat::load(&storage, &layout)?;
        Ok(Self {
            storage,
            layout,
            options,
            clock,
            state: RefCell::new(State {
                fat,
                dirs: HashMap::new(),
            }),
        })
    }

    pub fn variant(&self) -> FatVariant {
        self.layout.variant
    }

    pub fn total_clusters(&self) -> u32 {
        self.layout.cluster_count
    }

    pub fn free_clusters(&self) -> u32 {
        self.state.borrow().fat.free_count()
    }

    pub fn free_space(&self) -> u64 {
        self.free_clusters() as u64 * self.layout.bytes_per_cluster() as u64
    }

    /// Write back the buffered FAT and any dirty directories.
    pub fn flush(&self) -> Result<()> {
        let keys: Vec<u32> = self.state.borrow().dirs.keys().copied().collect();
        for key in keys {
            self.store_dir(key)?;
        }
        self.flush_fat()
    }

    fn root_key(&self) -> u32 {
        match self.layout.variant {
            FatVariant::Fat32 => self.layout.root_cluster,
            _ => ROOT_REGION_KEY,
        }
    }

    fn zone(&self) -> TimeZone {
        self.options.time_zone
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.options.read_only || !self.storage.writable() {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        Ok(())
    }

    pub(crate) fn flush_fat(&self) -> Result<()> {
        self.state
            .borrow_mut()
            .fat
            .flush(&self.storage, &self.layout)
    }

    fn ensure_dir_loaded(&self, key: u32) -> Result<()> {
        if self.state.borrow().dirs.contains_key(&key) {
            return Ok(());
        }
        let (location, bytes) = if key == ROOT_REGION_KEY {
            let mut bytes = vec![0u8; self.layout.root_region_bytes()];
            self.storage
                .read(self.layout.root_region_offset(), &mut bytes)?;
            (DirLocation::RootRegion, bytes)
        } else {
            let chain = self.state.borrow().fat.chain(key)?;
            let bytes_per_cluster = self.layout.bytes_per_cluster() as usize;
            let mut bytes = vec![0u8; chain.len() * bytes_per_cluster];
            for (index, &cluster) in chain.iter().enumerate() {
                self.storage.read(
                    self.layout.cluster_offset(cluster),
                    &mut bytes[index * bytes_per_cluster..(index + 1) * bytes_per_cluster],
                )?;
            }
            (DirLocation::Chain(key), bytes)
        };
        self.state
            .borrow_mut()
            .dirs
            .insert(key, Directory::from_bytes(location, &bytes));
        Ok(())
    }

    fn with_dir<R>(&self, key: u32, action: impl FnOnce(&Directory) -> R) -> Result<R> {
        self.ensure_dir_loaded(key)?;
        let state = self.state.borrow();
        let dir = state.dirs.get(&key).ok_or(Error::Fs(FsError::Corrupt))?;
        Ok(action(dir))
    }

    fn store_dir(&self, key: u32) -> Result<()> {
        let (location, bytes) = {
            let state = self.state.borrow();
            let Some(dir) = state.dirs.get(&key) else {
                return Ok(());
            };
            if !dir.dirty {
                return Ok(());
            }
            (dir.location, dir.to_bytes())
        };
        match location {
            DirLocation::RootRegion => {
                self.storage.write(self.layout.root_region_offset(), &bytes)?;
            }
            DirLocation::Chain(head) => {
                let chain = self.state.borrow().fat.chain(head)?;
                let bytes_per_cluster = self.layout.bytes_per_cluster() as usize;
                for (index, &cluster) in chain.iter().enumerate() {
                    let from = index * bytes_per_cluster;
                    if from >= bytes.len() {
                        break;
                    }
                    let to = bytes.len().min(from + bytes_per_cluster);
                    self.storage
                        .write(self.layout.cluster_offset(cluster), &bytes[from..to])?;
                }
            }
        }
        if let Some(dir) = self.state.borrow_mut().dirs.get_mut(&key) {
            dir.dirty = false;
        }
        Ok(())
    }

    /// Register an entry, growing the directory's cluster chain as needed.
    /// The fixed root region cannot grow.
    fn add_entry(&self, key: u32, data: &DirEntryData) -> Result<usize> {
        self.ensure_dir_loaded(key)?;
        loop {
            let added = {
                let mut state = self.state.borrow_mut();
                let State { fat: _, dirs } = &mut *state;
                let dir = dirs.get_mut(&key).ok_or(Error::Fs(FsError::Corrupt))?;
                dir.add(data, &self.options.oem_table, self.options.time_zone)
            };
            match added {
                Ok(id) => {
                    self.store_dir(key)?;
                    self.flush_fat()?;
                    return Ok(id);
                }
                Err(Error::Fs(FsError::NoSpace)) => {
                    let mut state = self.state.borrow_mut();
                    let State { fat, dirs } = &mut *state;
                    let dir = dirs.get_mut(&key).ok_or(Error::Fs(FsError::Corrupt))?;
                    match dir.location {
                        DirLocation::RootRegion => return Err(Error::Fs(FsError::NoSpace)),
                        DirLocation::Chain(head) => {
                            let chain = fat.chain(head)?;
                            let tail = *chain.last().ok_or(Error::Fs(FsError::Corrupt))?;
                            fat.extend_chain(tail)?;
                            let slots = self.layout.bytes_per_cluster() as usize
                                / boot_sector::DIR_ENTRY_SIZE;
                            dir.grow(slots);
                        }
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    pub(crate) fn update_entry(&self, key: u32, slot: usize, data: &DirEntryData) -> Result<()> {
        self.ensure_dir_loaded(key)?;
        {
            let mut state = self.state.borrow_mut();
            let dir = state
                .dirs
                .get_mut(&key)
                .ok_or(Error::Fs(FsError::Corrupt))?;
            dir.update(slot, data, self.options.time_zone)?;
        }
        self.store_dir(key)
    }

    /// Remove an entry, optionally reclaiming its cluster chain, and forget
    /// any cached directory it referred to.
    fn delete_entry(&self, key: u32, slot: usize, wipe_chain: bool) -> Result<()> {
        self.ensure_dir_loaded(key)?;
        let data = {
            let mut state = self.state.borrow_mut();
            let State { fat, dirs } = &mut *state;
            let dir = dirs.get_mut(&key).ok_or(Error::Fs(FsError::Corrupt))?;
            let data = dir.entry(slot, &self.options.oem_table, self.options.time_zone)?;
            dir.remove(slot)?;
            if wipe_chain && data.first_cluster >= 2 {
                fat.free_chain(data.first_cluster)?;
            }
            data
        };
        if data.first_cluster >= 2 {
            self.state.borrow_mut().dirs.remove(&data.first_cluster);
        }
        self.store_dir(key)?;
        self.flush_fat()
    }

    /// Walk a directory path from the root, strictly left to right.
    fn resolve_dir(&self, dir_path: &str) -> Result<u32> {
        let mut key = self.root_key();
        for component in path::split(dir_path)? {
            let found = self.with_dir(key, |dir| {
                dir.find(component, &self.options.oem_table, self.options.time_zone)
            })?;
            let Some((_, data)) = found else {
                return Err(Error::Fs(FsError::NotFound));
            };
            if !data.is_directory() {
                return Err(Error::Fs(FsError::NotADirectory));
            }
            key = if data.first_cluster < 2 {
                // A ".." entry pointing at the root stores zero.
                self.root_key()
            } else {
                data.first_cluster
            };
        }
        Ok(key)
    }

    /// Resolve a non-root path to its parent directory, slot and entry.
    fn resolve_entry(&self, file_path: &str) -> Result<(u32, usize, DirEntryData)> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let key = self.resolve_dir(&parent)?;
        let found = self.with_dir(key, |dir| {
            dir.find(name, &self.options.oem_table, self.options.time_zone)
        })?;
        match found {
            Some((slot, data)) => Ok((key, slot, data)),
            None => Err(Error::Fs(FsError::NotFound)),
        }
    }

    fn short_name_in(&self, key: u32, display: &str) -> Result<[u8; 11]> {
        let existing = self.with_dir(key, |dir| dir.short_names())?;
        dir::short_name_for(display, &self.options.oem_table, |candidate| {
            existing.iter().any(|name| name == candidate)
        })
    }

    fn create_child_dir(&self, parent_key: u32, name: &str) -> Result<u32> {
        path::validate_name(name)?;
        let short_name = self.short_name_in(parent_key, name)?;
        let now = self.clock.now();
        let cluster = self.state.borrow_mut().fat.allocate()?;

        // Fresh directory cluster: dot entries up front, zeroes after.
        let bytes_per_cluster = self.layout.bytes_per_cluster() as usize;
        let mut bytes = vec![0u8; bytes_per_cluster];
        let parent_cluster = if parent_key == self.root_key() {
            0
        } else {
            parent_key
        };
        let dots = dir::dot_entries(cluster, parent_cluster, now, self.zone());
        bytes[..32].copy_from_slice(zerocopy::IntoBytes::as_bytes(&dots[0]));
        bytes[32..64].copy_from_slice(zerocopy::IntoBytes::as_bytes(&dots[1]));
        self.storage
            .write(self.layout.cluster_offset(cluster), &bytes)?;

        let data = DirEntryData {
            short_name,
            display_name: name.to_string(),
            attributes: FileAttributes::DIRECTORY,
            created: now,
            accessed: now,
            written: now,
            first_cluster: cluster,
            size: 0,
        };
        if let Err(error) = self.add_entry(parent_key, &data) {
            let _ = self.state.borrow_mut().fat.set_free(cluster);
            let _ = self.flush_fat();
            return Err(error);
        }
        Ok(cluster)
    }

    /// Register a new name for an existing directory's first cluster, the
    /// content-free half of a directory move.
    fn attach_child_dir(&self, parent_key: u32, name: &str, source: &DirEntryData) -> Result<()> {
        path::validate_name(name)?;
        let short_name = self.short_name_in(parent_key, name)?;
        let data = DirEntryData {
            short_name,
            display_name: name.to_string(),
            ..source.clone()
        };
        self.add_entry(parent_key, &data)?;
        Ok(())
    }

    fn search(
        &self,
        dir_path: &str,
        filter: Option<&str>,
        recurse: bool,
        want_files: bool,
        want_dirs: bool,
        results: &mut Vec<String>,
    ) -> Result<()> {
        let key = self.resolve_dir(dir_path)?;
        let listed = self.with_dir(key, |dir| {
            dir.entries(&self.options.oem_table, self.options.time_zone)
        })?;
        for (_, data) in listed {
            let name = data.display_name.clone();
            if name == "." || name == ".." || data.attributes.is_volume_label() {
                continue;
            }
            let full = path::join(dir_path, &name);
            let matched = filter.map_or(true, |pattern| pattern::matches(pattern, &name));
            if data.is_directory() {
                if want_dirs && matched {
                    results.push(full.clone());
                }
                if recurse {
                    self.search(&full, filter, true, want_files, want_dirs, results)?;
                }
            } else if want_files && matched {
                results.push(full);
            }
        }
        Ok(())
    }

    fn root_info(&self) -> EntryInfo {
        EntryInfo {
            name: String::new(),
            attributes: FileAttributes::DIRECTORY,
            length: 0,
            created: Timestamp::DOS_EPOCH,
            accessed: Timestamp::DOS_EPOCH,
            written: Timestamp::DOS_EPOCH,
        }
    }

    fn update_times(
        &self,
        file_path: &str,
        change: impl FnOnce(&mut DirEntryData),
    ) -> Result<()> {
        self.ensure_writable()?;
        if path::is_root(file_path) {
            return Err(Error::Fs(FsError::Unsupported));
        }
        let (key, slot, mut data) = self.resolve_entry(file_path)?;
        change(&mut data);
        self.update_entry(key, slot, &data)
    }
}

impl<DS: DataStorage> FileSystem for FatFileSystem<DS> {
    fn friendly_name(&self) -> &'static str {
        self.layout.variant.label()
    }

    fn can_write(&self) -> bool {
        self.storage.writable() && !self.options.read_only
    }

    fn time_zone(&self) -> TimeZone {
        self.options.time_zone
    }

    fn volume_label(&self) -> Result<String> {
        let from_root = self.with_dir(self.root_key(), |dir| dir.volume_label())?;
        Ok(from_root.unwrap_or_else(|| {
            self.layout
                .volume_label
                .iter()
                .map(|&byte| byte as char)
                .collect::<String>()
                .trim_end()
                .to_string()
        }))
    }

    fn file_exists(&self, file_path: &str) -> Result<bool> {
        if path::is_root(file_path) {
            return Ok(false);
        }
        match self.resolve_entry(file_path) {
            Ok((_, _, data)) => Ok(!data.is_directory()),
            Err(Error::Fs(FsError::NotFound | FsError::NotADirectory)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn dir_exists(&self, dir_path: &str) -> Result<bool> {
        match self.resolve_dir(dir_path) {
            Ok(_) => Ok(true),
            Err(Error::Fs(FsError::NotFound | FsError::NotADirectory)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn attributes(&self, file_path: &str) -> Result<FileAttributes> {
        if path::is_root(file_path) {
            return Ok(FileAttributes::DIRECTORY);
        }
        Ok(self.resolve_entry(file_path)?.2.attributes)
    }

    fn set_attributes(&self, file_path: &str, attributes: FileAttributes) -> Result<()> {
        self.ensure_writable()?;
        if path::is_root(file_path) {
            return Err(Error::Fs(FsError::Unsupported));
        }
        let (key, slot, mut data) = self.resolve_entry(file_path)?;
        // Directory and volume-label bits are structural, not caller-settable.
        let keep = FileAttributes::DIRECTORY | FileAttributes::VOLUME_LABEL;
        data.attributes = (data.attributes & keep)
            | FileAttributes::from_bits(attributes.bits() & !keep.bits());
        self.update_entry(key, slot, &data)
    }

    fn creation_time_utc(&self, file_path: &str) -> Result<Timestamp> {
        if path::is_root(file_path) {
            return Ok(Timestamp::DOS_EPOCH);
        }
        Ok(self.resolve_entry(file_path)?.2.created)
    }

    fn set_creation_time_utc(&self, file_path: &str, at: Timestamp) -> Result<()> {
        self.update_times(file_path, |data| data.created = at)
    }

    fn last_access_time_utc(&self, file_path: &str) -> Result<Timestamp> {
        if path::is_root(file_path) {
            return Ok(Timestamp::DOS_EPOCH);
        }
        Ok(self.resolve_entry(file_path)?.2.accessed)
    }

    fn set_last_access_time_utc(&self, file_path: &str, at: Timestamp) -> Result<()> {
        self.update_times(file_path, |data| data.accessed = at)
    }

    fn last_write_time_utc(&self, file_path: &str) -> Result<Timestamp> {
        if path::is_root(file_path) {
            return Ok(Timestamp::DOS_EPOCH);
        }
        Ok(self.resolve_entry(file_path)?.2.written)
    }

    fn set_last_write_time_utc(&self, file_path: &str, at: Timestamp) -> Result<()> {
        self.update_times(file_path, |data| data.written = at)
    }

    fn file_length(&self, file_path: &str) -> Result<u64> {
        let (_, _, data) = self.resolve_entry(file_path)?;
        if data.is_directory() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        Ok(data.size as u64)
    }

    fn open_file<'a>(
        &'a self,
        file_path: &str,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<Box<dyn FileStream + 'a>> {
        if path::is_root(file_path) {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        let wants_write = access == FileAccess::ReadWrite;
        let mode_needs_write = matches!(
            mode,
            FileMode::Create | FileMode::CreateNew | FileMode::Truncate | FileMode::Append
        );
        if mode_needs_write && !wants_write {
            return Err(Error::Fs(FsError::ReadOnly));
        }
        if wants_write {
            self.ensure_writable()?;
        }

        let (parent, name) = path::parent_and_name(file_path)?;
        let parent_key = self.resolve_dir(&parent)?;
        let found = self.with_dir(parent_key, |dir| {
            dir.find(name, &self.options.oem_table, self.options.time_zone)
        })?;

        let (slot, data, truncate) = match found {
            Some((_, data)) if data.is_directory() => {
                return Err(Error::Fs(FsError::IsADirectory));
            }
            Some(_) if mode == FileMode::CreateNew => {
                return Err(Error::Fs(FsError::AlreadyExists));
            }
            Some((slot, data)) => {
                let truncate = matches!(mode, FileMode::Create | FileMode::Truncate);
                (slot, data, truncate)
            }
            None => {
                if matches!(mode, FileMode::Open | FileMode::Truncate) {
                    return Err(Error::Fs(FsError::NotFound));
                }
                self.ensure_writable()?;
                path::validate_name(name)?;
                let short_name = self.short_name_in(parent_key, name)?;
                let now = self.clock.now();
                let data = DirEntryData {
                    short_name,
                    display_name: name.to_string(),
                    attributes: FileAttributes::ARCHIVE,
                    created: now,
                    accessed: now,
                    written: now,
                    first_cluster: 0,
                    size: 0,
                };
                let slot = self.add_entry(parent_key, &data)?;
                (slot, data, false)
            }
        };

        let mut stream = FatFile::new(self, parent_key, slot, data, wants_write)?;
        if truncate {
            stream.set_len(0)?;
        }
        if mode == FileMode::Append {
            stream.seek(SeekFrom::End(0))?;
        }
        Ok(Box::new(stream))
    }

    fn create_dir(&self, dir_path: &str) -> Result<()> {
        self.ensure_writable()?;
        let components = path::split(dir_path)?;
        let mut key = self.root_key();
        let last = components.len().saturating_sub(1);
        for (index, component) in components.iter().enumerate() {
            let found = self.with_dir(key, |dir| {
                dir.find(component, &self.options.oem_table, self.options.time_zone)
            })?;
            key = match found {
                Some((_, data)) if data.is_directory() => {
                    if data.first_cluster < 2 {
                        self.root_key()
                    } else {
                        data.first_cluster
                    }
                }
                Some(_) => {
                    return Err(Error::Fs(if index == last {
                        FsError::AlreadyExists
                    } else {
                        FsError::NotADirectory
                    }));
                }
                None => self.create_child_dir(key, component)?,
            };
        }
        Ok(())
    }

    fn delete_file(&self, file_path: &str) -> Result<()> {
        self.ensure_writable()?;
        let (key, slot, data) = self.resolve_entry(file_path)?;
        if data.is_directory() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        self.delete_entry(key, slot, true)
    }

    fn delete_dir(&self, dir_path: &str) -> Result<()> {
        self.ensure_writable()?;
        if path::is_root(dir_path) {
            return Err(Error::Fs(FsError::InvalidPath));
        }
        let (key, slot, data) = self.resolve_entry(dir_path)?;
        if !data.is_directory() {
            return Err(Error::Fs(FsError::NotADirectory));
        }
        let empty = self.with_dir(data.first_cluster, |dir| {
            dir.is_empty(&self.options.oem_table, self.options.time_zone)
        })?;
        if !empty {
            return Err(Error::Fs(FsError::DirectoryNotEmpty));
        }
        self.delete_entry(key, slot, true)
    }

    fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()> {
        self.ensure_writable()?;
        let (_, _, source) = self.resolve_entry(from)?;
        if source.is_directory() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        match self.resolve_entry(to) {
            Ok((_, _, existing)) if existing.is_directory() => {
                return Err(Error::Fs(FsError::IsADirectory));
            }
            Ok(_) if !overwrite => return Err(Error::Fs(FsError::AlreadyExists)),
            Ok(_) => self.delete_file(to)?,
            Err(Error::Fs(FsError::NotFound)) => {}
            Err(error) => return Err(error),
        }

        {
            let mut reader = self.open_file(from, FileMode::Open, FileAccess::Read)?;
            let mut writer = self.open_file(to, FileMode::CreateNew, FileAccess::ReadWrite)?;
            let mut chunk = [0u8; 4096];
            loop {
                let count = reader.read(&mut chunk)?;
                if count == 0 {
                    break;
                }
                writer.write_all(&chunk[..count])?;
            }
            writer.flush()?;
        }

        // Copied entries keep the source metadata apart from the name.
        let (key, slot, mut data) = self.resolve_entry(to)?;
        data.attributes = source.attributes;
        data.created = source.created;
        data.written = source.written;
        self.update_entry(key, slot, &data)
    }

    fn move_file(&self, from: &str, to: &str, overwrite: bool) -> Result<()> {
        self.ensure_writable()?;
        let (source_key, source_slot, source) = self.resolve_entry(from)?;
        if source.is_directory() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        let (to_parent, to_name) = path::parent_and_name(to)?;
        let target_key = self.resolve_dir(&to_parent)?;
        let existing = self.with_dir(target_key, |dir| {
            dir.find(to_name, &self.options.oem_table, self.options.time_zone)
        })?;
        if let Some((existing_slot, existing)) = existing {
            if existing.is_directory() {
                return Err(Error::Fs(FsError::IsADirectory));
            }
            if target_key == source_key && existing_slot == source_slot {
                return Err(Error::Fs(FsError::AlreadyExists));
            }
            if !overwrite {
                return Err(Error::Fs(FsError::AlreadyExists));
            }
            self.delete_entry(target_key, existing_slot, true)?;
        }
        path::validate_name(to_name)?;
        let short_name = self.short_name_in(target_key, to_name)?;
        let data = DirEntryData {
            short_name,
            display_name: to_name.to_string(),
            ..source
        };
        // Register the chain under its new name before unlinking the old
        // entry; slots never shift, so the source slot id stays valid.
        self.add_entry(target_key, &data)?;
        self.delete_entry_keep_chain(source_key, source_slot)
    }

    fn move_dir(&self, from: &str, to: &str) -> Result<()> {
        self.ensure_writable()?;
        if path::is_root(from) || path::is_root(to) {
            return Err(Error::Fs(FsError::InvalidPath));
        }
        // A directory cannot move under itself.
        let from_components = path::split(from)?;
        let to_components = path::split(to)?;
        if to_components.len() >= from_components.len()
            && from_components
                .iter()
                .zip(to_components.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            return Err(Error::Fs(FsError::InvalidPath));
        }

        let (source_key, source_slot, source) = self.resolve_entry(from)?;
        if !source.is_directory() {
            return Err(Error::Fs(FsError::NotADirectory));
        }
        if self.exists(to)? {
            return Err(Error::Fs(FsError::AlreadyExists));
        }
        let (to_parent, to_name) = path::parent_and_name(to)?;
        let target_key = self.resolve_dir(&to_parent)?;
        self.attach_child_dir(target_key, to_name, &source)?;
        self.delete_entry_keep_chain(source_key, source_slot)?;

        // Repoint ".." at the new parent; zero when that parent is the root.
        let parent_cluster = if target_key == self.root_key() {
            0
        } else {
            target_key
        };
        self.ensure_dir_loaded(source.first_cluster)?;
        {
            let mut state = self.state.borrow_mut();
            let dir = state
                .dirs
                .get_mut(&source.first_cluster)
                .ok_or(Error::Fs(FsError::Corrupt))?;
            dir.set_parent_cluster(parent_cluster)?;
        }
        self.store_dir(source.first_cluster)?;
        self.state.borrow_mut().dirs.remove(&source.first_cluster);
        Ok(())
    }

    fn files(&self, dir_path: &str, filter: Option<&str>, recurse: bool) -> Result<Vec<String>> {
        let mut results = Vec::new();
        self.search(dir_path, filter, recurse, true, false, &mut results)?;
        Ok(results)
    }

    fn dirs(&self, dir_path: &str, filter: Option<&str>, recurse: bool) -> Result<Vec<String>> {
        let mut results = Vec::new();
        self.search(dir_path, filter, recurse, false, true, &mut results)?;
        Ok(results)
    }

    fn entries(&self, dir_path: &str, filter: Option<&str>, recurse: bool) -> Result<Vec<String>> {
        let mut results = Vec::new();
        self.search(dir_path, filter, recurse, true, true, &mut results)?;
        Ok(results)
    }

    fn entry_info(&self, file_path: &str) -> Result<EntryInfo> {
        if path::is_root(file_path) {
            return Ok(self.root_info());
        }
        let (_, _, data) = self.resolve_entry(file_path)?;
        Ok(EntryInfo {
            name: data.display_name.clone(),
            attributes: data.attributes,
            length: if data.is_directory() {
                0
            } else {
                data.size as u64
            },
            created: data.created,
            accessed: data.accessed,
            written: data.written,
        })
    }
}

impl<DS: DataStorage> FatFileSystem<DS> {
    /// Remove an entry without touching the chain it referenced; the move
    /// operations re-register the chain under a new name first.
    fn delete_entry_keep_chain(&self, key: u32, slot: usize) -> Result<()> {
        self.ensure_dir_loaded(key)?;
        {
            let mut state = self.state.borrow_mut();
            let dir = state
                .dirs
                .get_mut(&key)
                .ok_or(Error::Fs(FsError::Corrupt))?;
            dir.remove(slot)?;
        }
        self.store_dir(key)
    }
}

impl<DS: DataStorage> Drop for FatFileSystem<DS> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
