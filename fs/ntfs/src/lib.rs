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

//! Read-only NTFS filesystem over any [`DataStorage`]. Bootstraps from the
//! boot sector through MFT record 0 to the root index, then resolves paths
//! by up-cased name, including `path:stream` alternate data streams.

mod attr;
mod file;
mod index;
mod record;

pub use file::NtfsFile;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, error, warn};
use opal_ds::DataStorage;
use opal_fs::{
    path, pattern, time, EntryInfo, Error, FileAccess, FileAttributes, FileMode, FileStream,
    FileSystem, FsError, FsOptions, Result, TimeZone, Timestamp,
};
use zerocopy::{
    little_endian::{U16, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use attr::{Attribute, AttributeContent, AttributeType, Extent, StandardInformation};
use file::FileContent;
use index::{parse_node, IndexEntry, IndexRootHeader, FILE_NAME_INDEX};
use record::{well_known, FileRecord, MftReference};

const SECTOR_SIZE: usize = 512;

/// NTFS boot sector; the BPB fields FAT also has sit at the same offsets,
/// followed by the NTFS extensions.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct BootSector {
    jump: [u8; 3],
    /// "NTFS    ".
    oem_id: [u8; 8],
    bytes_per_sector: U16,
    sectors_per_cluster: u8,
    /// Always zero on NTFS.
    reserved_sectors: U16,
    zeros1: [u8; 3],
    unused1: U16,
    media: u8,
    zeros2: U16,
    sectors_per_track: U16,
    head_count: U16,
    hidden_sectors: U32,
    unused2: U32,
    unused3: U32,
    total_sectors: U64,
    /// First cluster of the MFT.
    mft_lcn: U64,
    mft_mirror_lcn: U64,
    /// Positive: clusters per record; negative: record is 2^-n bytes.
    clusters_per_record: i8,
    reserved1: [u8; 3],
    clusters_per_index_block: i8,
    reserved2: [u8; 3],
    volume_serial: U64,
    checksum: U32,
}

fn size_from_clusters(encoded: i8, bytes_per_cluster: u64) -> u64 {
    if encoded > 0 {
        encoded as u64 * bytes_per_cluster
    } else {
        1u64 << (-encoded as u32)
    }
}

pub struct NtfsFileSystem<DS: DataStorage> {
    pub(crate) storage: DS,
    options: FsOptions,
    pub(crate) bytes_per_cluster: u64,
    record_size: usize,
    index_block_size: u32,
    total_sectors: u64,
    volume_serial: u64,
    mft_runs: Vec<Extent>,
    mft_size: u64,
    mft_initialized: u64,
    upcase: Vec<u16>,
    state: RefCell<State>,
}

struct State {
    records: HashMap<u64, Rc<FileRecord>>,
    bitmap: Option<Rc<Vec<u8>>>,
}

impl<DS: DataStorage> NtfsFileSystem<DS> {
    pub fn new(storage: DS) -> Result<Self> {
        Self::with_options(storage, FsOptions::default())
    }

    pub fn with_options(storage: DS, options: FsOptions) -> Result<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        storage.read(0, &mut sector)?;
        if sector[510] != 0x55 || sector[511] != 0xAA {
            error!("Boot sector shall end with the 0x55 0xAA signature word");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let boot = BootSector::read_from_prefix(&sector)
            .map_err(|_| Error::Fs(FsError::Corrupt))?
            .0;
        if boot.oem_id != *b"NTFS    " {
            error!("OEM identifier shall be \"NTFS    \"");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let bytes_per_sector = boot.bytes_per_sector.get() as u64;
        if !bytes_per_sector.is_power_of_two() || !(512..=4096).contains(&bytes_per_sector) {
            error!("Bytes per sector ({bytes_per_sector}) shall be a power of 2 within [512, 4096]");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let sectors_per_cluster = boot.sectors_per_cluster as u64;
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            error!("Sectors per cluster ({sectors_per_cluster}) shall be a power of 2 within [1, 128]");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let bytes_per_cluster = bytes_per_sector * sectors_per_cluster;
        let record_size = size_from_clusters(boot.clusters_per_record, bytes_per_cluster);
        if !(SECTOR_SIZE as u64..=65536).contains(&record_size) {
            error!("File record size ({record_size}) shall be within [512, 65536]");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let index_block_size =
            size_from_clusters(boot.clusters_per_index_block, bytes_per_cluster) as u32;
        debug!(
            "Mounting NTFS volume: {} sectors, {} bytes per cluster, {} byte records",
            boot.total_sectors.get(),
            bytes_per_cluster,
            record_size
        );

        // Record 0 describes the MFT's own data runs; everything else is
        // reachable only through them.
        let mut mft_record = vec![0u8; record_size as usize];
        storage.read(boot.mft_lcn.get() * bytes_per_cluster, &mut mft_record)?;
        let mft = FileRecord::parse(well_known::MFT, &mut mft_record)?;
        let mft_data = mft
            .attribute(AttributeType::Data, "")
            .ok_or(Error::Fs(FsError::Corrupt))?;
        let (mft_runs, mft_size, mft_initialized) = match &mft_data.content {
            AttributeContent::NonResident {
                real_size,
                initialized_size,
                runs,
                ..
            } => (runs.clone(), *real_size, *initialized_size),
            AttributeContent::Resident(_) => {
                error!("The MFT data attribute shall be non-resident");
                return Err(Error::Fs(FsError::Corrupt));
            }
        };

        let mut fs = Self {
            storage,
            options,
            bytes_per_cluster,
            record_size: record_size as usize,
            index_block_size,
            total_sectors: boot.total_sectors.get(),
            volume_serial: boot.volume_serial.get(),
            mft_runs,
            mft_size,
            mft_initialized,
            upcase: Vec::new(),
            state: RefCell::new(State {
                records: HashMap::new(),
                bitmap: None,
            }),
        };
        fs.state
            .borrow_mut()
            .records
            .insert(well_known::MFT, Rc::new(mft));

        // $UpCase drives name folding; without it only ASCII folds.
        match fs.read_record(well_known::UPCASE) {
            Ok(upcase_record) => {
                if let Some(upcase_data) = upcase_record.attribute(AttributeType::Data, "") {
                    let bytes = fs.attribute_bytes(upcase_data)?;
                    fs.upcase = bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .collect();
                }
            }
            Err(_) => warn!("$UpCase is unreadable, folding ASCII only"),
        }

        // The root directory must be sound before the volume is usable; the
        // bitmap and security records are pulled in early but tolerated
        // missing (NTFS 1.x has no $Secure).
        fs.read_record(well_known::ROOT)?;
        for index in [well_known::BITMAP, well_known::SECURE] {
            if fs.read_record(index).is_err() {
                warn!("Well-known record {index} is unreadable");
            }
        }
        Ok(fs)
    }

    pub fn volume_serial(&self) -> u64 {
        self.volume_serial
    }

    pub fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    /// Read from a non-resident stream described by `runs`: sparse runs and
    /// anything past the initialized size read as zeros.
    pub(crate) fn read_runs(
        &self,
        runs: &[Extent],
        initialized_size: u64,
        offset: u64,
        buffer: &mut [u8],
    ) -> Result<()> {
        let bytes_per_cluster = self.bytes_per_cluster;
        let mut done = 0;
        while done < buffer.len() {
            let position = offset + done as u64;
            let vcn = position / bytes_per_cluster;
            let within = position % bytes_per_cluster;
            let run = runs
                .iter()
                .find(|run| run.vcn <= vcn && vcn < run.vcn + run.length);
            let count = (buffer.len() - done).min((bytes_per_cluster - within) as usize);
            let chunk = &mut buffer[done..done + count];
            match run {
                Some(Extent {
                    lcn: Some(lcn),
                    vcn: run_vcn,
                    ..
                }) if position < initialized_size => {
                    let cluster = lcn + (vcn - run_vcn);
                    self.storage
                        .read(cluster * bytes_per_cluster + within, chunk)?;
                    let limit = initialized_size.saturating_sub(position) as usize;
                    if limit < count {
                        chunk[limit..].fill(0);
                    }
                }
                _ => chunk.fill(0),
            }
            done += count;
        }
        Ok(())
    }

    /// Whole content of an attribute, resident or not.
    fn attribute_bytes(&self, attribute: &Attribute) -> Result<Vec<u8>> {
        match &attribute.content {
            AttributeContent::Resident(value) => Ok(value.clone()),
            AttributeContent::NonResident {
                real_size,
                initialized_size,
                runs,
                ..
            } => {
                let mut bytes = vec![0u8; *real_size as usize];
                self.read_runs(runs, *initialized_size, 0, &mut bytes)?;
                Ok(bytes)
            }
        }
    }

    /// Fetch a record through the MFT's own stream, verifying its update
    /// sequence array.
    fn read_record(&self, index: u64) -> Result<Rc<FileRecord>> {
        if let Some(record) = self.state.borrow().records.get(&index) {
            return Ok(record.clone());
        }
        let offset = index * self.record_size as u64;
        if offset + self.record_size as u64 > self.mft_size {
            return Err(Error::Fs(FsError::NotFound));
        }
        let mut buffer = vec![0u8; self.record_size];
        self.read_runs(&self.mft_runs, self.mft_initialized, offset, &mut buffer)?;
        let record = Rc::new(FileRecord::parse(index, &mut buffer)?);
        self.state
            .borrow_mut()
            .records
            .insert(index, record.clone());
        Ok(record)
    }

    /// Follow an index entry's file reference, rejecting stale sequence
    /// numbers.
    fn follow_reference(&self, reference: u64) -> Result<Rc<FileRecord>> {
        let reference = MftReference(reference);
        let record = self.read_record(reference.index())?;
        if reference.sequence() != 0 && record.sequence != reference.sequence() {
            warn!(
                "Reference to record {} carries stale sequence {} (current {})",
                reference.index(),
                reference.sequence(),
                record.sequence
            );
            return Err(Error::Fs(FsError::NotFound));
        }
        Ok(record)
    }

    fn upcase_unit(&self, unit: u16) -> u16 {
        match self.upcase.get(unit as usize) {
            Some(&mapped) => mapped,
            None if unit < 128 => (unit as u8).to_ascii_uppercase() as u16,
            None => unit,
        }
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        let mut left = a.encode_utf16().map(|unit| self.upcase_unit(unit));
        let mut right = b.encode_utf16().map(|unit| self.upcase_unit(unit));
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if x == y => {}
                _ => return false,
            }
        }
    }

    /// All entries of a directory's file-name index, in collation order.
    fn dir_entry_list(&self, record: &FileRecord) -> Result<Vec<IndexEntry>> {
        let root_attr = record
            .attribute(AttributeType::IndexRoot, FILE_NAME_INDEX)
            .ok_or(Error::Fs(FsError::NotADirectory))?;
        let AttributeContent::Resident(value) = &root_attr.content else {
            error!("$INDEX_ROOT shall be resident");
            return Err(Error::Fs(FsError::Corrupt));
        };
        let root_header = IndexRootHeader::read_from_prefix(value)
            .map_err(|_| Error::Fs(FsError::Corrupt))?
            .0;
        let block_size = if root_header.index_block_size.get() != 0 {
            root_header.index_block_size.get()
        } else {
            self.index_block_size
        };
        let allocation = record
            .attribute(AttributeType::IndexAllocation, FILE_NAME_INDEX)
            .map(|attribute| self.attribute_bytes(attribute))
            .transpose()?;
        let node = &value[size_of::<IndexRootHeader>()..];
        let mut entries = Vec::new();
        self.walk_index(node, allocation.as_deref(), block_size, &mut entries)?;
        Ok(entries)
    }

    fn walk_index(
        &self,
        node: &[u8],
        allocation: Option<&[u8]>,
        block_size: u32,
        out: &mut Vec<IndexEntry>,
    ) -> Result<()> {
        for entry in parse_node(node)? {
            if let Some(vcn) = entry.subnode_vcn {
                let Some(allocation) = allocation else {
                    error!("Subnode pointer shall have an $INDEX_ALLOCATION to point into");
                    return Err(Error::Fs(FsError::Corrupt));
                };
                // Subnode VCNs count clusters, or 512-byte units when the
                // cluster outgrows the block.
                let unit = if self.bytes_per_cluster <= block_size as u64 {
                    self.bytes_per_cluster
                } else {
                    SECTOR_SIZE as u64
                };
                let from = (vcn * unit) as usize;
                let to = from + block_size as usize;
                if to > allocation.len() {
                    error!("Index block at VCN {vcn} shall lie inside $INDEX_ALLOCATION");
                    return Err(Error::Fs(FsError::Corrupt));
                }
                let mut block = allocation[from..to].to_vec();
                let child = index::open_block(&mut block)?;
                self.walk_index(child, Some(allocation), block_size, out)?;
            }
            if entry.is_last {
                break;
            }
            out.push(entry);
        }
        Ok(())
    }

    fn lookup_child(&self, dir: &FileRecord, name: &str) -> Result<Option<Rc<FileRecord>>> {
        for entry in self.dir_entry_list(dir)? {
            if self.names_match(&entry.name, name) {
                return self.follow_reference(entry.reference).map(Some);
            }
        }
        Ok(None)
    }

    /// Walk `file_path` from the root record; the `:stream` suffix must
    /// already be split off.
    fn resolve_record(&self, file_path: &str) -> Result<Rc<FileRecord>> {
        let mut current = self.read_record(well_known::ROOT)?;
        for component in path::split(file_path)? {
            if !current.is_directory() {
                return Err(Error::Fs(FsError::NotADirectory));
            }
            current = self
                .lookup_child(&current, component)?
                .ok_or(Error::Fs(FsError::NotFound))?;
        }
        Ok(current)
    }

    /// Split the `:stream` suffix off the final path component.
    fn split_stream(file_path: &str) -> Result<(&str, &str)> {
        let component_start = file_path.rfind('\\').map_or(0, |at| at + 1);
        match file_path[component_start..].find(':') {
            Some(at) => {
                let colon = component_start + at;
                let stream = &file_path[colon + 1..];
                if stream.is_empty() || stream.contains(':') {
                    return Err(Error::Fs(FsError::InvalidPath));
                }
                Ok((&file_path[..colon], stream))
            }
            None => Ok((file_path, "")),
        }
    }

    fn standard_information(&self, record: &FileRecord) -> Result<StandardInformation> {
        let attribute = record
            .attribute(AttributeType::StandardInformation, "")
            .ok_or(Error::Fs(FsError::Corrupt))?;
        let AttributeContent::Resident(value) = &attribute.content else {
            error!("$STANDARD_INFORMATION shall be resident");
            return Err(Error::Fs(FsError::Corrupt));
        };
        StandardInformation::parse(value)
    }

    fn map_attributes(&self, record: &FileRecord) -> Result<FileAttributes> {
        let info = self.standard_information(record)?;
        let mut attributes = FileAttributes::from_bits((info.file_attributes & 0x27) as u8);
        if record.is_directory() {
            attributes = attributes | FileAttributes::DIRECTORY;
        }
        Ok(attributes)
    }

    /// The `(start, length)` cluster extents of a file's data stream, sparse
    /// runs omitted.
    pub fn path_to_clusters(&self, file_path: &str) -> Result<Vec<(u64, u64)>> {
        let (plain, stream) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        let data = record
            .attribute(AttributeType::Data, stream)
            .ok_or(Error::Fs(FsError::NotFound))?;
        Ok(data
            .runs()
            .iter()
            .filter_map(|extent| extent.lcn.map(|lcn| (lcn, extent.length)))
            .collect())
    }

    /// Security identifier referenced by a file's standard information.
    pub fn security_id_of(&self, file_path: &str) -> Result<u32> {
        let (plain, _) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        Ok(self.standard_information(&record)?.security_id)
    }

    /// Raw security descriptor stored under `id` in `$Secure:$SDS`, if any.
    pub fn security_descriptor(&self, id: u32) -> Result<Option<Vec<u8>>> {
        let secure = self.read_record(well_known::SECURE)?;
        let Some(sds) = secure.attribute(AttributeType::Data, "$SDS") else {
            return Ok(None);
        };
        let bytes = self.attribute_bytes(sds)?;
        let mut offset = 0usize;
        while offset + 20 <= bytes.len() {
            let entry_id = u32::from_le_bytes([
                bytes[offset + 4],
                bytes[offset + 5],
                bytes[offset + 6],
                bytes[offset + 7],
            ]);
            let length = u32::from_le_bytes([
                bytes[offset + 16],
                bytes[offset + 17],
                bytes[offset + 18],
                bytes[offset + 19],
            ]) as usize;
            if length < 20 || offset + length > bytes.len() {
                offset += 16;
                continue;
            }
            if entry_id == id {
                return Ok(Some(bytes[offset + 20..offset + length].to_vec()));
            }
            offset = (offset + length).next_multiple_of(16);
        }
        Ok(None)
    }

    /// Whether `$Bitmap` marks the cluster allocated.
    pub fn is_cluster_allocated(&self, lcn: u64) -> Result<bool> {
        let bitmap = self.cluster_bitmap()?;
        let byte = (lcn / 8) as usize;
        Ok(byte < bitmap.len() && bitmap[byte] & (1 << (lcn % 8)) != 0)
    }

    fn cluster_bitmap(&self) -> Result<Rc<Vec<u8>>> {
        if let Some(bitmap) = &self.state.borrow().bitmap {
            return Ok(bitmap.clone());
        }
        let record = self.read_record(well_known::BITMAP)?;
        let data = record
            .attribute(AttributeType::Data, "")
            .ok_or(Error::Fs(FsError::Corrupt))?;
        let bitmap = Rc::new(self.attribute_bytes(data)?);
        self.state.borrow_mut().bitmap = Some(bitmap.clone());
        Ok(bitmap)
    }

    fn info_for(&self, record: &FileRecord, name: &str) -> Result<EntryInfo> {
        let info = self.standard_information(record)?;
        let length = record
            .attribute(AttributeType::Data, "")
            .map_or(0, |data| data.length());
        Ok(EntryInfo {
            name: name.to_string(),
            attributes: self.map_attributes(record)?,
            length,
            created: time::from_ntfs(info.created),
            accessed: time::from_ntfs(info.accessed),
            written: time::from_ntfs(info.modified),
        })
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
        let record = self.resolve_record(dir_path)?;
        if !record.is_directory() {
            return Err(Error::Fs(FsError::NotADirectory));
        }
        for entry in self.dir_entry_list(&record)? {
            if entry.namespace == attr::NAMESPACE_DOS {
                continue;
            }
            if entry.name.starts_with('$') && (entry.reference & 0xFFFF_FFFF_FFFF) < 24 {
                // Metadata files stay out of listings.
                continue;
            }
            let full = path::join(dir_path, &entry.name);
            let matched = filter.map_or(true, |p| pattern::matches(p, &entry.name));
            let is_dir = entry.file_flags & index::FILE_FLAG_DIRECTORY != 0;
            if is_dir {
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
}

impl<DS: DataStorage> FileSystem for NtfsFileSystem<DS> {
    fn friendly_name(&self) -> &'static str {
        "NTFS"
    }

    fn can_write(&self) -> bool {
        false
    }

    fn time_zone(&self) -> TimeZone {
        self.options.time_zone
    }

    fn volume_label(&self) -> Result<String> {
        let volume = self.read_record(well_known::VOLUME)?;
        let Some(name) = volume.attribute(AttributeType::VolumeName, "") else {
            return Ok(String::new());
        };
        let bytes = self.attribute_bytes(name)?;
        let units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
        Ok(char::decode_utf16(units)
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }

    fn file_exists(&self, file_path: &str) -> Result<bool> {
        let (plain, stream) = Self::split_stream(file_path)?;
        match self.resolve_record(plain) {
            Ok(record) => Ok(!record.is_directory()
                && record.attribute(AttributeType::Data, stream).is_some()),
            Err(Error::Fs(FsError::NotFound | FsError::NotADirectory)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn dir_exists(&self, dir_path: &str) -> Result<bool> {
        match self.resolve_record(dir_path) {
            Ok(record) => Ok(record.is_directory()),
            Err(Error::Fs(FsError::NotFound | FsError::NotADirectory)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn attributes(&self, file_path: &str) -> Result<FileAttributes> {
        let (plain, _) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        self.map_attributes(&record)
    }

    fn set_attributes(&self, _file_path: &str, _attributes: FileAttributes) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn creation_time_utc(&self, file_path: &str) -> Result<Timestamp> {
        let (plain, _) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        Ok(time::from_ntfs(self.standard_information(&record)?.created))
    }

    fn set_creation_time_utc(&self, _file_path: &str, _at: Timestamp) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn last_access_time_utc(&self, file_path: &str) -> Result<Timestamp> {
        let (plain, _) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        Ok(time::from_ntfs(self.standard_information(&record)?.accessed))
    }

    fn set_last_access_time_utc(&self, _file_path: &str, _at: Timestamp) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn last_write_time_utc(&self, file_path: &str) -> Result<Timestamp> {
        let (plain, _) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        Ok(time::from_ntfs(self.standard_information(&record)?.modified))
    }

    fn set_last_write_time_utc(&self, _file_path: &str, _at: Timestamp) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn file_length(&self, file_path: &str) -> Result<u64> {
        let (plain, stream) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        if record.is_directory() && stream.is_empty() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        let data = record
            .attribute(AttributeType::Data, stream)
            .ok_or(Error::Fs(FsError::NotFound))?;
        Ok(data.length())
    }

    fn open_file<'a>(
        &'a self,
        file_path: &str,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<Box<dyn FileStream + 'a>> {
        if mode != FileMode::Open || access != FileAccess::Read {
            return Err(Error::Fs(FsError::Unsupported));
        }
        let (plain, stream) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        if record.is_directory() && stream.is_empty() {
            return Err(Error::Fs(FsError::IsADirectory));
        }
        let data = record
            .attribute(AttributeType::Data, stream)
            .ok_or(Error::Fs(FsError::NotFound))?;
        let content = match &data.content {
            AttributeContent::Resident(value) => FileContent::Resident(value.clone()),
            AttributeContent::NonResident {
                real_size,
                initialized_size,
                runs,
                ..
            } => FileContent::NonResident {
                real_size: *real_size,
                initialized_size: *initialized_size,
                runs: runs.clone(),
            },
        };
        Ok(Box::new(NtfsFile::new(self, content)))
    }

    fn create_dir(&self, _dir_path: &str) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn delete_file(&self, _file_path: &str) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn delete_dir(&self, _dir_path: &str) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn copy_file(&self, _from: &str, _to: &str, _overwrite: bool) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn move_file(&self, _from: &str, _to: &str, _overwrite: bool) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
    }

    fn move_dir(&self, _from: &str, _to: &str) -> Result<()> {
        Err(Error::Fs(FsError::Unsupported))
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
        let (plain, _) = Self::split_stream(file_path)?;
        let record = self.resolve_record(plain)?;
        let name = path::split(plain)?
            .last()
            .map_or(String::new(), |component| component.to_string());
        self.info_for(&record, &name)
    }
}
