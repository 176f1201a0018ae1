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

//! Attribute records: a tagged union over the known type codes, resident or
//! non-resident, with data runs decoded into extent lists.

use log::error;
use opal_fs::{Error, FsError, Result};
use zerocopy::{
    little_endian::{U16, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

/// Terminator of the attribute sequence in a file record.
const END_MARKER: u32 = 0xFFFF_FFFF;

/// The known attribute type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AttributeType {
    StandardInformation,
    AttributeList,
    FileName,
    ObjectId,
    SecurityDescriptor,
    VolumeName,
    VolumeInformation,
    Data,
    IndexRoot,
    IndexAllocation,
    Bitmap,
    ReparsePoint,
    EaInformation,
    Ea,
    PropertySet,
    LoggedUtilityStream,
    /// Codes this implementation has no structural knowledge of.
    Unknown(u32),
}

impl AttributeType {
    pub fn from_code(code: u32) -> Self {
        match code {
            0x10 => AttributeType::StandardInformation,
            0x20 => AttributeType::AttributeList,
            0x30 => AttributeType::FileName,
            0x40 => AttributeType::ObjectId,
            0x50 => AttributeType::SecurityDescriptor,
            0x60 => AttributeType::VolumeName,
            0x70 => AttributeType::VolumeInformation,
            0x80 => AttributeType::Data,
            0x90 => AttributeType::IndexRoot,
            0xA0 => AttributeType::IndexAllocation,
            0xB0 => AttributeType::Bitmap,
            0xC0 => AttributeType::ReparsePoint,
            0xD0 => AttributeType::EaInformation,
            0xE0 => AttributeType::Ea,
            0xF0 => AttributeType::PropertySet,
            0x100 => AttributeType::LoggedUtilityStream,
            other => AttributeType::Unknown(other),
        }
    }
}

/// Common head of every attribute record.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct AttributeHeader {
    type_code: U32,
    /// Total record length, rounded to the next quadword.
    record_length: U32,
    /// 0 resident, 1 non-resident.
    form_code: u8,
    name_length: u8,
    name_offset: U16,
    flags: U16,
    instance: U16,
}

/// Resident tail: the content is inlined in the record.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct ResidentHeader {
    value_length: U32,
    value_offset: U16,
    indexed: u8,
    reserved: u8,
}

/// Non-resident tail: the content lives in the clusters the mapping pairs
/// describe.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct NonResidentHeader {
    lowest_vcn: U64,
    highest_vcn: U64,
    mapping_pairs_offset: U16,
    compression_unit: U16,
    reserved: [u8; 4],
    allocated_size: U64,
    real_size: U64,
    initialized_size: U64,
}

/// One contiguous extent of a non-resident attribute. `lcn` of `None` marks
/// a sparse run with no backing clusters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Extent {
    pub vcn: u64,
    pub length: u64,
    pub lcn: Option<u64>,
}

pub(crate) enum AttributeContent {
    Resident(Vec<u8>),
    NonResident {
        real_size: u64,
        allocated_size: u64,
        initialized_size: u64,
        runs: Vec<Extent>,
    },
}

pub(crate) struct Attribute {
    pub type_code: AttributeType,
    pub name: String,
    pub content: AttributeContent,
}

impl Attribute {
    pub fn length(&self) -> u64 {
        match &self.content {
            AttributeContent::Resident(value) => value.len() as u64,
            AttributeContent::NonResident { real_size, .. } => *real_size,
        }
    }

    pub fn runs(&self) -> &[Extent] {
        match &self.content {
            AttributeContent::Resident(_) => &[],
            AttributeContent::NonResident { runs, .. } => runs,
        }
    }
}

/// Iterate the attribute records of one file record, stopping at the
/// 0xFFFFFFFF terminator. Type codes may repeat (one attribute per named
/// stream).
pub(crate) fn parse_attributes(buffer: &[u8], mut offset: usize) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();
    loop {
        if offset + 4 > buffer.len() {
            error!("Attribute sequence shall end with a terminator inside the record");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let code = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]);
        if code == END_MARKER {
            return Ok(attributes);
        }
        let header = AttributeHeader::read_from_prefix(&buffer[offset..])
            .map_err(|_| Error::Fs(FsError::Corrupt))?
            .0;
        let record_length = header.record_length.get() as usize;
        if record_length < size_of::<AttributeHeader>()
            || record_length % 8 != 0
            || offset + record_length > buffer.len()
        {
            error!("Attribute record length ({record_length}) shall be quadword-aligned and in bounds");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let record = &buffer[offset..offset + record_length];

        let name_offset = header.name_offset.get() as usize;
        let name_length = header.name_length as usize;
        let name = if name_length == 0 {
            String::new()
        } else {
            if name_offset + name_length * 2 > record.len() {
                return Err(Error::Fs(FsError::Corrupt));
            }
            let units = record[name_offset..name_offset + name_length * 2]
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        };

        let tail = &record[size_of::<AttributeHeader>()..];
        let content = if header.form_code == 0 {
            let resident = ResidentHeader::read_from_prefix(tail)
                .map_err(|_| Error::Fs(FsError::Corrupt))?
                .0;
            let from = resident.value_offset.get() as usize;
            let to = from + resident.value_length.get() as usize;
            if to > record.len() {
                return Err(Error::Fs(FsError::Corrupt));
            }
            AttributeContent::Resident(record[from..to].to_vec())
        } else {
            let non_resident = NonResidentHeader::read_from_prefix(tail)
                .map_err(|_| Error::Fs(FsError::Corrupt))?
                .0;
            let from = non_resident.mapping_pairs_offset.get() as usize;
            if from > record.len() {
                return Err(Error::Fs(FsError::Corrupt));
            }
            let runs = decode_data_runs(&record[from..], non_resident.lowest_vcn.get())?;
            AttributeContent::NonResident {
                real_size: non_resident.real_size.get(),
                allocated_size: non_resident.allocated_size.get(),
                initialized_size: non_resident.initialized_size.get(),
                runs,
            }
        };

        attributes.push(Attribute {
            type_code: AttributeType::from_code(code),
            name,
            content,
        });
        offset += record_length;
    }
}

/// Decode the mapping pairs: each pair is a header byte whose low nibble is
/// the byte count of the run length and whose high nibble is the byte count
/// of the signed cluster delta, zero meaning a sparse run.
pub(crate) fn decode_data_runs(bytes: &[u8], starting_vcn: u64) -> Result<Vec<Extent>> {
    let mut runs = Vec::new();
    let mut vcn = starting_vcn;
    let mut lcn: i64 = 0;
    let mut cursor = 0;
    while cursor < bytes.len() {
        let header = bytes[cursor];
        cursor += 1;
        if header == 0 {
            break;
        }
        let length_size = (header & 0x0F) as usize;
        let offset_size = (header >> 4) as usize;
        if length_size == 0 || length_size > 8 || offset_size > 8 {
            error!("Data run header ({header:#04x}) shall carry 1-8 length bytes and 0-8 offset bytes");
            return Err(Error::Fs(FsError::Corrupt));
        }
        if cursor + length_size + offset_size > bytes.len() {
            error!("Data run shall not extend past the mapping pairs area");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let mut length: u64 = 0;
        for i in (0..length_size).rev() {
            length = length << 8 | bytes[cursor + i] as u64;
        }
        cursor += length_size;
        if length == 0 {
            error!("Data run length shall not be 0");
            return Err(Error::Fs(FsError::Corrupt));
        }
        if offset_size == 0 {
            runs.push(Extent {
                vcn,
                length,
                lcn: None,
            });
        } else {
            let mut delta: i64 = 0;
            for i in (0..offset_size).rev() {
                delta = delta << 8 | bytes[cursor + i] as i64;
            }
            // Sign-extend from the stored width.
            let shift = 64 - offset_size * 8;
            delta = delta << shift >> shift;
            cursor += offset_size;
            lcn += delta;
            if lcn < 0 {
                error!("Data run shall not point below cluster 0");
                return Err(Error::Fs(FsError::Corrupt));
            }
            runs.push(Extent {
                vcn,
                length,
                lcn: Some(lcn as u64),
            });
        }
        vcn += length;
    }
    Ok(runs)
}

/// `$STANDARD_INFORMATION` content (NTFS 3.0 form; the 1.x prefix lacks the
/// last four fields).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct RawStandardInformation {
    pub creation_time: U64,
    pub modification_time: U64,
    pub mft_modification_time: U64,
    pub access_time: U64,
    pub file_attributes: U32,
    pub max_versions: U32,
    pub version: U32,
    pub class_id: U32,
    pub owner_id: U32,
    pub security_id: U32,
    pub quota_charged: U64,
    pub usn: U64,
}

pub(crate) struct StandardInformation {
    pub created: u64,
    pub modified: u64,
    pub accessed: u64,
    pub file_attributes: u32,
    pub security_id: u32,
}

impl StandardInformation {
    pub fn parse(value: &[u8]) -> Result<Self> {
        if value.len() >= size_of::<RawStandardInformation>() {
            let raw = RawStandardInformation::read_from_prefix(value)
                .map_err(|_| Error::Fs(FsError::Corrupt))?
                .0;
            return Ok(Self {
                created: raw.creation_time.get(),
                modified: raw.modification_time.get(),
                accessed: raw.access_time.get(),
                file_attributes: raw.file_attributes.get(),
                security_id: raw.security_id.get(),
            });
        }
        // NTFS 1.x short form: times and flags only.
        if value.len() < 48 {
            error!("Standard information shall be at least 48 bytes");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let read_u64 = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&value[at..at + 8]);
            u64::from_le_bytes(bytes)
        };
        let mut flag_bytes = [0u8; 4];
        flag_bytes.copy_from_slice(&value[32..36]);
        Ok(Self {
            created: read_u64(0),
            modified: read_u64(8),
            accessed: read_u64(24),
            file_attributes: u32::from_le_bytes(flag_bytes),
            security_id: 0,
        })
    }
}

/// `$FILE_NAME` content; used both in records and as index keys.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct RawFileName {
    pub parent_reference: U64,
    pub creation_time: U64,
    pub modification_time: U64,
    pub mft_modification_time: U64,
    pub access_time: U64,
    pub allocated_size: U64,
    pub real_size: U64,
    pub flags: U32,
    pub reparse_tag: U32,
    pub name_length: u8,
    /// 0 POSIX, 1 Win32, 2 DOS, 3 Win32-and-DOS.
    pub namespace: u8,
}

pub(crate) const NAMESPACE_DOS: u8 = 2;

pub(crate) fn parse_file_name(value: &[u8]) -> Result<(RawFileName, String)> {
    let raw = RawFileName::read_from_prefix(value)
        .map_err(|_| Error::Fs(FsError::Corrupt))?
        .0;
    let from = size_of::<RawFileName>();
    let to = from + raw.name_length as usize * 2;
    if to > value.len() {
        error!("File name shall fit inside its attribute value");
        return Err(Error::Fs(FsError::Corrupt));
    }
    let units = value[from..to]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    let name = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    Ok((raw, name))
}
