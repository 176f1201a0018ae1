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

//! MFT file records: the multi-sector header, update sequence array fixup,
//! and the attribute list each record carries.

use log::error;
use opal_fs::{Error, FsError, Result};
use zerocopy::{
    little_endian::{U16, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use crate::attr::{parse_attributes, Attribute, AttributeType};

pub(crate) const FILE_SIGNATURE: [u8; 4] = *b"FILE";
pub(crate) const INDEX_SIGNATURE: [u8; 4] = *b"INDX";

/// Update-sequence stride; fixups protect each 512-byte slice regardless of
/// the physical sector size.
const USA_STRIDE: usize = 512;

pub(crate) const FLAG_IN_USE: u16 = 0x0001;
pub(crate) const FLAG_DIRECTORY: u16 = 0x0002;

/// Well-known MFT records.
pub(crate) mod well_known {
    pub const MFT: u64 = 0;
    pub const VOLUME: u64 = 3;
    pub const ROOT: u64 = 5;
    pub const BITMAP: u64 = 6;
    pub const SECURE: u64 = 9;
    pub const UPCASE: u64 = 10;
}

/// Header shared by every multi-sector structure ("FILE", "INDX"): the
/// signature plus the location and size of the update sequence array.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct MultiSectorHeader {
    pub signature: [u8; 4],
    pub usa_offset: U16,
    /// Count of u16 entries including the sequence number itself.
    pub usa_count: U16,
}

/// Verify and strip the update sequence array in place: the final two bytes
/// of every 512-byte slice must equal the sequence number and are replaced
/// by the saved values. A mismatched tail means a torn write and the record
/// is rejected.
pub(crate) fn apply_fixups(buffer: &mut [u8], expected: &[u8; 4]) -> Result<()> {
    let header = MultiSectorHeader::read_from_prefix(buffer)
        .map_err(|_| Error::Fs(FsError::Corrupt))?
        .0;
    if header.signature != *expected {
        error!(
            "Multi-sector signature {:?} shall be {:?}",
            header.signature, expected
        );
        return Err(Error::Fs(FsError::Corrupt));
    }
    let usa_offset = header.usa_offset.get() as usize;
    let usa_count = header.usa_count.get() as usize;
    if usa_count < 2
        || usa_count - 1 != buffer.len() / USA_STRIDE
        || usa_offset + usa_count * 2 > USA_STRIDE - 2
    {
        error!("Update sequence array shall cover every 512-byte slice of the record");
        return Err(Error::Fs(FsError::Corrupt));
    }
    let sequence = [buffer[usa_offset], buffer[usa_offset + 1]];
    for slice in 1..usa_count {
        let tail = slice * USA_STRIDE - 2;
        if buffer[tail..tail + 2] != sequence {
            error!("Update sequence tail of slice {slice} shall match the sequence number");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let saved = usa_offset + slice * 2;
        buffer[tail] = buffer[saved];
        buffer[tail + 1] = buffer[saved + 1];
    }
    Ok(())
}

/// Tagged address of an MFT record: 48-bit index plus the sequence number
/// the record had when the reference was made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MftReference(pub u64);

impl MftReference {
    pub fn index(self) -> u64 {
        self.0 & 0x0000_FFFF_FFFF_FFFF
    }

    pub fn sequence(self) -> u16 {
        (self.0 >> 48) as u16
    }
}

/// Fixed part of a file record, after the multi-sector header.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct FileRecordHeader {
    pub multi_sector: MultiSectorHeader,
    pub log_sequence: U64,
    /// Incremented each time the record is freed; references carrying an
    /// older value are stale.
    pub sequence: U16,
    pub hard_link_count: U16,
    pub first_attribute_offset: U16,
    pub flags: U16,
    pub used_size: U32,
    pub allocated_size: U32,
    pub base_reference: U64,
    pub next_attribute_id: U16,
}

/// One parsed MFT record.
pub(crate) struct FileRecord {
    pub index: u64,
    pub sequence: u16,
    pub flags: u16,
    pub hard_link_count: u16,
    pub base_reference: u64,
    pub attributes: Vec<Attribute>,
}

impl FileRecord {
    /// Strip the USA and parse the attribute list. `buffer` is the raw
    /// record as read from the MFT stream.
    pub fn parse(index: u64, buffer: &mut [u8]) -> Result<Self> {
        apply_fixups(buffer, &FILE_SIGNATURE)?;
        let header = FileRecordHeader::read_from_prefix(buffer)
            .map_err(|_| Error::Fs(FsError::Corrupt))?
            .0;
        let used = header.used_size.get() as usize;
        if used > buffer.len() {
            error!("Used size ({used}) shall not exceed the record size ({})", buffer.len());
            return Err(Error::Fs(FsError::Corrupt));
        }
        let attributes = parse_attributes(
            &buffer[..used],
            header.first_attribute_offset.get() as usize,
        )?;
        Ok(Self {
            index,
            sequence: header.sequence.get(),
            flags: header.flags.get(),
            hard_link_count: header.hard_link_count.get(),
            base_reference: header.base_reference.get(),
            attributes,
        })
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & FLAG_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// Look up by the `(type, name)` composite key; the default data stream
    /// has the empty name.
    pub fn attribute(&self, type_code: AttributeType, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.type_code == type_code && attribute.name == name)
    }

    pub fn attributes_of(&self, type_code: AttributeType) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(move |attribute| attribute.type_code == type_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_usa(slices: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; slices * USA_STRIDE];
        buffer[..4].copy_from_slice(b"FILE");
        let usa_offset = 0x30u16;
        let usa_count = (slices + 1) as u16;
        buffer[4..6].copy_from_slice(&usa_offset.to_le_bytes());
        buffer[6..8].copy_from_slice(&usa_count.to_le_bytes());
        // Sequence number 0xBEEF, saved tails 0x1122, 0x3344, ...
        buffer[0x30..0x32].copy_from_slice(&0xBEEFu16.to_le_bytes());
        for slice in 1..=slices {
            let saved = (0x1122u16).wrapping_mul(slice as u16);
            buffer[0x30 + slice * 2..0x32 + slice * 2].copy_from_slice(&saved.to_le_bytes());
            buffer[slice * USA_STRIDE - 2..slice * USA_STRIDE]
                .copy_from_slice(&0xBEEFu16.to_le_bytes());
        }
        buffer
    }

    #[test]
    fn fixups_restore_tails() {
        let mut buffer = record_with_usa(2);
        apply_fixups(&mut buffer, b"FILE").unwrap();
        assert_eq!(&buffer[510..512], &0x1122u16.to_le_bytes());
        assert_eq!(&buffer[1022..1024], &0x2244u16.to_le_bytes());
    }

    #[test]
    fn mismatched_tail_is_corrupt() {
        let mut buffer = record_with_usa(2);
        buffer[510] ^= 0xFF;
        assert!(matches!(
            apply_fixups(&mut buffer, b"FILE"),
            Err(Error::Fs(FsError::Corrupt))
        ));
    }

    #[test]
    fn wrong_signature_is_corrupt() {
        let mut buffer = record_with_usa(2);
        buffer[..4].copy_from_slice(b"BAAD");
        assert!(apply_fixups(&mut buffer, b"FILE").is_err());
    }

    #[test]
    fn reference_split() {
        let reference = MftReference(0x0003_0000_0000_0005);
        assert_eq!(reference.index(), 5);
        assert_eq!(reference.sequence(), 3);
    }
}
