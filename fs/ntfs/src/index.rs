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

//! Directory indexes: the B-tree rooted in `$INDEX_ROOT` and continued in
//! the fixed-size blocks of `$INDEX_ALLOCATION`, keyed by up-cased file
//! name.

use log::error;
use opal_fs::{Error, FsError, Result};
use zerocopy::{
    little_endian::{U16, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use crate::attr::parse_file_name;
use crate::record::{apply_fixups, MultiSectorHeader, INDEX_SIGNATURE};

/// Name of the file-name index of every directory.
pub(crate) const FILE_NAME_INDEX: &str = "$I30";

/// Head of the `$INDEX_ROOT` value.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct IndexRootHeader {
    /// Attribute type the index is keyed on; 0x30 for file-name indexes.
    pub indexed_type: U32,
    pub collation_rule: U32,
    /// Size of one `$INDEX_ALLOCATION` block in bytes.
    pub index_block_size: U32,
    pub clusters_per_block: u8,
    pub reserved: [u8; 3],
}

/// Node header shared by the root and every allocation block; offsets are
/// relative to this header's own start.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct IndexNodeHeader {
    pub entries_offset: U32,
    pub total_size: U32,
    pub allocated_size: U32,
    /// Bit 0: this node has children in `$INDEX_ALLOCATION`.
    pub flags: U32,
}

/// Fixed head of one index entry; the file-name key follows, and entries
/// with the subnode flag end with the child block's VCN.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct IndexEntryHeader {
    file_reference: U64,
    entry_length: U16,
    key_length: U16,
    flags: U16,
    reserved: U16,
}

/// Head of one `$INDEX_ALLOCATION` block, protected by its own update
/// sequence array.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct IndexBlockHeader {
    pub multi_sector: MultiSectorHeader,
    pub log_sequence: U64,
    pub block_vcn: U64,
}

const ENTRY_FLAG_SUBNODE: u16 = 0x01;
const ENTRY_FLAG_LAST: u16 = 0x02;

/// One decoded node entry. The last entry of a node carries no key, only an
/// optional subnode pointer.
pub(crate) struct IndexEntry {
    pub reference: u64,
    pub name: String,
    pub namespace: u8,
    /// `FILE_ATTRIBUTE_*` flags from the file-name key; bit 28 marks a
    /// directory.
    pub file_flags: u32,
    pub real_size: u64,
    pub subnode_vcn: Option<u64>,
    pub is_last: bool,
}

/// Directory bit of the file-name key flags.
pub(crate) const FILE_FLAG_DIRECTORY: u32 = 0x1000_0000;

/// Decode the entry list of one node. `node` starts at the
/// [`IndexNodeHeader`].
pub(crate) fn parse_node(node: &[u8]) -> Result<Vec<IndexEntry>> {
    let header = IndexNodeHeader::read_from_prefix(node)
        .map_err(|_| Error::Fs(FsError::Corrupt))?
        .0;
    let mut offset = header.entries_offset.get() as usize;
    let end = (header.total_size.get() as usize).min(node.len());
    let mut entries = Vec::new();
    loop {
        if offset + size_of::<IndexEntryHeader>() > end {
            error!("Index node shall end with a last-entry marker");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let entry = IndexEntryHeader::read_from_prefix(&node[offset..])
            .map_err(|_| Error::Fs(FsError::Corrupt))?
            .0;
        let length = entry.entry_length.get() as usize;
        if length < size_of::<IndexEntryHeader>() || offset + length > end {
            error!("Index entry length ({length}) shall stay inside the node");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let flags = entry.flags.get();
        let subnode_vcn = if flags & ENTRY_FLAG_SUBNODE != 0 {
            if length < size_of::<IndexEntryHeader>() + 8 {
                return Err(Error::Fs(FsError::Corrupt));
            }
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&node[offset + length - 8..offset + length]);
            Some(u64::from_le_bytes(bytes))
        } else {
            None
        };
        let is_last = flags & ENTRY_FLAG_LAST != 0;
        let (name, namespace, file_flags, real_size) = if is_last || entry.key_length.get() == 0 {
            (String::new(), 0, 0, 0)
        } else {
            let key_from = offset + size_of::<IndexEntryHeader>();
            let key_to = key_from + entry.key_length.get() as usize;
            if key_to > offset + length {
                return Err(Error::Fs(FsError::Corrupt));
            }
            let (raw, name) = parse_file_name(&node[key_from..key_to])?;
            (name, raw.namespace, raw.flags.get(), raw.real_size.get())
        };
        entries.push(IndexEntry {
            reference: entry.file_reference.get(),
            name,
            namespace,
            file_flags,
            real_size,
            subnode_vcn,
            is_last,
        });
        if is_last {
            return Ok(entries);
        }
        offset += length;
    }
}

/// Strip an `$INDEX_ALLOCATION` block's USA and return its node slice
/// (starting at the node header that follows the block header).
pub(crate) fn open_block(block: &mut [u8]) -> Result<&[u8]> {
    apply_fixups(block, &INDEX_SIGNATURE)?;
    Ok(&block[size_of::<IndexBlockHeader>()..])
}
