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

//! One directory as an ordered array of 32-byte slots: short entries, the
//! long-file-name groups preceding them, and the free/deleted gaps in
//! between.

use log::error;
use opal_fs::{time, Error, FileAttributes, FsError, OemTable, Result, TimeZone, Timestamp};
use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use crate::boot_sector::DIR_ENTRY_SIZE;
use crate::table::Cluster;

pub(crate) const ATTR_LFN: u8 = 0x0F;
pub(crate) const SLOT_END: u8 = 0x00;
pub(crate) const SLOT_DELETED: u8 = 0xE5;
/// Ordinal flag on the first stored slot of a long-name group.
pub(crate) const LFN_LAST: u8 = 0x40;
/// UTF-16 code units carried per long-name slot.
pub(crate) const LFN_CHARS: usize = 13;

/// Short (8.3) directory entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct RawDirEntry {
    /// Space-padded 8.3 name; 0x00 in the first byte ends the directory,
    /// 0xE5 marks the slot deleted.
    pub name: [u8; 11],
    pub attributes: u8,
    pub nt_reserved: u8,
    /// Tenths of a second refining the 2-second creation time, 0..=199.
    pub creation_time_tenths: u8,
    pub creation_time: U16,
    pub creation_date: U16,
    pub access_date: U16,
    /// High word of the first cluster; only meaningful on FAT32.
    pub first_cluster_high: U16,
    pub write_time: U16,
    pub write_date: U16,
    pub first_cluster_low: U16,
    pub file_size: U32,
}

impl RawDirEntry {
    pub fn first_cluster(&self) -> Cluster {
        self.first_cluster_low.get() as u32 | (self.first_cluster_high.get() as u32) << 16
    }

    pub fn set_first_cluster(&mut self, cluster: Cluster) {
        self.first_cluster_low.set(cluster as u16);
        self.first_cluster_high.set((cluster >> 16) as u16);
    }
}

/// Long-file-name slot; attribute byte is always 0x0F.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct RawLfnEntry {
    pub ordinal: u8,
    pub name1: [U16; 5],
    pub attributes: u8,
    pub entry_kind: u8,
    /// Rotate-right sum of the 11 short-name bytes this group belongs to.
    pub checksum: u8,
    pub name2: [U16; 6],
    pub first_cluster: U16,
    pub name3: [U16; 2],
}

impl RawLfnEntry {
    fn units(&self) -> [u16; LFN_CHARS] {
        let mut units = [0u16; LFN_CHARS];
        for (target, source) in units.iter_mut().zip(
            self.name1
                .iter()
                .chain(self.name2.iter())
                .chain(self.name3.iter()),
        ) {
            *target = source.get();
        }
        units
    }

    fn with_units(ordinal: u8, checksum: u8, units: &[u16; LFN_CHARS]) -> Self {
        let mut entry = Self {
            ordinal,
            attributes: ATTR_LFN,
            checksum,
            ..Self::default()
        };
        for (target, source) in entry
            .name1
            .iter_mut()
            .chain(entry.name2.iter_mut())
            .chain(entry.name3.iter_mut())
            .zip(units.iter())
        {
            target.set(*source);
        }
        entry
    }
}

/// The 8-bit rotate-right checksum binding a long-name group to its short
/// entry.
pub(crate) fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, &byte| sum.rotate_right(1).wrapping_add(byte))
}

/// Decoded form of one directory entry.
#[derive(Clone, Debug)]
pub(crate) struct DirEntryData {
    pub short_name: [u8; 11],
    pub display_name: String,
    pub attributes: FileAttributes,
    pub created: Timestamp,
    /// Date resolution only.
    pub accessed: Timestamp,
    pub written: Timestamp,
    pub first_cluster: Cluster,
    pub size: u32,
}

impl DirEntryData {
    pub fn from_raw(
        raw: &RawDirEntry,
        long_name: Option<String>,
        oem: &OemTable,
        zone: TimeZone,
    ) -> Self {
        let display_name = long_name.unwrap_or_else(|| short_display(&raw.name, oem));
        Self {
            short_name: raw.name,
            display_name,
            attributes: FileAttributes::from_bits(raw.attributes),
            created: time::from_dos(
                raw.creation_date.get(),
                raw.creation_time.get(),
                raw.creation_time_tenths,
            )
            .to_utc(zone),
            accessed: time::from_dos(raw.access_date.get(), 0, 0).to_utc(zone),
            written: time::from_dos(raw.write_date.get(), raw.write_time.get(), 0).to_utc(zone),
            first_cluster: raw.first_cluster(),
            size: raw.file_size.get(),
        }
    }

    pub fn to_raw(&self, zone: TimeZone) -> RawDirEntry {
        let (creation_date, creation_time, tenths) = time::to_dos(self.created.to_local(zone));
        let (access_date, _, _) = time::to_dos(self.accessed.to_local(zone));
        let (write_date, write_time, _) = time::to_dos(self.written.to_local(zone));
        let mut raw = RawDirEntry {
            name: self.short_name,
            attributes: self.attributes.bits(),
            creation_time_tenths: tenths,
            ..RawDirEntry::default()
        };
        raw.creation_time.set(creation_time);
        raw.creation_date.set(creation_date);
        raw.access_date.set(access_date);
        raw.write_time.set(write_time);
        raw.write_date.set(write_date);
        raw.file_size.set(self.size);
        raw.set_first_cluster(self.first_cluster);
        raw
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }
}

/// Display form of a short name: trimmed base and extension joined by a dot.
pub(crate) fn short_display(name: &[u8; 11], oem: &OemTable) -> String {
    let decode = |bytes: &[u8]| -> String {
        bytes
            .iter()
            .rev()
            .skip_while(|&&byte| byte == b' ')
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|&byte| oem.decode_byte(byte))
            .collect()
    };
    let base = decode(&name[..8]);
    let extension = decode(&name[8..]);
    if extension.is_empty() {
        base
    } else {
        format!("{base}.{extension}")
    }
}

fn fold(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn names_equal(a: &str, b: &str) -> bool {
    a.chars().map(fold).eq(b.chars().map(fold))
}

/// Where a directory's slots live on the volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DirLocation {
    /// The fixed root region of a FAT12/16 volume; cannot grow.
    RootRegion,
    /// A regular cluster chain starting at the given cluster.
    Chain(Cluster),
}

pub(crate) struct Directory {
    pub location: DirLocation,
    slots: Vec<[u8; DIR_ENTRY_SIZE]>,
    pub dirty: bool,
}

impl Directory {
    pub fn from_bytes(location: DirLocation, bytes: &[u8]) -> Self {
        let slots = bytes
            .chunks_exact(DIR_ENTRY_SIZE)
            .map(|chunk| {
                let mut slot = [0u8; DIR_ENTRY_SIZE];
                slot.copy_from_slice(chunk);
                slot
            })
            .collect();
        Self {
            location,
            slots,
            dirty: false,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.slots.concat()
    }

    /// Append zeroed slots after a cluster-chain extension.
    pub fn grow(&mut self, slots: usize) {
        self.slots.resize(self.slots.len() + slots, [0; DIR_ENTRY_SIZE]);
        self.dirty = true;
    }

    fn raw_at(&self, id: usize) -> Result<RawDirEntry> {
        let slot = self.slots.get(id).ok_or(Error::Fs(FsError::Corrupt))?;
        RawDirEntry::read_from_bytes(slot).map_err(|_| Error::Fs(FsError::Corrupt))
    }

    fn write_slot(&mut self, id: usize, bytes: &[u8]) {
        self.slots[id].copy_from_slice(bytes);
        self.dirty = true;
    }

    /// All live entries in slot order, long names assembled and verified
    /// against their group checksum.
    pub fn entries(&self, oem: &OemTable, zone: TimeZone) -> Vec<(usize, DirEntryData)> {
        let mut entries = Vec::new();
        let mut pending: Vec<RawLfnEntry> = Vec::new();
        for (id, slot) in self.slots.iter().enumerate() {
            match slot[0] {
                SLOT_END => break,
                SLOT_DELETED => {
                    pending.clear();
                    continue;
                }
                _ => {}
            }
            if slot[11] == ATTR_LFN {
                if let Ok(lfn) = RawLfnEntry::read_from_bytes(slot) {
                    pending.push(lfn);
                }
                continue;
            }
            let Ok(raw) = self.raw_at(id) else {
                continue;
            };
            if raw.attributes & FileAttributes::VOLUME_LABEL.bits() != 0 {
                pending.clear();
                continue;
            }
            let long_name = assemble_long_name(&pending, lfn_checksum(&raw.name));
            pending.clear();
            entries.push((id, DirEntryData::from_raw(&raw, long_name, oem, zone)));
        }
        entries
    }

    pub fn find(&self, name: &str, oem: &OemTable, zone: TimeZone) -> Option<(usize, DirEntryData)> {
        self.entries(oem, zone).into_iter().find(|(_, data)| {
            names_equal(&data.display_name, name)
                || names_equal(&short_display(&data.short_name, oem), name)
        })
    }

    pub fn entry(&self, id: usize, oem: &OemTable, zone: TimeZone) -> Result<DirEntryData> {
        self.entries(oem, zone)
            .into_iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, data)| data)
            .ok_or(Error::Fs(FsError::NotFound))
    }

    /// Register an entry in the first run of reusable slots large enough for
    /// its long-name group. `NoSpace` means the caller must grow the
    /// directory first (impossible for the fixed root region).
    pub fn add(&mut self, data: &DirEntryData, oem: &OemTable, zone: TimeZone) -> Result<usize> {
        let needs_long_name = data.display_name != short_display(&data.short_name, oem);
        let units: Vec<u16> = data.display_name.encode_utf16().collect();
        let group_slots = if needs_long_name {
            units.len().div_ceil(LFN_CHARS)
        } else {
            0
        };
        let needed = group_slots + 1;

        let end = self
            .slots
            .iter()
            .position(|slot| slot[0] == SLOT_END)
            .unwrap_or(self.slots.len());
        let reusable =
            |id: usize| id >= end || self.slots[id][0] == SLOT_DELETED;
        let mut start = None;
        let mut run = 0;
        for id in 0..self.slots.len() {
            if reusable(id) {
                run += 1;
                if run == needed {
                    start = Some(id + 1 - needed);
                    break;
                }
            } else {
                run = 0;
            }
        }
        let Some(start) = start else {
            return Err(Error::Fs(FsError::NoSpace));
        };

        if needs_long_name {
            let checksum = lfn_checksum(&data.short_name);
            for slot in 0..group_slots {
                // Highest ordinal first, flagged as last-in-group.
                let ordinal_index = group_slots - 1 - slot;
                let mut ordinal = (ordinal_index + 1) as u8;
                if ordinal_index == group_slots - 1 {
                    ordinal |= LFN_LAST;
                }
                let mut chunk = [0xFFFFu16; LFN_CHARS];
                let from = ordinal_index * LFN_CHARS;
                let piece = &units[from..units.len().min(from + LFN_CHARS)];
                chunk[..piece.len()].copy_from_slice(piece);
                if piece.len() < LFN_CHARS {
                    chunk[piece.len()] = 0;
                }
                let entry = RawLfnEntry::with_units(ordinal, checksum, &chunk);
                self.write_slot(start + slot, entry.as_bytes());
            }
        }
        let short_id = start + group_slots;
        let raw = data.to_raw(zone);
        self.write_slot(short_id, raw.as_bytes());
        Ok(short_id)
    }

    /// Mark the short slot and its long-name group deleted.
    pub fn remove(&mut self, id: usize) -> Result<()> {
        self.raw_at(id)?;
        self.slots[id][0] = SLOT_DELETED;
        let mut previous = id;
        while previous > 0 {
            previous -= 1;
            let slot = &mut self.slots[previous];
            if slot[11] != ATTR_LFN || slot[0] == SLOT_DELETED {
                break;
            }
            slot[0] = SLOT_DELETED;
        }
        self.dirty = true;
        Ok(())
    }

    /// Overwrite an entry in place, keeping its name slots.
    pub fn update(&mut self, id: usize, data: &DirEntryData, zone: TimeZone) -> Result<()> {
        self.raw_at(id)?;
        let raw = data.to_raw(zone);
        self.write_slot(id, raw.as_bytes());
        Ok(())
    }

    /// Anything left besides the dot entries?
    pub fn is_empty(&self, oem: &OemTable, zone: TimeZone) -> bool {
        self.entries(oem, zone)
            .iter()
            .all(|(_, data)| data.display_name == "." || data.display_name == "..")
    }

    /// Every live short name, including dot entries and the volume label;
    /// used to pick an unused alias for a new entry.
    pub fn short_names(&self) -> Vec<[u8; 11]> {
        let mut names = Vec::new();
        for slot in &self.slots {
            match slot[0] {
                SLOT_END => break,
                SLOT_DELETED => continue,
                _ => {}
            }
            if slot[11] == ATTR_LFN {
                continue;
            }
            let mut name = [0u8; 11];
            name.copy_from_slice(&slot[..11]);
            names.push(name);
        }
        names
    }

    pub fn volume_label(&self) -> Option<String> {
        for slot in &self.slots {
            match slot[0] {
                SLOT_END => break,
                SLOT_DELETED => continue,
                _ => {}
            }
            if slot[11] != ATTR_LFN && slot[11] & FileAttributes::VOLUME_LABEL.bits() != 0 {
                let label: String = slot[..11]
                    .iter()
                    .map(|&byte| byte as char)
                    .collect::<String>()
                    .trim_end()
                    .to_string();
                return Some(label);
            }
        }
        None
    }

    /// Rewrite the first cluster of the ".." entry after a directory move.
    pub fn set_parent_cluster(&mut self, parent: Cluster) -> Result<()> {
        for id in 0..self.slots.len() {
            if self.slots[id][0] == SLOT_END {
                break;
            }
            let mut raw = self.raw_at(id)?;
            if raw.name == *b"..         " {
                raw.set_first_cluster(parent);
                let bytes = raw.as_bytes().to_vec();
                self.write_slot(id, &bytes);
                return Ok(());
            }
        }
        error!("Directory shall carry a dot-dot entry");
        Err(Error::Fs(FsError::Corrupt))
    }
}

fn assemble_long_name(parts: &[RawLfnEntry], expected_checksum: u8) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    // Stored in reverse ordinal order, the first flagged as last-in-group.
    if parts[0].ordinal & LFN_LAST == 0 {
        return None;
    }
    let count = (parts[0].ordinal & 0x3F) as usize;
    if count != parts.len() {
        return None;
    }
    let mut units = Vec::with_capacity(count * LFN_CHARS);
    for (index, part) in parts.iter().rev().enumerate() {
        if part.checksum != expected_checksum || (part.ordinal & 0x3F) as usize != index + 1 {
            return None;
        }
        units.extend_from_slice(&part.units());
    }
    let terminator = units
        .iter()
        .position(|&unit| unit == 0)
        .unwrap_or(units.len());
    let name: String = char::decode_utf16(units[..terminator].iter().copied())
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    Some(name)
}

/// Characters allowed in a short name besides letters and digits.
const SHORT_NAME_SPECIALS: &[u8] = b"$%'-_@~`!(){}^#&";

/// Derive an unused 8.3 name for `display`: uppercase the OEM-encodable
/// subset, strip spaces and embedded dots, and when the result is lossy or
/// oversize append `~N` with the lowest unused N.
pub(crate) fn short_name_for(
    display: &str,
    oem: &OemTable,
    taken: impl Fn(&[u8; 11]) -> bool,
) -> Result<[u8; 11]> {
    let trimmed = display.trim_start_matches('.');
    let (base_part, extension_part) = match trimmed.rfind('.') {
        Some(position) => (&trimmed[..position], &trimmed[position + 1..]),
        None => (trimmed, ""),
    };

    fn map_part(part: &str, oem: &OemTable, lossy: &mut bool) -> Vec<u8> {
        let mut bytes = Vec::new();
        for c in part.chars() {
            let upper = fold(c);
            if upper == ' ' || upper == '.' {
                *lossy = true;
                continue;
            }
            let byte = oem.encode_char(upper).unwrap_or(b'_');
            if byte.is_ascii_alphanumeric() || byte >= 0x80 || SHORT_NAME_SPECIALS.contains(&byte)
            {
                if byte == b'_' && upper != '_' {
                    *lossy = true;
                }
                bytes.push(byte);
            } else {
                *lossy = true;
                bytes.push(b'_');
            }
        }
        bytes
    }

    let mut lossy = trimmed.len() != display.len();
    let base = map_part(base_part, oem, &mut lossy);
    let mut extension = map_part(extension_part, oem, &mut lossy);
    if base.is_empty() {
        return Err(Error::Fs(FsError::InvalidName));
    }
    if extension.len() > 3 {
        extension.truncate(3);
        lossy = true;
    }
    lossy |= base.len() > 8;

    let pack = |base: &[u8], extension: &[u8]| -> [u8; 11] {
        let mut name = [b' '; 11];
        name[..base.len().min(8)].copy_from_slice(&base[..base.len().min(8)]);
        name[8..8 + extension.len()].copy_from_slice(extension);
        name
    };

    if !lossy {
        let candidate = pack(&base, &extension);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    for n in 1..1_000_000u32 {
        let tail = format!("~{n}");
        let keep = base.len().min(8 - tail.len()).min(6);
        let mut stem = base[..keep].to_vec();
        stem.extend_from_slice(tail.as_bytes());
        let candidate = pack(&stem, &extension);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::Fs(FsError::InvalidName))
}

/// The "." and ".." entries written into a fresh directory cluster. The
/// parent cluster is zero when the parent is the root.
pub(crate) fn dot_entries(
    cluster: Cluster,
    parent_cluster: Cluster,
    now: Timestamp,
    zone: TimeZone,
) -> [RawDirEntry; 2] {
    let mut template = DirEntryData {
        short_name: *b".          ",
        display_name: ".".to_string(),
        attributes: FileAttributes::DIRECTORY,
        created: now,
        accessed: now,
        written: now,
        first_cluster: cluster,
        size: 0,
    };
    let dot = template.to_raw(zone);
    template.short_name = *b"..         ";
    template.first_cluster = parent_cluster;
    let dot_dot = template.to_raw(zone);
    [dot, dot_dot]
}

/// Volume-label entry for the formatter.
pub(crate) fn volume_label_entry(label: &str, now: Timestamp, zone: TimeZone) -> RawDirEntry {
    let mut name = [b' '; 11];
    for (target, byte) in name.iter_mut().zip(label.bytes().take(11)) {
        *target = byte.to_ascii_uppercase();
    }
    let data = DirEntryData {
        short_name: name,
        display_name: String::new(),
        attributes: FileAttributes::VOLUME_LABEL,
        created: now,
        accessed: now,
        written: now,
        first_cluster: 0,
        size: 0,
    };
    data.to_raw(zone)
}
