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

//! Writing a fresh, empty FAT volume into a stream.

use log::error;
use opal_fs::{Clock, Error, FsError, Result, SystemClock, TimeZone};
use opal_ds::DataStorage;
use zerocopy::{little_endian::U32, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::boot_sector::{
    Bpb, ExtendedBpb, Fat32Bpb, FatVariant, DIR_ENTRY_SIZE, EXTENDED_BPB_OFFSET_16,
    EXTENDED_BPB_OFFSET_32, FAT32_BPB_OFFSET, SECTOR_SIZE, SIGNATURE_OFFSET,
};
use crate::dir;
use crate::table::Fat;

/// Disk geometry as exposed through interrupt 0x13; only recorded in the
/// BPB, never used for addressing by the engine itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
}

impl Geometry {
    pub const fn new(cylinders: u32, heads: u32, sectors_per_track: u32) -> Self {
        Self {
            cylinders,
            heads,
            sectors_per_track,
        }
    }

    pub fn total_sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors_per_track as u64
    }

    /// A plausible large-disk geometry for a given capacity.
    pub fn from_capacity(total_sectors: u64) -> Self {
        let heads = 255;
        let sectors_per_track = 63;
        let cylinders = (total_sectors / (heads as u64 * sectors_per_track as u64)).max(1);
        Self {
            cylinders: cylinders.min(u32::MAX as u64) as u32,
            heads,
            sectors_per_track,
        }
    }

    /// CHS to LBA. Sectors are 1-based; anything outside the geometry,
    /// including `sector == sectors_per_track + 1`, is rejected.
    pub fn to_logical_block_address(&self, cylinder: u32, head: u32, sector: u32) -> Option<u64> {
        if cylinder >= self.cylinders
            || head >= self.heads
            || sector == 0
            || sector > self.sectors_per_track
        {
            return None;
        }
        Some(
            (cylinder as u64 * self.heads as u64 + head as u64) * self.sectors_per_track as u64
                + sector as u64
                - 1,
        )
    }
}

/// Standard FAT12 floppy presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloppyFormat {
    /// 720 KiB, 1440 sectors.
    Floppy720K,
    /// 1440 KiB, 2880 sectors.
    Floppy1440K,
    /// 2880 KiB, 5760 sectors.
    Floppy2880K,
}

impl FloppyFormat {
    fn geometry(self) -> Geometry {
        match self {
            FloppyFormat::Floppy720K => Geometry::new(80, 2, 9),
            FloppyFormat::Floppy1440K => Geometry::new(80, 2, 18),
            FloppyFormat::Floppy2880K => Geometry::new(80, 2, 36),
        }
    }

    fn media(self) -> u8 {
        match self {
            FloppyFormat::Floppy720K => 0xF9,
            FloppyFormat::Floppy1440K | FloppyFormat::Floppy2880K => 0xF0,
        }
    }

    fn sectors_per_cluster(self) -> u32 {
        match self {
            FloppyFormat::Floppy1440K => 1,
            FloppyFormat::Floppy720K | FloppyFormat::Floppy2880K => 2,
        }
    }

    fn root_entries(self) -> u32 {
        match self {
            FloppyFormat::Floppy720K => 112,
            FloppyFormat::Floppy1440K => 224,
            FloppyFormat::Floppy2880K => 240,
        }
    }
}

/// Full parameter set for [`format_volume`]; the convenience entry points
/// fill this in from capacity tables and presets.
pub struct FormatSpec<'a> {
    pub variant: FatVariant,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    /// Fixed root directory entries; zero on FAT32.
    pub root_entries: u32,
    pub fat_count: u32,
    pub media: u8,
    pub geometry: Geometry,
    /// Sectors preceding the volume, recorded as hidden sectors.
    pub first_sector: u64,
    pub sector_count: u64,
    pub label: Option<&'a str>,
    pub drive_number: u8,
}

/// FSINFO sector of a FAT32 volume.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct FsInfo {
    lead_signature: U32,
    reserved1: [u8; 480],
    struct_signature: U32,
    free_count: U32,
    next_free: U32,
    reserved2: [u8; 12],
    trail_signature: U32,
}

/// Variant and cluster size from the capacity table. Volumes of 8400
/// sectors or fewer take the floppy path instead.
fn select_variant(sector_count: u64) -> Result<(FatVariant, u32)> {
    if sector_count <= 8400 {
        error!("Sector count ({sector_count}) shall exceed 8400 for a hard-disk format");
        return Err(Error::Fs(FsError::Unsupported));
    }
    if sector_count < 1_048_576 {
        let sectors_per_cluster = if sector_count <= 32_680 {
            2
        } else if sector_count <= 262_144 {
            4
        } else if sector_count <= 524_288 {
            8
        } else {
            16
        };
        Ok((FatVariant::Fat16, sectors_per_cluster))
    } else {
        let sectors_per_cluster = if sector_count <= 532_480 {
            1
        } else if sector_count <= 16_777_216 {
            8
        } else if sector_count <= 33_554_432 {
            16
        } else if sector_count <= 67_108_864 {
            32
        } else {
            64
        };
        Ok((FatVariant::Fat32, sectors_per_cluster))
    }
}

/// FAT sectors and resulting cluster count, iterated to a fixed point: the
/// table must hold a cell for every cluster the remaining space yields.
fn fat_geometry(spec: &FormatSpec, root_sectors: u64) -> Result<(u64, u64)> {
    let mut fat_size = 1u64;
    loop {
        let overhead = spec.reserved_sectors as u64 + spec.fat_count as u64 * fat_size + root_sectors;
        if overhead >= spec.sector_count {
            return Err(Error::Fs(FsError::NoSpace));
        }
        let clusters = (spec.sector_count - overhead) / spec.sectors_per_cluster as u64;
        let needed = ((clusters + 2) * spec.variant.entry_bits() as u64)
            .div_ceil(8)
            .div_ceil(SECTOR_SIZE as u64);
        if needed <= fat_size {
            return Ok((fat_size, clusters));
        }
        fat_size = needed;
    }
}

/// Format a partition, selecting variant and cluster size from the sector
/// count.
pub fn format_partition<DS: DataStorage>(
    storage: &DS,
    label: Option<&str>,
    geometry: Geometry,
    first_sector: u64,
    sector_count: u64,
    reserved_sectors: Option<u32>,
) -> Result<()> {
    let (variant, sectors_per_cluster) = select_variant(sector_count)?;
    let spec = FormatSpec {
        variant,
        sectors_per_cluster,
        reserved_sectors: reserved_sectors.unwrap_or(match variant {
            FatVariant::Fat32 => 32,
            _ => 1,
        }),
        root_entries: match variant {
            FatVariant::Fat32 => 0,
            _ => 512,
        },
        fat_count: 2,
        media: 0xF8,
        geometry,
        first_sector,
        sector_count,
        label,
        drive_number: 0x80,
    };
    format_volume(storage, &spec)
}

/// Format a floppy image with one of the fixed FAT12 presets.
pub fn format_floppy<DS: DataStorage>(
    storage: &DS,
    format: FloppyFormat,
    label: Option<&str>,
) -> Result<()> {
    let geometry = format.geometry();
    let spec = FormatSpec {
        variant: FatVariant::Fat12,
        sectors_per_cluster: format.sectors_per_cluster(),
        reserved_sectors: 1,
        root_entries: format.root_entries(),
        fat_count: 2,
        media: format.media(),
        geometry,
        first_sector: 0,
        sector_count: geometry.total_sectors(),
        label,
        drive_number: 0x00,
    };
    format_volume(storage, &spec)
}

/// Write BPB, FAT copies, and an empty root into the stream, then pad it to
/// full size.
pub fn format_volume<DS: DataStorage>(storage: &DS, spec: &FormatSpec) -> Result<()> {
    if spec.sector_count > u32::MAX as u64 || spec.sector_count == 0 {
        error!(
            "Sector count ({}) shall fit the 32-bit BPB field",
            spec.sector_count
        );
        return Err(Error::Fs(FsError::Unsupported));
    }
    let root_sectors =
        (spec.root_entries as u64 * DIR_ENTRY_SIZE as u64).div_ceil(SECTOR_SIZE as u64);
    let (fat_size, cluster_count) = fat_geometry(spec, root_sectors)?;
    if FatVariant::from_cluster_count(cluster_count as u32) != spec.variant {
        error!(
            "Cluster count ({cluster_count}) shall match the requested {} variant",
            spec.variant.label()
        );
        return Err(Error::Fs(FsError::Unsupported));
    }

    let now = SystemClock.now();
    let serial = (now.secs as u32).wrapping_mul(0x0101_0101) ^ now.nanos;
    let base = spec.first_sector * SECTOR_SIZE as u64;

    // Boot sector.
    let mut boot = [0u8; SECTOR_SIZE];
    let is_fat32 = spec.variant == FatVariant::Fat32;
    let mut bpb = Bpb {
        jump: if is_fat32 {
            [0xEB, 0x58, 0x90]
        } else {
            [0xEB, 0x3C, 0x90]
        },
        oem_name: *b"OPAL    ",
        sectors_per_cluster: spec.sectors_per_cluster as u8,
        fat_count: spec.fat_count as u8,
        media: spec.media,
        ..Bpb::default()
    };
    bpb.bytes_per_sector.set(SECTOR_SIZE as u16);
    bpb.reserved_sectors.set(spec.reserved_sectors as u16);
    bpb.root_entry_count.set(spec.root_entries as u16);
    if !is_fat32 && spec.sector_count < 0x10000 {
        bpb.total_sectors_16.set(spec.sector_count as u16);
    } else {
        bpb.total_sectors_32.set(spec.sector_count as u32);
    }
    if !is_fat32 {
        bpb.fat_size_16.set(fat_size as u16);
    }
    bpb.sectors_per_track.set(spec.geometry.sectors_per_track as u16);
    bpb.head_count.set(spec.geometry.heads as u16);
    bpb.hidden_sectors.set(spec.first_sector as u32);
    boot[..size_of::<Bpb>()].copy_from_slice(bpb.as_bytes());

    let mut label_bytes = *b"NO NAME    ";
    if let Some(label) = spec.label {
        label_bytes = [b' '; 11];
        for (target, byte) in label_bytes.iter_mut().zip(label.bytes().take(11)) {
            *target = byte.to_ascii_uppercase();
        }
    }
    let mut extended = ExtendedBpb {
        drive_number: spec.drive_number,
        boot_signature: 0x29,
        volume_label: label_bytes,
        filesystem_type: match spec.variant {
            FatVariant::Fat12 => *b"FAT12   ",
            FatVariant::Fat16 => *b"FAT16   ",
            FatVariant::Fat32 => *b"FAT32   ",
        },
        ..ExtendedBpb::default()
    };
    extended.volume_serial.set(serial);

    if is_fat32 {
        let mut fat32 = Fat32Bpb::default();
        fat32.fat_size_32.set(fat_size as u32);
        fat32.root_cluster.set(2);
        fat32.fsinfo_sector.set(1);
        fat32.backup_boot_sector.set(6);
        boot[FAT32_BPB_OFFSET..FAT32_BPB_OFFSET + size_of::<Fat32Bpb>()]
            .copy_from_slice(fat32.as_bytes());
        boot[EXTENDED_BPB_OFFSET_32..EXTENDED_BPB_OFFSET_32 + size_of::<ExtendedBpb>()]
            .copy_from_slice(extended.as_bytes());
    } else {
        boot[EXTENDED_BPB_OFFSET_16..EXTENDED_BPB_OFFSET_16 + size_of::<ExtendedBpb>()]
            .copy_from_slice(extended.as_bytes());
    }
    boot[SIGNATURE_OFFSET] = 0x55;
    boot[SIGNATURE_OFFSET + 1] = 0xAA;
    storage.write(base, &boot)?;

    // The FAT copies: media descriptor in cell 0, end-of-chain in cell 1,
    // and the FAT32 root cluster terminated in cell 2.
    let mut fat = Fat::create(
        spec.variant,
        cluster_count as u32,
        fat_size as usize * SECTOR_SIZE,
    );
    fat.init_reserved(spec.media)?;
    if is_fat32 {
        fat.set_end_of_chain(2)?;
    }
    for copy in 0..spec.fat_count as u64 {
        storage.write(
            base + (spec.reserved_sectors as u64 + copy * fat_size) * SECTOR_SIZE as u64,
            fat.bytes(),
        )?;
    }

    // Empty root directory, with the label entry when one was given.
    let label_entry = spec
        .label
        .map(|label| dir::volume_label_entry(label, now, TimeZone::Utc));
    let first_root_sector = spec.reserved_sectors as u64 + spec.fat_count as u64 * fat_size;
    if is_fat32 {
        let mut root = vec![0u8; spec.sectors_per_cluster as usize * SECTOR_SIZE];
        if let Some(entry) = label_entry {
            root[..DIR_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
        }
        storage.write(base + first_root_sector * SECTOR_SIZE as u64, &root)?;
    } else {
        let mut root = vec![0u8; (root_sectors * SECTOR_SIZE as u64) as usize];
        if let Some(entry) = label_entry {
            root[..DIR_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
        }
        storage.write(base + first_root_sector * SECTOR_SIZE as u64, &root)?;
    }

    // FSINFO and the backup boot region.
    if is_fat32 {
        let mut fsinfo = FsInfo::new_zeroed();
        fsinfo.lead_signature.set(0x4161_5252);
        fsinfo.struct_signature.set(0x6141_7272);
        fsinfo.free_count.set(cluster_count as u32 - 1);
        fsinfo.next_free.set(3);
        fsinfo.trail_signature.set(0xAA55_0000);
        storage.write(base + SECTOR_SIZE as u64, fsinfo.as_bytes())?;
        storage.write(base + 6 * SECTOR_SIZE as u64, &boot)?;
        storage.write(base + 7 * SECTOR_SIZE as u64, fsinfo.as_bytes())?;
    }

    // Pad the stream out to the full volume.
    let target = base + spec.sector_count * SECTOR_SIZE as u64;
    if storage.len()? < target {
        storage.set_len(target)?;
    }
    Ok(())
}
