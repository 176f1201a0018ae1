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

//! The BIOS Parameter Block and the volume layout derived from it.

use log::error;
use opal_fs::{Error, FsError, Result};
use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

pub const SECTOR_SIZE: usize = 512;
pub const DIR_ENTRY_SIZE: usize = 32;

/// The BPB proper, at offset 0 of the boot sector. Common to every FAT
/// variant; the fields that follow it depend on the variant.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct Bpb {
    /// Jump instruction to boot code, 0xEB 0x?? 0x90 or 0xE9 0x?? 0x??.
    pub jump: [u8; 3],
    /// Indication of what system formatted the volume.
    pub oem_name: [u8; 8],
    /// 512, 1024, 2048 or 4096.
    pub bytes_per_sector: U16,
    /// Power of two within [1, 128].
    pub sectors_per_cluster: u8,
    /// Sectors before the first FAT, never zero.
    pub reserved_sectors: U16,
    /// 2 is recommended, 1 is acceptable.
    pub fat_count: u8,
    /// Count of 32-byte root entries for FAT12/16; zero on FAT32.
    pub root_entry_count: U16,
    /// Total sectors when they fit in 16 bits; otherwise zero and
    /// `total_sectors_32` holds the count.
    pub total_sectors_16: U16,
    /// 0xF8 for fixed media, 0xF0 for removable.
    pub media: u8,
    /// Sectors per FAT for FAT12/16; zero on FAT32.
    pub fat_size_16: U16,
    /// Geometry for interrupt 0x13, informational.
    pub sectors_per_track: U16,
    pub head_count: U16,
    /// Sectors preceding the partition that contains this volume.
    pub hidden_sectors: U32,
    pub total_sectors_32: U32,
}

/// Extended boot signature block: at offset 36 for FAT12/16, at offset 64
/// for FAT32 (after the FAT32-specific block).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct ExtendedBpb {
    /// 0x80 or 0x00.
    pub drive_number: u8,
    pub reserved: u8,
    /// 0x29 when the serial, label and type fields are present.
    pub boot_signature: u8,
    pub volume_serial: U32,
    /// Matches the volume-label entry in the root directory; "NO NAME    "
    /// when there is none.
    pub volume_label: [u8; 11],
    /// "FAT12   ", "FAT16   " or "FAT32   "; informational only, never used
    /// to determine the variant.
    pub filesystem_type: [u8; 8],
}

/// FAT32-specific block at offset 36.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub(crate) struct Fat32Bpb {
    pub fat_size_32: U32,
    /// Bits 0-3: active FAT when mirroring is disabled; bit 7: set when only
    /// that one FAT is live, clear when all copies are mirrored.
    pub flags: U16,
    /// Must be zero.
    pub version: U16,
    pub root_cluster: U32,
    pub fsinfo_sector: U16,
    pub backup_boot_sector: U16,
    pub reserved: [u8; 12],
}

pub(crate) const EXTENDED_BPB_OFFSET_16: usize = 36;
pub(crate) const FAT32_BPB_OFFSET: usize = 36;
pub(crate) const EXTENDED_BPB_OFFSET_32: usize = 64;
pub(crate) const SIGNATURE_OFFSET: usize = 510;

/// Mirroring bit of `Fat32Bpb::flags` (set = single active FAT).
pub(crate) const FLAG_SINGLE_ACTIVE_FAT: u16 = 0x0080;
pub(crate) const FLAG_ACTIVE_FAT_MASK: u16 = 0x000F;

/// The FAT variant, determined solely by the cluster count of the data
/// region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatVariant {
    Fat12,
    Fat16,
    Fat32,
}

impl FatVariant {
    /// The authoritative rule: < 4085 clusters is FAT12, < 65525 is FAT16,
    /// anything larger is FAT32.
    pub fn from_cluster_count(count: u32) -> Self {
        if count < 4085 {
            FatVariant::Fat12
        } else if count < 65525 {
            FatVariant::Fat16
        } else {
            FatVariant::Fat32
        }
    }

    pub(crate) fn entry_bits(self) -> u32 {
        match self {
            FatVariant::Fat12 => 12,
            FatVariant::Fat16 => 16,
            FatVariant::Fat32 => 32,
        }
    }

    /// Lowest raw value of the end-of-chain range.
    pub(crate) fn end_of_chain_min(self) -> u32 {
        match self {
            FatVariant::Fat12 => 0xFF8,
            FatVariant::Fat16 => 0xFFF8,
            FatVariant::Fat32 => 0x0FFF_FFF8,
        }
    }

    /// Canonical end-of-chain marker written by this implementation.
    pub(crate) fn end_of_chain(self) -> u32 {
        match self {
            FatVariant::Fat12 => 0xFFF,
            FatVariant::Fat16 => 0xFFFF,
            FatVariant::Fat32 => 0x0FFF_FFFF,
        }
    }

    pub(crate) fn bad_cluster(self) -> u32 {
        match self {
            FatVariant::Fat12 => 0xFF7,
            FatVariant::Fat16 => 0xFFF7,
            FatVariant::Fat32 => 0x0FFF_FFF7,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            FatVariant::Fat12 => "FAT12",
            FatVariant::Fat16 => "FAT16",
            FatVariant::Fat32 => "FAT32",
        }
    }
}

/// Everything the engine needs to address the volume, precomputed from the
/// boot sector at mount time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    pub variant: FatVariant,
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub fat_count: u32,
    pub fat_size_sectors: u32,
    pub mirrored: bool,
    pub active_fat: u32,
    pub root_entry_count: u32,
    /// First cluster of the FAT32 root directory; zero on FAT12/16.
    pub root_cluster: u32,
    pub total_sectors: u32,
    pub cluster_count: u32,
    pub first_root_sector: u32,
    pub first_data_sector: u32,
    pub media: u8,
    pub fsinfo_sector: u16,
    pub volume_serial: u32,
    /// Label recorded in the extended BPB; the root-directory label entry
    /// takes precedence when present.
    pub volume_label: [u8; 11],
}

impl Layout {
    pub fn from_boot_sector(sector: &[u8]) -> Result<Self> {
        if sector.len() < SECTOR_SIZE
            || sector[SIGNATURE_OFFSET] != 0x55
            || sector[SIGNATURE_OFFSET + 1] != 0xAA
        {
            error!("Boot sector shall end with the 0x55 0xAA signature word");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let bpb = Bpb::read_from_bytes(&sector[..size_of::<Bpb>()])
            .map_err(|_| Error::Fs(FsError::Corrupt))?;

        let bytes_per_sector = bpb.bytes_per_sector.get() as u32;
        if !bytes_per_sector.is_power_of_two() || !(512..=4096).contains(&bytes_per_sector) {
            error!("Bytes per sector ({bytes_per_sector}) shall be a power of 2 within [512, 4096]");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let sectors_per_cluster = bpb.sectors_per_cluster as u32;
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            error!("Sectors per cluster ({sectors_per_cluster}) shall be a power of 2 within [1, 128]");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let reserved_sectors = bpb.reserved_sectors.get() as u32;
        if reserved_sectors == 0 {
            error!("Reserved sector count shall not be 0");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let fat_count = bpb.fat_count as u32;
        if fat_count == 0 || fat_count > 2 {
            error!("Number of FATs ({fat_count}) shall be 1 or 2");
            return Err(Error::Fs(FsError::Corrupt));
        }

        let total_sectors = if bpb.total_sectors_16.get() != 0 {
            bpb.total_sectors_16.get() as u32
        } else {
            bpb.total_sectors_32.get()
        };
        if total_sectors == 0 {
            error!("Total sector count shall not be 0");
            return Err(Error::Fs(FsError::Corrupt));
        }

        let (fat_size_sectors, mirrored, active_fat, root_cluster, fsinfo_sector) =
            if bpb.fat_size_16.get() != 0 {
                (bpb.fat_size_16.get() as u32, true, 0, 0, 0)
            } else {
                let fat32 = Fat32Bpb::read_from_bytes(
                    &sector[FAT32_BPB_OFFSET..FAT32_BPB_OFFSET + size_of::<Fat32Bpb>()],
                )
                .map_err(|_| Error::Fs(FsError::Corrupt))?;
                if fat32.version.get() != 0 {
                    error!(
                        "Filesystem version ({:#06x}) shall be 0",
                        fat32.version.get()
                    );
                    return Err(Error::Fs(FsError::Corrupt));
                }
                let flags = fat32.flags.get();
                (
                    fat32.fat_size_32.get(),
                    flags & FLAG_SINGLE_ACTIVE_FAT == 0,
                    (flags & FLAG_ACTIVE_FAT_MASK) as u32,
                    fat32.root_cluster.get(),
                    fat32.fsinfo_sector.get(),
                )
            };
        if fat_size_sectors == 0 {
            error!("FAT size shall not be 0");
            return Err(Error::Fs(FsError::Corrupt));
        }
        if active_fat >= fat_count {
            error!("Active FAT index ({active_fat}) shall be below the FAT count ({fat_count})");
            return Err(Error::Fs(FsError::Corrupt));
        }

        let root_entry_count = bpb.root_entry_count.get() as u32;
        let root_sectors =
            (root_entry_count * DIR_ENTRY_SIZE as u32).div_ceil(bytes_per_sector);
        let first_root_sector = reserved_sectors + fat_count * fat_size_sectors;
        let first_data_sector = first_root_sector + root_sectors;
        if first_data_sector >= total_sectors {
            error!("Data region shall not be empty");
            return Err(Error::Fs(FsError::Corrupt));
        }
        let cluster_count = (total_sectors - first_data_sector) / sectors_per_cluster;

        let variant = FatVariant::from_cluster_count(cluster_count);
        match variant {
            FatVariant::Fat32 => {
                if root_cluster < 2 || root_cluster >= cluster_count + 2 {
                    error!("Root cluster ({root_cluster}) shall lie inside the data region");
                    return Err(Error::Fs(FsError::Corrupt));
                }
                if root_entry_count != 0 {
                    error!("Root entry count shall be 0 on FAT32");
                    return Err(Error::Fs(FsError::Corrupt));
                }
            }
            _ => {
                if root_entry_count == 0 {
                    error!("Root entry count shall not be 0 on FAT12/16");
                    return Err(Error::Fs(FsError::Corrupt));
                }
            }
        }

        let extended_offset = match variant {
            FatVariant::Fat32 => EXTENDED_BPB_OFFSET_32,
            _ => EXTENDED_BPB_OFFSET_16,
        };
        let extended = ExtendedBpb::read_from_bytes(
            &sector[extended_offset..extended_offset + size_of::<ExtendedBpb>()],
        )
        .map_err(|_| Error::Fs(FsError::Corrupt))?;
        let (volume_serial, volume_label) = if extended.boot_signature == 0x29 {
            (extended.volume_serial.get(), extended.volume_label)
        } else {
            (0, *b"NO NAME    ")
        };

        Ok(Self {
            variant,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            fat_size_sectors,
            mirrored,
            active_fat,
            root_entry_count,
            root_cluster,
            total_sectors,
            cluster_count,
            first_root_sector,
            first_data_sector,
            media: bpb.media,
            fsinfo_sector,
            volume_serial,
            volume_label,
        })
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector * self.sectors_per_cluster
    }

    /// Highest valid cluster index; user data lives in 2..=max_cluster.
    pub fn max_cluster(&self) -> u32 {
        self.cluster_count + 1
    }

    /// Byte offset of a data cluster.
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        (self.first_data_sector as u64
            + (cluster as u64 - 2) * self.sectors_per_cluster as u64)
            * self.bytes_per_sector as u64
    }

    /// Byte offset of one FAT copy.
    pub fn fat_offset(&self, copy: u32) -> u64 {
        (self.reserved_sectors as u64 + copy as u64 * self.fat_size_sectors as u64)
            * self.bytes_per_sector as u64
    }

    pub fn fat_bytes(&self) -> usize {
        self.fat_size_sectors as usize * self.bytes_per_sector as usize
    }

    pub fn root_region_offset(&self) -> u64 {
        self.first_root_sector as u64 * self.bytes_per_sector as u64
    }

    pub fn root_region_bytes(&self) -> usize {
        self.root_entry_count as usize * DIR_ENTRY_SIZE
    }
}
