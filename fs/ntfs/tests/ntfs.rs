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

//! Reader coverage against a synthetic NTFS image built in memory: 4096-byte
//! clusters, 1024-byte records, a root directory spilled into one
//! `$INDEX_ALLOCATION` block, resident and non-resident files, a sparse
//! file, an alternate data stream, and a stale reference.

use opal_ds_std::MemoryStorage;
use opal_fs::{time, Error, FileAccess, FileMode, FileStream, FileSystem, FsError, Timestamp};
use opal_fs_ntfs::NtfsFileSystem;

const BYTES_PER_CLUSTER: u64 = 4096;
const RECORD_SIZE: usize = 1024;
const MFT_LCN: u64 = 4;
const TOTAL_CLUSTERS: u64 = 2048;

const SEQ: u16 = 1;

fn ticks() -> u64 {
    // 2020-01-01T00:00:00Z.
    time::to_ntfs(Timestamp::from_unix(1_577_836_800))
}

fn put16(buffer: &mut [u8], at: usize, value: u16) {
    buffer[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put32(buffer: &mut [u8], at: usize, value: u32) {
    buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put64(buffer: &mut [u8], at: usize, value: u64) {
    buffer[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn reference(index: u64) -> u64 {
    index | (SEQ as u64) << 48
}

fn align8(value: usize) -> usize {
    value.next_multiple_of(8)
}

fn resident_attr(type_code: u32, name: &str, value: &[u8]) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let value_offset = align8(24 + units.len() * 2);
    let length = align8(value_offset + value.len());
    let mut bytes = vec![0u8; length];
    put32(&mut bytes, 0, type_code);
    put32(&mut bytes, 4, length as u32);
    bytes[8] = 0;
    bytes[9] = units.len() as u8;
    put16(&mut bytes, 10, 24);
    put32(&mut bytes, 16, value.len() as u32);
    put16(&mut bytes, 20, value_offset as u16);
    for (slot, unit) in units.iter().enumerate() {
        put16(&mut bytes, 24 + slot * 2, *unit);
    }
    bytes[value_offset..value_offset + value.len()].copy_from_slice(value);
    bytes
}

fn nonresident_attr(
    type_code: u32,
    name: &str,
    runs: &[(u64, Option<i64>)],
    allocated: u64,
    real: u64,
    initialized: u64,
) -> Vec<u8> {
    let mut mapping = Vec::new();
    let mut vcn_count = 0u64;
    for &(length, delta) in runs {
        vcn_count += length;
        match delta {
            None => {
                mapping.push(0x01);
                mapping.push(length as u8);
            }
            Some(delta) => {
                mapping.push(0x11);
                mapping.push(length as u8);
                mapping.push(delta as i8 as u8);
            }
        }
    }
    mapping.push(0);

    let units: Vec<u16> = name.encode_utf16().collect();
    let mapping_offset = align8(64 + units.len() * 2);
    let length = align8(mapping_offset + mapping.len());
    let mut bytes = vec![0u8; length];
    put32(&mut bytes, 0, type_code);
    put32(&mut bytes, 4, length as u32);
    bytes[8] = 1;
    bytes[9] = units.len() as u8;
    put16(&mut bytes, 10, 64);
    put64(&mut bytes, 16, 0);
    put64(&mut bytes, 24, vcn_count - 1);
    put16(&mut bytes, 32, mapping_offset as u16);
    put64(&mut bytes, 40, allocated);
    put64(&mut bytes, 48, real);
    put64(&mut bytes, 56, initialized);
    for (slot, unit) in units.iter().enumerate() {
        put16(&mut bytes, 64 + slot * 2, *unit);
    }
    bytes[mapping_offset..mapping_offset + mapping.len()].copy_from_slice(&mapping);
    bytes
}

fn std_info_value(security_id: u32) -> Vec<u8> {
    let mut value = vec![0u8; 72];
    put64(&mut value, 0, ticks());
    put64(&mut value, 8, ticks());
    put64(&mut value, 16, ticks());
    put64(&mut value, 24, ticks());
    put32(&mut value, 32, 0x20);
    put32(&mut value, 52, security_id);
    value
}

fn file_name_value(parent: u64, name: &str, is_dir: bool, real: u64, allocated: u64) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut value = vec![0u8; 66 + units.len() * 2];
    put64(&mut value, 0, reference(parent));
    put64(&mut value, 8, ticks());
    put64(&mut value, 16, ticks());
    put64(&mut value, 24, ticks());
    put64(&mut value, 32, ticks());
    put64(&mut value, 40, allocated);
    put64(&mut value, 48, real);
    put32(&mut value, 56, if is_dir { 0x1000_0000 } else { 0x20 });
    value[64] = units.len() as u8;
    value[65] = 1; // Win32 namespace
    for (slot, unit) in units.iter().enumerate() {
        put16(&mut value, 66 + slot * 2, *unit);
    }
    value
}

fn index_entry(entry_reference: u64, key: Option<&[u8]>, subnode: Option<u64>) -> Vec<u8> {
    let key_length = key.map_or(0, |key| key.len());
    let mut entry_length = align8(16 + key_length);
    if subnode.is_some() {
        entry_length += 8;
    }
    let mut bytes = vec![0u8; entry_length];
    put64(&mut bytes, 0, entry_reference);
    put16(&mut bytes, 8, entry_length as u16);
    put16(&mut bytes, 10, key_length as u16);
    let mut flags = 0u16;
    if subnode.is_some() {
        flags |= 0x01;
    }
    if key.is_none() {
        flags |= 0x02;
    }
    put16(&mut bytes, 12, flags);
    if let Some(key) = key {
        bytes[16..16 + key.len()].copy_from_slice(key);
    }
    if let Some(vcn) = subnode {
        let at = entry_length - 8;
        put64(&mut bytes, at, vcn);
    }
    bytes
}

fn index_root_value(entries: &[Vec<u8>], has_children: bool) -> Vec<u8> {
    let entry_bytes: usize = entries.iter().map(Vec::len).sum();
    let mut value = vec![0u8; 32 + entry_bytes];
    put32(&mut value, 0, 0x30);
    put32(&mut value, 4, 1);
    put32(&mut value, 8, BYTES_PER_CLUSTER as u32);
    value[12] = 1;
    // Node header, offsets relative to its own start at 16.
    put32(&mut value, 16, 16);
    put32(&mut value, 20, (16 + entry_bytes) as u32);
    put32(&mut value, 24, (16 + entry_bytes) as u32);
    put32(&mut value, 28, has_children as u32);
    let mut at = 32;
    for entry in entries {
        value[at..at + entry.len()].copy_from_slice(entry);
        at += entry.len();
    }
    value
}

fn apply_usa(buffer: &mut [u8], usa_offset: usize) {
    let slices = buffer.len() / 512;
    put16(buffer, usa_offset, 1);
    for slice in 1..=slices {
        let tail = slice * 512 - 2;
        let saved = [buffer[tail], buffer[tail + 1]];
        buffer[usa_offset + slice * 2..usa_offset + slice * 2 + 2].copy_from_slice(&saved);
        put16(buffer, tail, 1);
    }
}

fn build_record(sequence: u16, is_dir: bool, attrs: &[Vec<u8>]) -> Vec<u8> {
    let mut record = vec![0u8; RECORD_SIZE];
    record[..4].copy_from_slice(b"FILE");
    put16(&mut record, 4, 48);
    put16(&mut record, 6, 3);
    put16(&mut record, 16, sequence);
    put16(&mut record, 18, 1);
    put16(&mut record, 20, 56);
    put16(&mut record, 22, if is_dir { 0x03 } else { 0x01 });
    put32(&mut record, 28, RECORD_SIZE as u32);
    let mut at = 56;
    for attr in attrs {
        record[at..at + attr.len()].copy_from_slice(attr);
        at += attr.len();
    }
    put32(&mut record, at, 0xFFFF_FFFF);
    put32(&mut record, 24, (at + 8) as u32);
    apply_usa(&mut record, 48);
    record
}

fn index_block(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut block = vec![0u8; BYTES_PER_CLUSTER as usize];
    block[..4].copy_from_slice(b"INDX");
    put16(&mut block, 4, 40);
    put16(&mut block, 6, 9);
    put64(&mut block, 16, 0); // this block's VCN
    // Node header at 24; entries skip past the update sequence area.
    put32(&mut block, 24, 40);
    let entry_bytes: usize = entries.iter().map(Vec::len).sum();
    put32(&mut block, 28, (40 + entry_bytes) as u32);
    put32(&mut block, 32, (BYTES_PER_CLUSTER - 24) as u32);
    put32(&mut block, 36, 0);
    let mut at = 64;
    for entry in entries {
        block[at..at + entry.len()].copy_from_slice(entry);
        at += entry.len();
    }
    apply_usa(&mut block, 40);
    block
}

fn cmd_exe_content() -> Vec<u8> {
    (0..7000u32).map(|i| (i % 253) as u8).collect()
}

/// Assemble the whole image.
fn build_image() -> Vec<u8> {
    let mut image = vec![0u8; (TOTAL_CLUSTERS * BYTES_PER_CLUSTER) as usize];

    // Boot sector.
    let boot = &mut image[..512];
    boot[..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    boot[3..11].copy_from_slice(b"NTFS    ");
    put16(boot, 11, 512);
    boot[13] = 8;
    boot[21] = 0xF8;
    put16(boot, 24, 63);
    put16(boot, 26, 255);
    put64(boot, 40, TOTAL_CLUSTERS * 8);
    put64(boot, 48, MFT_LCN);
    put64(boot, 56, 2);
    boot[64] = (-10i8) as u8; // 1024-byte records
    boot[68] = (-12i8) as u8; // 4096-byte index blocks
    put64(boot, 72, 0xDEAD_BEEF_0102_0304);
    boot[510] = 0x55;
    boot[511] = 0xAA;

    // Records.
    let mut records: Vec<(u64, Vec<u8>)> = Vec::new();

    // 0: $MFT, 32 records in 8 clusters at MFT_LCN.
    records.push((
        0,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(5, "$MFT", false, 32768, 32768)),
                nonresident_attr(0x80, "", &[(8, Some(MFT_LCN as i64))], 32768, 32768, 32768),
            ],
        ),
    ));

    // 3: $Volume with the label.
    let label: Vec<u8> = "OPALTEST"
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    records.push((
        3,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x60, "", &label),
            ],
        ),
    ));

    // 5: root directory; its index spills into one INDX block at LCN 52.
    records.push((
        5,
        build_record(
            SEQ,
            true,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(5, ".", true, 0, 0)),
                resident_attr(
                    0x90,
                    "$I30",
                    &index_root_value(&[index_entry(0, None, Some(0))], true),
                ),
                nonresident_attr(0xA0, "$I30", &[(1, Some(52))], 4096, 4096, 4096),
            ],
        ),
    ));

    // 6: $Bitmap covering 2048 clusters; clusters 0..=52 are in use.
    let mut bitmap = vec![0u8; 256];
    for byte in bitmap.iter_mut().take(6) {
        *byte = 0xFF;
    }
    bitmap[6] = 0x1F;
    records.push((
        6,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                nonresident_attr(0x80, "", &[(1, Some(12))], 4096, 256, 256),
            ],
        ),
    ));

    // 9: $Secure with a single $SDS entry for id 0x101.
    let payload = b"SECDESC";
    let mut sds = vec![0u8; 20 + payload.len()];
    put32(&mut sds, 4, 0x101);
    put32(&mut sds, 16, (20 + payload.len()) as u32);
    sds[20..].copy_from_slice(payload);
    records.push((
        9,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x80, "$SDS", &sds),
            ],
        ),
    ));

    // 10: $UpCase, identity with ASCII folding, 32 clusters at LCN 16.
    records.push((
        10,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                nonresident_attr(0x80, "", &[(32, Some(16))], 131_072, 131_072, 131_072),
            ],
        ),
    ));

    // 24: \win
    records.push((
        24,
        build_record(
            SEQ,
            true,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(5, "win", true, 0, 0)),
                resident_attr(
                    0x90,
                    "$I30",
                    &index_root_value(
                        &[
                            index_entry(
                                reference(28),
                                Some(&file_name_value(24, "system32", true, 0, 0)),
                                None,
                            ),
                            index_entry(0, None, None),
                        ],
                        false,
                    ),
                ),
            ],
        ),
    ));

    // 25: \file.txt with an alternate data stream.
    records.push((
        25,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x101)),
                resident_attr(0x30, "", &file_name_value(5, "file.txt", false, 11, 11)),
                resident_attr(0x80, "", b"hello world"),
                resident_attr(0x80, "stream1", b"alternate"),
            ],
        ),
    ));

    // 26: \sparse.bin - data, hole, data.
    records.push((
        26,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(5, "sparse.bin", false, 16384, 16384)),
                nonresident_attr(
                    0x80,
                    "",
                    &[(1, Some(48)), (2, None), (1, Some(1))],
                    16384,
                    16384,
                    16384,
                ),
            ],
        ),
    ));

    // 27: \resident.txt
    records.push((
        27,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(5, "resident.txt", false, 4, 4)),
                resident_attr(0x80, "", b"tiny"),
            ],
        ),
    ));

    // 28: \win\system32
    records.push((
        28,
        build_record(
            SEQ,
            true,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(24, "system32", true, 0, 0)),
                resident_attr(
                    0x90,
                    "$I30",
                    &index_root_value(
                        &[
                            index_entry(
                                reference(29),
                                Some(&file_name_value(28, "cmd.exe", false, 7000, 8192)),
                                None,
                            ),
                            index_entry(0, None, None),
                        ],
                        false,
                    ),
                ),
            ],
        ),
    ));

    // 29: \win\system32\cmd.exe - two clusters at LCN 50.
    records.push((
        29,
        build_record(
            SEQ,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(28, "cmd.exe", false, 7000, 8192)),
                nonresident_attr(0x80, "", &[(2, Some(50))], 8192, 7000, 7000),
            ],
        ),
    ));

    // 30: record reused since the index entry was made (sequence 2 vs 1).
    records.push((
        30,
        build_record(
            2,
            false,
            &[
                resident_attr(0x10, "", &std_info_value(0x100)),
                resident_attr(0x30, "", &file_name_value(5, "stale.txt", false, 0, 0)),
                resident_attr(0x80, "", b""),
            ],
        ),
    ));

    let mft_offset = (MFT_LCN * BYTES_PER_CLUSTER) as usize;
    for (index, record) in &records {
        let at = mft_offset + *index as usize * RECORD_SIZE;
        image[at..at + RECORD_SIZE].copy_from_slice(record);
    }

    // Root INDX block at LCN 52, entries in collation order.
    let block = index_block(&[
        index_entry(
            reference(25),
            Some(&file_name_value(5, "file.txt", false, 11, 11)),
            None,
        ),
        index_entry(
            reference(27),
            Some(&file_name_value(5, "resident.txt", false, 4, 4)),
            None,
        ),
        index_entry(
            reference(26),
            Some(&file_name_value(5, "sparse.bin", false, 16384, 16384)),
            None,
        ),
        index_entry(
            reference(30),
            Some(&file_name_value(5, "stale.txt", false, 0, 0)),
            None,
        ),
        index_entry(
            reference(24),
            Some(&file_name_value(5, "win", true, 0, 0)),
            None,
        ),
        index_entry(0, None, None),
    ]);
    let at = (52 * BYTES_PER_CLUSTER) as usize;
    image[at..at + block.len()].copy_from_slice(&block);

    // $Bitmap data.
    let at = (12 * BYTES_PER_CLUSTER) as usize;
    image[at..at + bitmap.len()].copy_from_slice(&bitmap);

    // $UpCase data: identity except ASCII lowercase.
    let at = (16 * BYTES_PER_CLUSTER) as usize;
    for unit in 0..65_536usize {
        let mapped = if (b'a' as usize..=b'z' as usize).contains(&unit) {
            unit - 32
        } else {
            unit
        } as u16;
        image[at + unit * 2..at + unit * 2 + 2].copy_from_slice(&mapped.to_le_bytes());
    }

    // Sparse file data.
    let at = (48 * BYTES_PER_CLUSTER) as usize;
    image[at..at + 4096].fill(0xAA);
    let at = (49 * BYTES_PER_CLUSTER) as usize;
    image[at..at + 4096].fill(0xBB);

    // cmd.exe data.
    let content = cmd_exe_content();
    let at = (50 * BYTES_PER_CLUSTER) as usize;
    image[at..at + content.len()].copy_from_slice(&content);

    image
}

fn mount() -> NtfsFileSystem<MemoryStorage> {
    NtfsFileSystem::new(MemoryStorage::read_only(build_image())).unwrap()
}

#[test]
fn mounts_and_identifies() {
    let fs = mount();
    assert_eq!(fs.friendly_name(), "NTFS");
    assert!(!fs.can_write());
    assert_eq!(fs.volume_label().unwrap(), "OPALTEST");
    assert_eq!(fs.volume_serial(), 0xDEAD_BEEF_0102_0304);
    assert!(fs.dir_exists("").unwrap());
}

#[test]
fn resolves_nested_paths() {
    let fs = mount();
    assert!(fs.dir_exists("\\win").unwrap());
    assert!(fs.dir_exists("\\win\\system32").unwrap());
    assert!(fs.file_exists("\\win\\system32\\cmd.exe").unwrap());
    assert_eq!(fs.file_length("\\win\\system32\\cmd.exe").unwrap(), 7000);

    let mut stream = fs
        .open_file("\\win\\system32\\cmd.exe", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), cmd_exe_content());
}

#[test]
fn case_folds_through_upcase() {
    let fs = mount();
    for variant in ["\\FILE.TXT", "\\File.Txt", "\\WIN\\SYSTEM32\\CMD.EXE"] {
        assert!(fs.exists(variant).unwrap(), "{variant}");
    }
}

#[test]
fn root_listing_uses_the_allocation_block() {
    let fs = mount();
    let entries = fs.entries("\\", None, false).unwrap();
    assert_eq!(
        entries,
        vec![
            "\\file.txt".to_string(),
            "\\resident.txt".to_string(),
            "\\sparse.bin".to_string(),
            "\\stale.txt".to_string(),
            "\\win".to_string(),
        ]
    );
    let files = fs.files("\\", Some("*.txt"), false).unwrap();
    assert_eq!(
        files,
        vec!["\\file.txt".to_string(), "\\resident.txt".to_string(), "\\stale.txt".to_string()]
    );
    let recursive = fs.files("\\", None, true).unwrap();
    assert!(recursive.contains(&"\\win\\system32\\cmd.exe".to_string()));
}

#[test]
fn resident_content() {
    let fs = mount();
    let mut stream = fs
        .open_file("\\resident.txt", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), b"tiny");
    assert_eq!(fs.file_length("\\resident.txt").unwrap(), 4);
}

#[test]
fn alternate_data_stream() {
    let fs = mount();
    assert_eq!(fs.file_length("\\file.txt").unwrap(), 11);
    assert_eq!(fs.file_length("\\file.txt:stream1").unwrap(), 9);
    let mut unnamed = fs
        .open_file("\\file.txt", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(unnamed.read_to_end().unwrap(), b"hello world");
    drop(unnamed);
    let mut named = fs
        .open_file("\\file.txt:stream1", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(named.read_to_end().unwrap(), b"alternate");
    assert!(fs.file_exists("\\file.txt:stream1").unwrap());
    assert!(!fs.file_exists("\\file.txt:missing").unwrap());
}

#[test]
fn sparse_runs_read_as_zeros() {
    let fs = mount();
    let mut stream = fs
        .open_file("\\sparse.bin", FileMode::Open, FileAccess::Read)
        .unwrap();
    let content = stream.read_to_end().unwrap();
    assert_eq!(content.len(), 16384);
    assert!(content[..4096].iter().all(|&byte| byte == 0xAA));
    assert!(content[4096..12288].iter().all(|&byte| byte == 0));
    assert!(content[12288..].iter().all(|&byte| byte == 0xBB));

    assert_eq!(
        fs.path_to_clusters("\\sparse.bin").unwrap(),
        vec![(48, 1), (49, 1)]
    );
}

#[test]
fn stale_reference_is_not_found() {
    let fs = mount();
    // The name is indexed, but the record has been reused since.
    assert!(fs
        .entries("\\", None, false)
        .unwrap()
        .contains(&"\\stale.txt".to_string()));
    assert!(!fs.file_exists("\\stale.txt").unwrap());
}

#[test]
fn torn_record_is_corrupt() {
    let mut image = build_image();
    // Flip a sector tail of record 25 without updating its USA.
    let at = (MFT_LCN * BYTES_PER_CLUSTER) as usize + 25 * RECORD_SIZE + 510;
    image[at] ^= 0xFF;
    let fs = NtfsFileSystem::new(MemoryStorage::read_only(image)).unwrap();
    assert!(matches!(
        fs.open_file("\\file.txt", FileMode::Open, FileAccess::Read),
        Err(Error::Fs(FsError::Corrupt))
    ));
}

#[test]
fn bitmap_tracks_allocated_clusters() {
    let fs = mount();
    for cluster in [0, MFT_LCN, 48, 49, 50, 52] {
        assert!(fs.is_cluster_allocated(cluster).unwrap(), "{cluster}");
    }
    assert!(!fs.is_cluster_allocated(53).unwrap());
    assert!(!fs.is_cluster_allocated(1000).unwrap());
    // Every extent of every data stream is marked in the bitmap.
    for path in ["\\sparse.bin", "\\win\\system32\\cmd.exe"] {
        for (start, length) in fs.path_to_clusters(path).unwrap() {
            for cluster in start..start + length {
                assert!(fs.is_cluster_allocated(cluster).unwrap());
            }
        }
    }
}

#[test]
fn security_descriptors() {
    let fs = mount();
    assert_eq!(fs.security_id_of("\\file.txt").unwrap(), 0x101);
    assert_eq!(fs.security_id_of("\\resident.txt").unwrap(), 0x100);
    assert_eq!(
        fs.security_descriptor(0x101).unwrap(),
        Some(b"SECDESC".to_vec())
    );
    assert_eq!(fs.security_descriptor(0x999).unwrap(), None);
}

#[test]
fn metadata_from_standard_information() {
    let fs = mount();
    let expected = time::from_ntfs(ticks());
    assert_eq!(fs.creation_time_utc("\\file.txt").unwrap(), expected);
    assert_eq!(fs.last_write_time_utc("\\file.txt").unwrap(), expected);
    assert_eq!(fs.last_access_time_utc("\\file.txt").unwrap(), expected);
    let info = fs.entry_info("\\win\\system32\\cmd.exe").unwrap();
    assert_eq!(info.name, "cmd.exe");
    assert_eq!(info.length, 7000);
    assert!(!info.attributes.is_directory());
    assert!(fs.attributes("\\win").unwrap().is_directory());
}

#[test]
fn writes_are_unsupported() {
    let fs = mount();
    assert!(matches!(
        fs.create_dir("\\new"),
        Err(Error::Fs(FsError::Unsupported))
    ));
    assert!(matches!(
        fs.delete_file("\\file.txt"),
        Err(Error::Fs(FsError::Unsupported))
    ));
    assert!(matches!(
        fs.open_file("\\file.txt", FileMode::Open, FileAccess::ReadWrite),
        Err(Error::Fs(FsError::Unsupported))
    ));
    assert!(matches!(
        fs.open_file("\\file.txt", FileMode::Create, FileAccess::ReadWrite),
        Err(Error::Fs(FsError::Unsupported))
    ));
    assert!(matches!(
        fs.set_last_write_time_utc("\\file.txt", Timestamp::from_unix(0)),
        Err(Error::Fs(FsError::Unsupported))
    ));
}

#[test]
fn missing_paths_are_not_found() {
    let fs = mount();
    assert!(!fs.file_exists("\\nope.txt").unwrap());
    assert!(!fs.dir_exists("\\nope").unwrap());
    assert!(matches!(
        fs.open_file("\\nope.txt", FileMode::Open, FileAccess::Read),
        Err(Error::Fs(FsError::NotFound))
    ));
    assert!(matches!(
        fs.file_length("\\file.txt\\inner"),
        Err(Error::Fs(FsError::NotADirectory))
    ));
}
