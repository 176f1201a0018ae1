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

//! End-to-end coverage over in-memory images: format, mutate, remount,
//! verify.

use opal_ds::DataStorage;
use opal_ds_std::MemoryStorage;
use opal_fs::{
    Error, FileAccess, FileMode, FileStream, FileSystem, FsError, FsOptions, Timestamp,
};
use opal_fs_fat::{
    format_floppy, format_partition, format_volume, FatFileSystem, FatVariant, FloppyFormat,
    FormatSpec, Geometry,
};

fn fat16_image(sectors: u64, label: Option<&str>) -> MemoryStorage {
    let storage = MemoryStorage::with_len(sectors * 512);
    format_partition(
        &storage,
        label,
        Geometry::from_capacity(sectors),
        0,
        sectors,
        None,
    )
    .unwrap();
    storage
}

fn fat32_image(label: Option<&str>) -> MemoryStorage {
    // Small but genuinely FAT32: one-sector clusters keep the cluster count
    // above the 65525 threshold.
    let sectors = 70_000;
    let storage = MemoryStorage::with_len(sectors * 512);
    format_volume(
        &storage,
        &FormatSpec {
            variant: FatVariant::Fat32,
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            root_entries: 0,
            fat_count: 2,
            media: 0xF8,
            geometry: Geometry::from_capacity(sectors),
            first_sector: 0,
            sector_count: sectors,
            label,
            drive_number: 0x80,
        },
    )
    .unwrap();
    storage
}

#[test]
fn format_and_roundtrip() {
    // 10 MiB FAT16 with a label.
    let storage = fat16_image(20_480, Some("TEST"));
    {
        let fs = FatFileSystem::new(&storage).unwrap();
        assert_eq!(fs.variant(), FatVariant::Fat16);
        assert_eq!(fs.friendly_name(), "FAT16");
        assert_eq!(fs.volume_label().unwrap(), "TEST");
        assert!(fs.dir_exists("").unwrap());

        fs.create_dir("\\A\\B").unwrap();
        let mut stream = fs
            .open_file("\\A\\B\\hello.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(&[0x48, 0x65, 0x6C, 0x6C, 0x6F]).unwrap();
        stream.flush().unwrap();
    }

    let fs = FatFileSystem::new(&storage).unwrap();
    assert!(fs.dir_exists("\\A\\B").unwrap());
    assert_eq!(fs.file_length("\\A\\B\\hello.txt").unwrap(), 5);
    let mut stream = fs
        .open_file("\\A\\B\\hello.txt", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), b"Hello");
    drop(stream);

    let listing = fs.entries("\\A\\B", None, false).unwrap();
    assert_eq!(listing, vec!["\\A\\B\\hello.txt".to_string()]);
    let info = fs.entry_info("\\A\\B\\hello.txt").unwrap();
    assert_eq!(info.name, "hello.txt");
    assert_eq!(info.length, 5);
}

#[test]
fn long_file_name_and_alias() {
    let storage = fat32_image(None);
    let name = "\\A really long file name.txt";
    {
        let fs = FatFileSystem::new(&storage).unwrap();
        assert_eq!(fs.variant(), FatVariant::Fat32);
        let mut stream = fs
            .open_file(name, FileMode::CreateNew, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(b"x").unwrap();
        stream.flush().unwrap();
    }

    let fs = FatFileSystem::new(&storage).unwrap();
    let files = fs.files("\\", None, false).unwrap();
    assert_eq!(files, vec![name.to_string()]);
    // The generated alias: first six mapped characters plus the ~1 tail.
    assert!(fs.file_exists("\\AREALL~1.TXT").unwrap());
    let mut stream = fs
        .open_file("\\AREALL~1.TXT", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), b"x");
}

#[test]
fn delete_reclaims_clusters() {
    // 8 MiB FAT16: cluster size is two sectors, 1024 bytes.
    let storage = fat16_image(16_384, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    let free_before = fs.free_clusters();

    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    {
        let mut stream = fs
            .open_file("\\big.bin", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(&payload).unwrap();
        stream.flush().unwrap();
    }
    assert_eq!(
        fs.free_clusters(),
        free_before - 100_000u32.div_ceil(1024)
    );

    fs.delete_file("\\big.bin").unwrap();
    assert_eq!(fs.free_clusters(), free_before);
    assert!(!fs.file_exists("\\big.bin").unwrap());
}

#[test]
fn move_preserves_content() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

    fs.create_dir("\\src").unwrap();
    fs.create_dir("\\dst").unwrap();
    {
        let mut stream = fs
            .open_file("\\src\\f.bin", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(&payload).unwrap();
        stream.flush().unwrap();
    }

    fs.move_file("\\src\\f.bin", "\\dst\\f.bin", false).unwrap();
    assert!(!fs.file_exists("\\src\\f.bin").unwrap());
    let mut stream = fs
        .open_file("\\dst\\f.bin", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), payload);
    drop(stream);

    // A second move onto the occupied name collides.
    {
        let mut stream = fs
            .open_file("\\src\\f.bin", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(b"other").unwrap();
        stream.flush().unwrap();
    }
    assert!(matches!(
        fs.move_file("\\src\\f.bin", "\\dst\\f.bin", false),
        Err(Error::Fs(FsError::AlreadyExists))
    ));
    // With overwrite the old content is replaced.
    fs.move_file("\\src\\f.bin", "\\dst\\f.bin", true).unwrap();
    let mut stream = fs
        .open_file("\\dst\\f.bin", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), b"other");
}

#[test]
fn case_insensitive_paths() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    fs.create_dir("\\Docs").unwrap();
    {
        let mut stream = fs
            .open_file("\\Docs\\Letter.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(b"dear").unwrap();
        stream.flush().unwrap();
    }
    for variant in ["\\DOCS\\LETTER.TXT", "\\docs\\letter.txt", "\\DoCs\\LeTtEr.TxT"] {
        assert!(fs.file_exists(variant).unwrap(), "{variant}");
        assert_eq!(fs.file_length(variant).unwrap(), 4);
    }
    // The display name keeps its original case.
    assert_eq!(
        fs.files("\\docs", None, false).unwrap(),
        vec!["\\docs\\Letter.txt".to_string()]
    );
}

#[test]
fn wildcard_listing() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    fs.create_dir("\\d").unwrap();
    for name in ["\\a.txt", "\\b.txt", "\\c.bin", "\\d\\e.txt"] {
        drop(
            fs.open_file(name, FileMode::Create, FileAccess::ReadWrite)
                .unwrap(),
        );
    }
    let mut txt = fs.files("\\", Some("*.txt"), false).unwrap();
    txt.sort();
    assert_eq!(txt, vec!["\\a.txt".to_string(), "\\b.txt".to_string()]);

    let mut all_txt = fs.files("\\", Some("*.txt"), true).unwrap();
    all_txt.sort();
    assert_eq!(
        all_txt,
        vec![
            "\\a.txt".to_string(),
            "\\b.txt".to_string(),
            "\\d\\e.txt".to_string()
        ]
    );

    let single = fs.files("\\", Some("?.bin"), false).unwrap();
    assert_eq!(single, vec!["\\c.bin".to_string()]);
}

#[test]
fn delete_dir_requires_empty() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    fs.create_dir("\\d").unwrap();
    drop(
        fs.open_file("\\d\\f.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap(),
    );
    assert!(matches!(
        fs.delete_dir("\\d"),
        Err(Error::Fs(FsError::DirectoryNotEmpty))
    ));
    fs.delete_file("\\d\\f.txt").unwrap();
    fs.delete_dir("\\d").unwrap();
    assert!(!fs.dir_exists("\\d").unwrap());
}

#[test]
fn intermediate_file_is_not_a_directory() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    drop(
        fs.open_file("\\plain.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap(),
    );
    assert!(matches!(
        fs.open_file("\\plain.txt\\inner", FileMode::Open, FileAccess::Read),
        Err(Error::Fs(FsError::NotADirectory))
    ));
    assert!(matches!(
        fs.file_length("\\plain.txt\\inner"),
        Err(Error::Fs(FsError::NotADirectory))
    ));
}

#[test]
fn attributes_and_times() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    drop(
        fs.open_file("\\f.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap(),
    );
    let attrs = fs.attributes("\\f.txt").unwrap();
    assert!(attrs.contains(opal_fs::FileAttributes::ARCHIVE));
    fs.set_attributes(
        "\\f.txt",
        opal_fs::FileAttributes::READ_ONLY | opal_fs::FileAttributes::HIDDEN,
    )
    .unwrap();
    let attrs = fs.attributes("\\f.txt").unwrap();
    assert!(attrs.is_read_only());
    assert!(attrs.contains(opal_fs::FileAttributes::HIDDEN));
    assert!(!attrs.is_directory());

    // A DOS-representable instant survives the on-disk format exactly.
    let at = Timestamp::from_unix(1_700_000_000 - 1_700_000_000 % 2);
    fs.set_last_write_time_utc("\\f.txt", at).unwrap();
    assert_eq!(fs.last_write_time_utc("\\f.txt").unwrap(), at);
    fs.set_creation_time_utc("\\f.txt", at).unwrap();
    assert_eq!(fs.creation_time_utc("\\f.txt").unwrap(), at);
}

#[test]
fn copy_file_duplicates_content() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
    {
        let mut stream = fs
            .open_file("\\orig.bin", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(&payload).unwrap();
        stream.flush().unwrap();
    }
    fs.copy_file("\\orig.bin", "\\copy.bin", false).unwrap();
    let mut stream = fs
        .open_file("\\copy.bin", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), payload);
    drop(stream);
    assert!(fs.file_exists("\\orig.bin").unwrap());
    assert!(matches!(
        fs.copy_file("\\orig.bin", "\\copy.bin", false),
        Err(Error::Fs(FsError::AlreadyExists))
    ));
}

#[test]
fn floppy_preset_is_fat12() {
    let storage = MemoryStorage::new();
    format_floppy(&storage, FloppyFormat::Floppy1440K, Some("BOOT")).unwrap();
    assert_eq!(storage.len().unwrap(), 2880 * 512);

    let fs = FatFileSystem::new(&storage).unwrap();
    assert_eq!(fs.variant(), FatVariant::Fat12);
    assert_eq!(fs.volume_label().unwrap(), "BOOT");
    {
        let mut stream = fs
            .open_file("\\kernel.sys", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(&vec![0xA5; 3000]).unwrap();
        stream.flush().unwrap();
    }
    let mut stream = fs
        .open_file("\\kernel.sys", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), vec![0xA5; 3000]);
}

#[test]
fn root_region_fills_to_no_space() {
    let storage = MemoryStorage::new();
    format_floppy(&storage, FloppyFormat::Floppy720K, None).unwrap();
    let fs = FatFileSystem::new(&storage).unwrap();
    // 112 fixed root slots; 8.3 names use one slot each, but these long
    // names need a slot for the LFN group too.
    let mut failed = None;
    for index in 0..200 {
        let result = fs.open_file(
            &format!("\\file-number-{index:03}.txt"),
            FileMode::CreateNew,
            FileAccess::ReadWrite,
        );
        match result {
            Ok(stream) => drop(stream),
            Err(error) => {
                failed = Some((index, error));
                break;
            }
        }
    }
    let (index, error) = failed.expect("the fixed root region must fill up");
    assert!(index <= 112, "failed only at {index}");
    assert!(matches!(error, Error::Fs(FsError::NoSpace)));
}

#[test]
fn move_dir_repoints_parent() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    fs.create_dir("\\from\\inner").unwrap();
    fs.create_dir("\\to").unwrap();
    drop(
        fs.open_file(
            "\\from\\inner\\keep.txt",
            FileMode::Create,
            FileAccess::ReadWrite,
        )
        .unwrap(),
    );

    fs.move_dir("\\from\\inner", "\\to\\inner").unwrap();
    assert!(!fs.dir_exists("\\from\\inner").unwrap());
    assert!(fs.file_exists("\\to\\inner\\keep.txt").unwrap());

    // Moving a directory into its own subtree is rejected.
    assert!(fs.move_dir("\\to", "\\to\\inner\\loop").is_err());
}

#[test]
fn read_only_mount_refuses_mutation() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::with_options(
        &storage,
        FsOptions {
            read_only: true,
            ..FsOptions::default()
        },
    )
    .unwrap();
    assert!(!fs.can_write());
    assert!(matches!(
        fs.create_dir("\\nope"),
        Err(Error::Fs(FsError::ReadOnly))
    ));
    assert!(matches!(
        fs.open_file("\\nope.txt", FileMode::Create, FileAccess::ReadWrite),
        Err(Error::Fs(FsError::ReadOnly))
    ));
}

#[test]
fn allocation_closure_after_mixed_operations() {
    let storage = fat16_image(16_384, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    let free_empty = fs.free_clusters();

    fs.create_dir("\\a").unwrap();
    for index in 0..8 {
        let mut stream = fs
            .open_file(
                &format!("\\a\\f{index}.bin"),
                FileMode::Create,
                FileAccess::ReadWrite,
            )
            .unwrap();
        stream.write_all(&vec![index as u8; 2048]).unwrap();
        stream.flush().unwrap();
    }
    for index in 0..8 {
        fs.delete_file(&format!("\\a\\f{index}.bin")).unwrap();
    }
    fs.delete_dir("\\a").unwrap();
    // Everything reachable was released; the free set is closed again.
    assert_eq!(fs.free_clusters(), free_empty);
}

#[test]
fn append_and_seek_extend() {
    let storage = fat16_image(20_480, None);
    let fs = FatFileSystem::new(&storage).unwrap();
    {
        let mut stream = fs
            .open_file("\\log.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap();
        stream.write_all(b"one").unwrap();
        stream.flush().unwrap();
    }
    {
        let mut stream = fs
            .open_file("\\log.txt", FileMode::Append, FileAccess::ReadWrite)
            .unwrap();
        assert_eq!(stream.position(), 3);
        stream.write_all(b"two").unwrap();
        stream.flush().unwrap();
    }
    {
        // Writing past the end zero-fills the gap.
        let mut stream = fs
            .open_file("\\log.txt", FileMode::Open, FileAccess::ReadWrite)
            .unwrap();
        stream.seek(std::io::SeekFrom::Start(10)).unwrap();
        stream.write_all(b"!").unwrap();
        stream.flush().unwrap();
    }
    let mut stream = fs
        .open_file("\\log.txt", FileMode::Open, FileAccess::Read)
        .unwrap();
    assert_eq!(stream.read_to_end().unwrap(), b"onetwo\0\0\0\0!");
}

#[test]
fn clock_is_injectable() {
    let storage = fat16_image(20_480, None);
    let at = Timestamp::from_unix(1_600_000_000 - 1_600_000_000 % 2);
    let fs = FatFileSystem::with_clock(
        &storage,
        FsOptions::default(),
        Box::new(opal_fs::FixedClock(at)),
    )
    .unwrap();
    drop(
        fs.open_file("\\stamped.txt", FileMode::Create, FileAccess::ReadWrite)
            .unwrap(),
    );
    assert_eq!(fs.creation_time_utc("\\stamped.txt").unwrap(), at);
}
