// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end tests for the file-operations layer

use std::io::{Read, Write};
use std::sync::Arc;

use heapfs_core::testing::FakeTimeSource;
use heapfs_core::{
    BasicFileAttributes, Config, CopyOptions, Feature, FileSystem, FileTime, FsError, LinkPolicy,
    MoveOptions, OpenOptions,
};

/// Unix-style configuration with root `/`, working dir `/work`, block size 8.
fn small_block_fs() -> FileSystem {
    let config = Config::unix().to_builder().block_size(8).build();
    FileSystem::new(config).expect("config builds")
}

fn unix_fs() -> FileSystem {
    FileSystem::new(Config::unix()).expect("config builds")
}

fn read_all(fs: &FileSystem, path: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    fs.new_input_stream(path).expect("open for read").read_to_end(&mut buf).expect("read");
    buf
}

#[test]
fn test_create_write_read() {
    let fs = small_block_fs();
    fs.create_file("/work/a", &[]).unwrap();

    let mut out = fs.open(
        "/work/a",
        &OpenOptions {
            write: true,
            ..Default::default()
        },
    )
    .unwrap();
    out.write_all(b"hello").unwrap();
    drop(out);

    assert_eq!(read_all(&fs, "/work/a"), b"hello");
    let attrs: BasicFileAttributes = fs.read_attributes("/work/a", LinkPolicy::Follow).unwrap();
    assert!(attrs.is_regular_file);
    assert_eq!(attrs.size, 5);
}

#[test]
fn test_truncate_with_hole() {
    let fs = small_block_fs();
    let mut channel = fs.open(
        "/work/b",
        &OpenOptions {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        },
    )
    .unwrap();

    channel.write_at(0, b"abcdefgh").unwrap();
    channel.truncate(3).unwrap();
    channel.write_at(5, b"Z").unwrap();

    let mut buf = [0u8; 6];
    assert_eq!(channel.read_at(0, &mut buf).unwrap(), 6);
    assert_eq!(&buf, b"abc\0\0Z");
    assert_eq!(channel.size().unwrap(), 6);
}

#[test]
fn test_symlink_loop_fails() {
    let fs = unix_fs();
    fs.create_symbolic_link("/work/l1", "/work/l2", &[]).unwrap();
    fs.create_symbolic_link("/work/l2", "/work/l1", &[]).unwrap();

    assert!(matches!(fs.new_input_stream("/work/l1"), Err(FsError::LinkLoop(_))));
    assert!(matches!(
        fs.get_attribute("/work/l1", "basic:size", LinkPolicy::Follow),
        Err(FsError::LinkLoop(_))
    ));
}

#[test]
fn test_atomic_move_visibility() {
    let fs = unix_fs();
    fs.create_directory("/work/x", &[]).unwrap();
    fs.create_file("/work/x/f", &[]).unwrap();
    let key_before = fs.file_key("/work/x/f", LinkPolicy::Follow).unwrap();

    fs.move_file("/work/x", "/work/y", MoveOptions::default()).unwrap();

    assert!(fs.exists("/work/y/f", LinkPolicy::Follow));
    assert!(matches!(
        fs.file_key("/work/x/f", LinkPolicy::Follow),
        Err(FsError::NotFound(_))
    ));
    assert_eq!(fs.file_key("/work/y/f", LinkPolicy::Follow).unwrap(), key_before);
}

#[test]
fn test_unlink_with_open_handle() {
    let fs = small_block_fs();
    let channel = fs.open(
        "/work/c",
        &OpenOptions {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        },
    )
    .unwrap();
    channel.write_at(0, b"data").unwrap();

    fs.delete("/work/c").unwrap();
    assert!(!fs.exists("/work/c", LinkPolicy::Follow));

    // the open channel keeps the node and its bytes alive
    let mut buf = [0u8; 4];
    assert_eq!(channel.read_at(0, &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"data");
    assert!(fs.stats().allocated_blocks > 0);

    drop(channel);
    // last close finalized the node and returned its blocks
    assert_eq!(fs.stats().allocated_blocks, 0);
    assert!(matches!(
        fs.file_key("/work/c", LinkPolicy::Follow),
        Err(FsError::NotFound(_))
    ));
}

#[test]
fn test_attribute_wildcard_on_directory() {
    let fs = unix_fs();
    fs.create_directory("/work/d", &[]).unwrap();

    let map = fs.read_attributes_map("/work/d", "basic:*", LinkPolicy::Follow).unwrap();
    assert_eq!(map.len(), 9);
    for name in [
        "lastModifiedTime",
        "lastAccessTime",
        "creationTime",
        "size",
        "isRegularFile",
        "isDirectory",
        "isSymbolicLink",
        "isOther",
        "fileKey",
    ] {
        assert!(map.contains_key(name), "missing {name}");
    }
    assert_eq!(map["isDirectory"].as_bool(), Some(true));
    assert_eq!(map["size"].as_long(), Some(0));
}

#[test]
fn test_lookup_agrees_with_normalized_path() {
    let fs = unix_fs();
    fs.create_directory("/work/a", &[]).unwrap();
    fs.create_file("/work/a/b", &[]).unwrap();

    let raw = "/work/a/../a/./b";
    let normalized = fs.parse_path(raw).unwrap().normalize().to_string();
    assert_eq!(normalized, "/work/a/b");
    assert_eq!(
        fs.file_key(raw, LinkPolicy::Follow).unwrap(),
        fs.file_key(&normalized, LinkPolicy::Follow).unwrap()
    );
}

#[test]
fn test_append_round_trip() {
    let fs = small_block_fs();
    let mut channel = fs.open("/work/log", &OpenOptions::appending()).unwrap();
    channel.write_all(b"first-").unwrap();
    channel.write_all(b"second").unwrap();
    drop(channel);

    assert_eq!(read_all(&fs, "/work/log"), b"first-second");
}

#[test]
fn test_copy_produces_new_file_key() {
    let fs = unix_fs();
    fs.create_file("/work/src", &[]).unwrap();
    fs.new_output_stream("/work/src").unwrap().write_all(b"contents").unwrap();

    fs.copy("/work/src", "/work/dst", CopyOptions::default()).unwrap();
    assert_eq!(read_all(&fs, "/work/dst"), b"contents");
    assert_ne!(
        fs.file_key("/work/src", LinkPolicy::Follow).unwrap(),
        fs.file_key("/work/dst", LinkPolicy::Follow).unwrap()
    );

    // contents are independent after the copy
    fs.new_output_stream("/work/src").unwrap().write_all(b"changed").unwrap();
    assert_eq!(read_all(&fs, "/work/dst"), b"contents");
}

#[test]
fn test_copy_replace_existing() {
    let fs = unix_fs();
    fs.create_file("/work/src", &[]).unwrap();
    fs.create_file("/work/dst", &[]).unwrap();

    assert!(matches!(
        fs.copy("/work/src", "/work/dst", CopyOptions::default()),
        Err(FsError::AlreadyExists(_))
    ));
    fs.copy(
        "/work/src",
        "/work/dst",
        CopyOptions {
            replace_existing: true,
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn test_copy_directory_is_empty_at_destination() {
    let fs = unix_fs();
    fs.create_directory("/work/d", &[]).unwrap();
    fs.create_file("/work/d/inner", &[]).unwrap();

    fs.copy("/work/d", "/work/e", CopyOptions::default()).unwrap();
    assert!(fs.exists("/work/e", LinkPolicy::Follow));
    assert_eq!(fs.list("/work/e").unwrap(), Vec::<String>::new());
}

#[test]
fn test_copy_symlink_nofollow_copies_the_link() {
    let fs = unix_fs();
    fs.create_file("/work/target", &[]).unwrap();
    fs.create_symbolic_link("/work/link", "/work/target", &[]).unwrap();

    fs.copy(
        "/work/link",
        "/work/link2",
        CopyOptions {
            nofollow_links: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(fs.read_symbolic_link("/work/link2").unwrap(), "/work/target");

    // following copy duplicates the target file instead
    fs.copy("/work/link", "/work/plain", CopyOptions::default()).unwrap();
    assert!(fs
        .read_attributes::<BasicFileAttributes>("/work/plain", LinkPolicy::NoFollow)
        .unwrap()
        .is_regular_file);
}

#[test]
fn test_copy_attributes_preserves_times() {
    let fs = unix_fs();
    fs.create_file("/work/src", &[]).unwrap();
    let src: BasicFileAttributes = fs.read_attributes("/work/src", LinkPolicy::Follow).unwrap();

    fs.copy(
        "/work/src",
        "/work/with",
        CopyOptions {
            copy_attributes: true,
            ..Default::default()
        },
    )
    .unwrap();
    let with: BasicFileAttributes = fs.read_attributes("/work/with", LinkPolicy::Follow).unwrap();
    assert_eq!(with.creation_time, src.creation_time);
    assert_eq!(with.last_modified_time, src.last_modified_time);
}

#[test]
fn test_cross_instance_copy() {
    let unix = unix_fs();
    let windows = FileSystem::new(Config::windows()).unwrap();

    unix.create_file("/work/data.bin", &[]).unwrap();
    unix.new_output_stream("/work/data.bin").unwrap().write_all(b"payload").unwrap();

    unix.copy_to("/work/data.bin", &windows, "C:\\work\\data.bin", CopyOptions::default())
        .unwrap();
    assert_eq!(read_all(&windows, "C:\\work\\DATA.BIN"), b"payload");
}

#[test]
fn test_move_to_other_instance_is_cross_device() {
    let a = unix_fs();
    let b = unix_fs();
    a.create_file("/work/f", &[]).unwrap();
    assert!(matches!(
        a.move_to("/work/f", &b, "/work/f", MoveOptions::default()),
        Err(FsError::CrossDevice)
    ));
}

#[test]
fn test_hard_links_share_content() {
    let fs = unix_fs();
    fs.create_file("/work/orig", &[]).unwrap();
    fs.create_link("/work/alias", "/work/orig").unwrap();

    fs.new_output_stream("/work/orig").unwrap().write_all(b"shared").unwrap();
    assert_eq!(read_all(&fs, "/work/alias"), b"shared");
    assert_eq!(
        fs.file_key("/work/orig", LinkPolicy::Follow).unwrap(),
        fs.file_key("/work/alias", LinkPolicy::Follow).unwrap()
    );

    fs.delete("/work/orig").unwrap();
    assert_eq!(read_all(&fs, "/work/alias"), b"shared");
}

#[test]
fn test_hard_link_to_directory_fails() {
    let fs = unix_fs();
    fs.create_directory("/work/d", &[]).unwrap();
    assert!(matches!(
        fs.create_link("/work/alias", "/work/d"),
        Err(FsError::InvalidArgument(_))
    ));
}

#[test]
fn test_delete_refuses_non_empty_directory() {
    let fs = unix_fs();
    fs.create_directory("/work/d", &[]).unwrap();
    fs.create_file("/work/d/f", &[]).unwrap();

    assert!(matches!(fs.delete("/work/d"), Err(FsError::DirectoryNotEmpty(_))));
    fs.delete("/work/d/f").unwrap();
    fs.delete("/work/d").unwrap();
    assert!(!fs.exists("/work/d", LinkPolicy::Follow));
}

#[test]
fn test_delete_root_refused() {
    let fs = unix_fs();
    assert!(matches!(fs.delete("/"), Err(FsError::InvalidArgument(_))));
}

#[test]
fn test_relative_paths_resolve_against_working_directory() {
    let fs = unix_fs();
    fs.create_file("hello", &[]).unwrap();
    assert!(fs.exists("/work/hello", LinkPolicy::Follow));
    assert_eq!(fs.list(".").unwrap(), vec!["hello".to_string()]);
}

#[test]
fn test_deleted_working_directory_fails_relative_lookups() {
    let config = Config::unix().to_builder().working_directory("/work/inner").build();
    let fs = FileSystem::new(config).unwrap();
    fs.delete("/work/inner").unwrap();

    assert!(matches!(fs.create_file("orphan", &[]), Err(FsError::NotFound(_))));
    assert!(matches!(fs.list("."), Err(FsError::NotFound(_))));
    // absolute resolution still works
    fs.create_file("/work/ok", &[]).unwrap();
}

#[test]
fn test_out_of_space() {
    let config = Config::unix().to_builder().block_size(8).max_size(32).build();
    let fs = FileSystem::new(config).unwrap();
    let mut channel = fs.open("/work/big", &OpenOptions::writing()).unwrap();

    channel.write_all(&[1u8; 32]).unwrap();
    let err = channel.write_at(32, &[1u8; 8]).unwrap_err();
    assert!(matches!(err, FsError::OutOfSpace));
}

#[test]
fn test_freed_blocks_are_reused() {
    let config = Config::unix().to_builder().block_size(8).max_size(64).build();
    let fs = FileSystem::new(config).unwrap();

    fs.new_output_stream("/work/a").unwrap().write_all(&[1u8; 64]).unwrap();
    fs.delete("/work/a").unwrap();
    assert_eq!(fs.stats().allocated_blocks, 0);
    assert_eq!(fs.stats().cached_blocks, 8);

    fs.new_output_stream("/work/b").unwrap().write_all(&[2u8; 64]).unwrap();
    assert_eq!(fs.stats().allocated_blocks, 8);
}

#[test]
fn test_move_into_own_subtree_refused() {
    let fs = unix_fs();
    fs.create_directory("/work/a", &[]).unwrap();
    fs.create_directory("/work/a/b", &[]).unwrap();
    assert!(matches!(
        fs.move_file("/work/a", "/work/a/b/c", MoveOptions::default()),
        Err(FsError::InvalidArgument(_))
    ));
}

#[test]
fn test_atomic_move_refused_with_open_channel_in_subtree() {
    let fs = unix_fs();
    fs.create_directory("/work/tree", &[]).unwrap();
    fs.create_file("/work/tree/f", &[]).unwrap();
    let channel = fs.new_input_stream("/work/tree/f").unwrap();

    assert!(matches!(
        fs.move_file(
            "/work/tree",
            "/work/moved",
            MoveOptions {
                atomic_move: true,
                ..Default::default()
            }
        ),
        Err(FsError::AtomicViolation(_))
    ));

    // without the atomicity demand the move succeeds and the channel stays
    // usable
    fs.move_file("/work/tree", "/work/moved", MoveOptions::default()).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(channel.read_at(0, &mut buf).unwrap(), 0);
}

#[test]
fn test_move_replace_existing() {
    let fs = unix_fs();
    fs.create_file("/work/src", &[]).unwrap();
    fs.create_file("/work/dst", &[]).unwrap();

    assert!(matches!(
        fs.move_file("/work/src", "/work/dst", MoveOptions::default()),
        Err(FsError::AlreadyExists(_))
    ));
    fs.move_file(
        "/work/src",
        "/work/dst",
        MoveOptions {
            replace_existing: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!fs.exists("/work/src", LinkPolicy::Follow));
}

#[test]
fn test_symlinks_unsupported_on_windows_preset() {
    let fs = FileSystem::new(Config::windows()).unwrap();
    assert!(!fs.supported_features().contains(Feature::SYMBOLIC_LINKS));
    assert!(matches!(
        fs.create_symbolic_link("C:\\work\\l", "C:\\work\\t", &[]),
        Err(FsError::Unsupported(_))
    ));
}

#[test]
fn test_read_symbolic_link_of_regular_file_fails() {
    let fs = unix_fs();
    fs.create_file("/work/f", &[]).unwrap();
    assert!(matches!(
        fs.read_symbolic_link("/work/f"),
        Err(FsError::InvalidArgument(_))
    ));
}

#[test]
fn test_create_through_dangling_symlink() {
    let fs = unix_fs();
    fs.create_symbolic_link("/work/link", "/work/real", &[]).unwrap();

    // opening for write through the dangling link creates the target
    fs.new_output_stream("/work/link").unwrap().write_all(b"x").unwrap();
    assert!(fs.exists("/work/real", LinkPolicy::NoFollow));
    assert_eq!(read_all(&fs, "/work/real"), b"x");
}

#[test]
fn test_nlink_counts_via_unix_view() {
    let config = Config::unix().to_builder().attribute_views(["unix"]).build();
    let fs = FileSystem::new(config).unwrap();

    fs.create_directory("/work/d", &[]).unwrap();
    // parent entry + own `.`
    assert_eq!(
        fs.get_attribute("/work/d", "unix:nlink", LinkPolicy::Follow).unwrap().as_long(),
        Some(2)
    );
    fs.create_directory("/work/d/sub", &[]).unwrap();
    // plus the child's `..`
    assert_eq!(
        fs.get_attribute("/work/d", "unix:nlink", LinkPolicy::Follow).unwrap().as_long(),
        Some(3)
    );

    fs.create_file("/work/f", &[]).unwrap();
    fs.create_link("/work/f2", "/work/f").unwrap();
    assert_eq!(
        fs.get_attribute("/work/f", "unix:nlink", LinkPolicy::Follow).unwrap().as_long(),
        Some(2)
    );
}

#[test]
fn test_close_releases_everything() {
    let fs = small_block_fs();
    fs.new_output_stream("/work/f").unwrap().write_all(&[9u8; 64]).unwrap();
    assert!(fs.stats().resident_bytes > 0);

    fs.close();
    assert_eq!(fs.stats().resident_bytes, 0);
    assert_eq!(fs.stats().files, 0);
    assert!(matches!(fs.new_input_stream("/work/f"), Err(FsError::Closed)));
}

#[test]
fn test_channel_fails_after_filesystem_close() {
    let fs = unix_fs();
    fs.create_file("/work/f", &[]).unwrap();
    let channel = fs.new_input_stream("/work/f").unwrap();
    fs.close();

    let mut buf = [0u8; 1];
    assert!(matches!(channel.read_at(0, &mut buf), Err(FsError::Closed)));
}

#[test]
fn test_list_is_ordered_and_typed() {
    let fs = unix_fs();
    fs.create_file("/work/b", &[]).unwrap();
    fs.create_file("/work/a", &[]).unwrap();
    fs.create_directory("/work/c", &[]).unwrap();

    assert_eq!(fs.list("/work").unwrap(), vec!["a", "b", "c"]);
    assert!(matches!(fs.list("/work/a"), Err(FsError::NotADirectory(_))));
}

#[test]
fn test_injected_clock_stamps_file_times() {
    let clock = Arc::new(FakeTimeSource::new());
    let fs = FileSystem::with_time_source(Config::unix(), clock.clone()).unwrap();
    fs.create_file("/work/f", &[]).unwrap();

    let attrs: BasicFileAttributes = fs.read_attributes("/work/f", LinkPolicy::Follow).unwrap();
    assert_eq!(attrs.creation_time, FileTime::EPOCH);
    assert_eq!(attrs.last_modified_time, FileTime::EPOCH);

    clock.advance(1_000);
    fs.new_output_stream("/work/f").unwrap().write_all(b"x").unwrap();
    let attrs: BasicFileAttributes = fs.read_attributes("/work/f", LinkPolicy::Follow).unwrap();
    assert_eq!(attrs.last_modified_time, FileTime::from_nanos(1_000));
    assert_eq!(attrs.creation_time, FileTime::EPOCH);
}

#[test]
fn test_case_insensitive_entries_preserve_display_form() {
    let fs = FileSystem::new(Config::osx()).unwrap();
    fs.create_file("/work/ReadMe.txt", &[]).unwrap();

    assert!(fs.exists("/work/readme.TXT", LinkPolicy::Follow));
    assert_eq!(fs.list("/work").unwrap(), vec!["ReadMe.txt"]);
    assert!(matches!(
        fs.create_file("/work/README.TXT", &[]),
        Err(FsError::AlreadyExists(_))
    ));
}
