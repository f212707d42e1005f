// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! heapfs: an in-memory virtual filesystem engine
//!
//! A hierarchical file tree backed entirely by process-resident data
//! structures, for tests, sandboxes and ephemeral computation. The engine
//! covers path resolution with symbolic links, block-based regular-file
//! storage, an extensible attribute-view registry and a coarse tree lock
//! that keeps structural mutation linearizable.
//!
//! ```
//! use heapfs_core::{Config, FileSystem, LinkPolicy};
//! use std::io::{Read, Write};
//!
//! let fs = FileSystem::new(Config::unix()).unwrap();
//! fs.create_file("/work/hello.txt", &[]).unwrap();
//!
//! let mut out = fs.new_output_stream("/work/hello.txt").unwrap();
//! out.write_all(b"hello world").unwrap();
//! drop(out);
//!
//! let mut text = String::new();
//! fs.new_input_stream("/work/hello.txt").unwrap().read_to_string(&mut text).unwrap();
//! assert_eq!(text, "hello world");
//! assert!(fs.exists("hello.txt", LinkPolicy::Follow)); // relative to /work
//! ```
//!
//! The instance is process-local and volatile: nothing is persisted, and
//! `close` (or drop) releases every block.

pub mod attr;
mod block;
mod channel;
mod config;
mod dir;
mod error;
mod file;
mod name;
mod ops;
mod path;
mod regular;
mod state;
pub mod testing;
mod time;
mod tree;

pub use attr::value::{
    AttributeType, AttributeValue, GroupPrincipal, PosixPermission, UserPrincipal,
};
pub use attr::views::{
    BasicFileAttributeView, DosFileAttributeView, OwnerFileAttributeView, PosixFileAttributeView,
    UserDefinedFileAttributeView,
};
pub use attr::{
    AttributeProvider, AttributeService, AttributeSpec, BasicFileAttributes, DosFileAttributes,
    PosixFileAttributes, ReadableAttributes,
};
pub use channel::{FileChannel, OpenOptions};
pub use config::{Config, ConfigBuilder, Feature};
pub use error::{FsError, FsResult};
pub use file::{File, FileId};
pub use name::{Name, Normalization};
pub use ops::{CopyOptions, MoveOptions};
pub use path::{PathStyle, VPath};
pub use state::{FileSystem, FsStats};
pub use time::{FileTime, SystemTimeSource, TimeSource};
pub use tree::LinkPolicy;
