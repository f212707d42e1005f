// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Byte channels over regular files
//!
//! A channel caches a strong reference to its node at open time, so byte
//! transfers run under the file's own lock without touching the tree lock.
//! Open channels keep an unlinked node alive; the last close finalizes it.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::file::File;
use crate::regular::RegularFile;
use crate::state::FileSystem;
use crate::tree::{self, LinkPolicy};

/// How a channel is opened.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    /// Create the file if missing (requires `write`).
    pub create: bool,
    /// Create the file, failing if it already exists (requires `write`).
    pub create_new: bool,
    /// Truncate to zero length on open (requires `write`).
    pub truncate: bool,
    /// Every write lands at the end of the file, atomically.
    pub append: bool,
}

impl OpenOptions {
    pub fn reading() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    pub fn writing() -> Self {
        Self {
            write: true,
            create: true,
            truncate: true,
            ..Self::default()
        }
    }

    pub fn appending() -> Self {
        Self {
            write: true,
            create: true,
            append: true,
            ..Self::default()
        }
    }
}

impl FileSystem {
    /// Opens a byte channel on a regular file, following symbolic links.
    pub fn open(&self, path: &str, options: &OpenOptions) -> FsResult<FileChannel<'_>> {
        self.check_open()?;
        if !options.read && !options.write {
            return Err(FsError::InvalidArgument(
                "channel must be opened for reading or writing".to_string(),
            ));
        }
        if options.append && !options.write {
            return Err(FsError::InvalidArgument("append requires write".to_string()));
        }

        let parsed = self.paths.parse(path)?;
        let mut table = self.tree.table.write().unwrap();
        let resolved = self.resolve_in(&table, &parsed, LinkPolicy::Follow, path)?;

        let file = match resolved.file {
            Some(id) => {
                if options.write && options.create_new {
                    return Err(FsError::AlreadyExists(path.to_string()));
                }
                let file = self.file_in(&table, id, path)?;
                if file.is_directory() {
                    return Err(FsError::IsADirectory(path.to_string()));
                }
                if options.write && options.truncate {
                    file.regular_content().expect("regular node").truncate(0);
                    file.set_last_modified_time(self.now());
                }
                file
            }
            None => {
                if !(options.write && (options.create || options.create_new)) {
                    return Err(FsError::NotFound(path.to_string()));
                }
                if !tree::is_linked(&table, &self.tree.roots, resolved.parent) {
                    return Err(FsError::NotFound(path.to_string()));
                }
                let file = self.make_regular(&mut table, &[])?;
                tree::link_entry(&table, resolved.parent, resolved.name.clone(), file.id());
                self.file_in(&table, resolved.parent, path)?.set_last_modified_time(self.now());
                file
            }
        };

        file.opened();
        self.open_channels.fetch_add(1, Ordering::SeqCst);
        debug!(path, "opened channel");
        Ok(FileChannel {
            fs: self,
            file,
            ctx: path.to_string(),
            read: options.read,
            write: options.write,
            append: options.append,
            position: 0,
            closed: false,
        })
    }

    /// Opens a read-only channel.
    pub fn new_input_stream(&self, path: &str) -> FsResult<FileChannel<'_>> {
        self.open(path, &OpenOptions::reading())
    }

    /// Opens a write channel that creates and truncates.
    pub fn new_output_stream(&self, path: &str) -> FsResult<FileChannel<'_>> {
        self.open(path, &OpenOptions::writing())
    }

    /// Alias for [`FileSystem::open`], named for façade layers.
    pub fn new_byte_channel(&self, path: &str, options: &OpenOptions) -> FsResult<FileChannel<'_>> {
        self.open(path, options)
    }
}

/// An open handle on a regular file with a seekable position.
///
/// Implements [`Read`], [`Write`] and [`Seek`]; positional `read_at`/
/// `write_at` never touch the position. Closing (or dropping) the last
/// channel on an unlinked node releases its blocks.
pub struct FileChannel<'fs> {
    fs: &'fs FileSystem,
    file: Arc<File>,
    ctx: String,
    read: bool,
    write: bool,
    append: bool,
    position: u64,
    closed: bool,
}

impl FileChannel<'_> {
    fn content(&self) -> &RegularFile {
        self.file.regular_content().expect("channel over a regular file")
    }

    fn check(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::Closed);
        }
        self.fs.check_open()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    pub fn size(&self) -> FsResult<u64> {
        self.check()?;
        Ok(self.content().size())
    }

    /// Positional read; returns 0 at or beyond the end of the file.
    pub fn read_at(&self, position: u64, buf: &mut [u8]) -> FsResult<usize> {
        self.check()?;
        if !self.read {
            return Err(FsError::AccessDenied(format!("channel not open for reading: {}", self.ctx)));
        }
        let n = self.content().read(position, buf);
        self.file.set_last_access_time(self.fs.now());
        Ok(n)
    }

    /// Positional write; a position past the end leaves a zero-filled hole.
    pub fn write_at(&self, position: u64, buf: &[u8]) -> FsResult<usize> {
        self.check()?;
        if !self.write {
            return Err(FsError::AccessDenied(format!("channel not open for writing: {}", self.ctx)));
        }
        let n = self.content().write(position, buf)?;
        self.file.set_last_modified_time(self.fs.now());
        Ok(n)
    }

    /// Truncates the file; the channel position is clamped to the new size.
    pub fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.check()?;
        if !self.write {
            return Err(FsError::AccessDenied(format!("channel not open for writing: {}", self.ctx)));
        }
        self.content().truncate(size);
        self.file.set_last_modified_time(self.fs.now());
        if self.position > size {
            self.position = size;
        }
        Ok(())
    }

    /// Closes the channel. The last close of an unlinked node finalizes it,
    /// returning its blocks to the pool.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.file.closed();
        self.fs.open_channels.fetch_sub(1, Ordering::SeqCst);
        self.fs.finalize_after_close(self.file.id());
    }
}

impl Read for FileChannel<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.position, buf).map_err(io::Error::from)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for FileChannel<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.append {
            self.check().map_err(io::Error::from)?;
            if !self.write {
                return Err(io::Error::from(FsError::AccessDenied(format!(
                    "channel not open for writing: {}",
                    self.ctx
                ))));
            }
            let pos = self.content().append(buf).map_err(io::Error::from)?;
            self.file.set_last_modified_time(self.fs.now());
            self.position = pos + buf.len() as u64;
            return Ok(buf.len());
        }
        let n = self.write_at(self.position, buf).map_err(io::Error::from)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FileChannel<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.size().map_err(io::Error::from)?;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.position as i64 + delta,
            SeekFrom::End(delta) => size as i64 + delta,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl Drop for FileChannel<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
