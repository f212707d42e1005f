// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Block-backed byte store for regular files

use std::sync::{Arc, RwLock};

use crate::block::{Block, BlockPool};
use crate::error::FsResult;

struct RegInner {
    blocks: Vec<Block>,
    size: u64,
}

/// A regular file's contents: a growing vector of pool blocks plus the
/// logical size.
///
/// Invariant: `size <= blocks.len() * block_size`, and every byte in
/// `[size, blocks.len() * block_size)` is zero.
///
/// Reads take the file's read lock, writes and truncation the write lock;
/// the filesystem tree lock is never held across these operations.
pub(crate) struct RegularFile {
    pool: Arc<BlockPool>,
    inner: RwLock<RegInner>,
}

impl RegularFile {
    pub(crate) fn new(pool: Arc<BlockPool>) -> Self {
        Self {
            pool,
            inner: RwLock::new(RegInner {
                blocks: Vec::new(),
                size: 0,
            }),
        }
    }

    pub(crate) fn size(&self) -> u64 {
        self.inner.read().unwrap().size
    }

    pub(crate) fn block_count(&self) -> usize {
        self.inner.read().unwrap().blocks.len()
    }

    /// Copies bytes at `pos` into `dst`, returning how many were copied.
    /// Returns 0 at or beyond the current size.
    pub(crate) fn read(&self, pos: u64, dst: &mut [u8]) -> usize {
        let inner = self.inner.read().unwrap();
        if pos >= inner.size || dst.is_empty() {
            return 0;
        }
        let block_size = self.pool.block_size() as u64;
        let n = std::cmp::min(dst.len() as u64, inner.size - pos) as usize;
        let mut copied = 0usize;
        while copied < n {
            let abs = pos + copied as u64;
            let block = (abs / block_size) as usize;
            let off = (abs % block_size) as usize;
            let chunk = std::cmp::min(n - copied, block_size as usize - off);
            inner.blocks[block].read(off, &mut dst[copied..copied + chunk]);
            copied += chunk;
        }
        n
    }

    /// Writes `src` at `pos`, growing the block vector as needed and updating
    /// the size. A write past the current size leaves a zero-filled hole.
    pub(crate) fn write(&self, pos: u64, src: &[u8]) -> FsResult<usize> {
        let mut inner = self.inner.write().unwrap();
        self.write_locked(&mut inner, pos, src)
    }

    /// Writes `src` at the current end of the file, atomically with respect
    /// to the size. Returns the position the bytes landed at.
    pub(crate) fn append(&self, src: &[u8]) -> FsResult<u64> {
        let mut inner = self.inner.write().unwrap();
        let pos = inner.size;
        self.write_locked(&mut inner, pos, src)?;
        Ok(pos)
    }

    fn write_locked(&self, inner: &mut RegInner, pos: u64, src: &[u8]) -> FsResult<usize> {
        if src.is_empty() {
            return Ok(0);
        }
        let block_size = self.pool.block_size() as u64;
        let end = pos + src.len() as u64;
        let needed = end.div_ceil(block_size) as usize;
        if needed > inner.blocks.len() {
            let fresh = self.pool.allocate(needed - inner.blocks.len())?;
            inner.blocks.extend(fresh);
        }
        let mut written = 0usize;
        while written < src.len() {
            let abs = pos + written as u64;
            let block = (abs / block_size) as usize;
            let off = (abs % block_size) as usize;
            let chunk = std::cmp::min(src.len() - written, block_size as usize - off);
            inner.blocks[block].write(off, &src[written..written + chunk]);
            written += chunk;
        }
        if end > inner.size {
            inner.size = end;
        }
        Ok(src.len())
    }

    /// Shrinks the file to `new_size`, returning surplus blocks to the pool
    /// and zeroing the tail of the last retained block. Growing is lazy: a
    /// `new_size` beyond the current size changes nothing, and reads of the
    /// gap see zeros.
    pub(crate) fn truncate(&self, new_size: u64) {
        let mut inner = self.inner.write().unwrap();
        if new_size >= inner.size {
            return;
        }
        let block_size = self.pool.block_size() as u64;
        let keep = new_size.div_ceil(block_size) as usize;
        if keep < inner.blocks.len() {
            let freed = inner.blocks.split_off(keep);
            self.pool.free(freed);
        }
        let tail_off = (new_size % block_size) as usize;
        if tail_off != 0 {
            let last = inner.blocks.len() - 1;
            inner.blocks[last].zero(tail_off, block_size as usize - tail_off);
        }
        inner.size = new_size;
    }

    /// Copies this file's contents into `dst` block-granular; see
    /// [`transfer_from`](Self::transfer_from).
    pub(crate) fn transfer_to(&self, dst: &RegularFile) -> FsResult<()> {
        dst.transfer_from(self)
    }

    /// Replaces this file's contents with a block-granular copy of `src`,
    /// without any intermediate buffer. The two files may belong to different
    /// pools.
    pub(crate) fn transfer_from(&self, src: &RegularFile) -> FsResult<()> {
        let src_inner = src.inner.read().unwrap();
        let mut inner = self.inner.write().unwrap();
        if !inner.blocks.is_empty() {
            let old = std::mem::take(&mut inner.blocks);
            self.pool.free(old);
        }
        let mut blocks = self.pool.allocate(src_inner.blocks.len())?;
        for (src_block, dst_block) in src_inner.blocks.iter().zip(blocks.iter_mut()) {
            src_block.copy_to(dst_block);
        }
        inner.blocks = blocks;
        inner.size = src_inner.size;
        Ok(())
    }
}

impl Drop for RegularFile {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap();
        let blocks = std::mem::take(&mut inner.blocks);
        if !blocks.is_empty() {
            self.pool.free(blocks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_file() -> RegularFile {
        RegularFile::new(Arc::new(BlockPool::new(8, 8 * 1024, None)))
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let file = small_file();
        assert_eq!(file.write(0, b"hello").unwrap(), 5);
        let mut buf = [0u8; 5];
        assert_eq!(file.read(0, &mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(file.size(), 5);
    }

    #[test]
    fn test_write_spanning_blocks() {
        let file = small_file();
        let data: Vec<u8> = (0..20).collect();
        file.write(3, &data).unwrap();
        assert_eq!(file.size(), 23);
        assert_eq!(file.block_count(), 3);

        let mut buf = vec![0u8; 20];
        assert_eq!(file.read(3, &mut buf), 20);
        assert_eq!(buf, data);
    }

    #[test]
    fn test_write_past_end_zero_fills_hole() {
        let file = small_file();
        file.write(0, b"abc").unwrap();
        file.write(10, b"Z").unwrap();
        let mut buf = vec![0xffu8; 11];
        assert_eq!(file.read(0, &mut buf), 11);
        assert_eq!(&buf, b"abc\0\0\0\0\0\0\0Z");
    }

    #[test]
    fn test_read_at_and_past_eof() {
        let file = small_file();
        file.write(0, b"data").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read(4, &mut buf), 0);
        assert_eq!(file.read(100, &mut buf), 0);
        assert_eq!(file.read(2, &mut buf), 2);
        assert_eq!(&buf[..2], b"ta");
    }

    #[test]
    fn test_truncate_frees_blocks_and_zeroes_tail() {
        let file = small_file();
        file.write(0, &[0xAA; 24]).unwrap();
        assert_eq!(file.block_count(), 3);

        file.truncate(3);
        assert_eq!(file.size(), 3);
        assert_eq!(file.block_count(), 1);

        // extending again must see zeros in the gap
        file.write(5, b"Z").unwrap();
        let mut buf = vec![0u8; 6];
        assert_eq!(file.read(0, &mut buf), 6);
        assert_eq!(&buf, b"\xAA\xAA\xAA\0\0Z");
    }

    #[test]
    fn test_truncate_is_idempotent() {
        let file = small_file();
        file.write(0, &[1u8; 16]).unwrap();
        file.truncate(5);
        let size = file.size();
        let count = file.block_count();
        file.truncate(5);
        assert_eq!(file.size(), size);
        assert_eq!(file.block_count(), count);
    }

    #[test]
    fn test_truncate_growing_is_lazy() {
        let file = small_file();
        file.write(0, b"ab").unwrap();
        file.truncate(100);
        assert_eq!(file.size(), 2);
        assert_eq!(file.block_count(), 1);
    }

    #[test]
    fn test_append_is_sequential() {
        let file = small_file();
        assert_eq!(file.append(b"abc").unwrap(), 0);
        assert_eq!(file.append(b"defg").unwrap(), 3);
        let mut buf = vec![0u8; 7];
        file.read(0, &mut buf);
        assert_eq!(&buf, b"abcdefg");
    }

    #[test]
    fn test_transfer_from_copies_blocks() {
        let pool = Arc::new(BlockPool::new(8, 8 * 64, None));
        let src = RegularFile::new(pool.clone());
        src.write(0, &[7u8; 20]).unwrap();

        let dst = RegularFile::new(pool);
        dst.transfer_from(&src).unwrap();
        assert_eq!(dst.size(), 20);
        let mut buf = vec![0u8; 20];
        dst.read(0, &mut buf);
        assert_eq!(buf, [7u8; 20]);

        // independent contents after the copy
        src.write(0, b"x").unwrap();
        dst.read(0, &mut buf[..1]);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_drop_returns_blocks_to_pool() {
        let pool = Arc::new(BlockPool::new(8, 8 * 64, None));
        {
            let file = RegularFile::new(pool.clone());
            file.write(0, &[1u8; 32]).unwrap();
            assert_eq!(pool.allocated_blocks(), 4);
        }
        assert_eq!(pool.allocated_blocks(), 0);
        assert_eq!(pool.cached_blocks(), 4);
    }
}
