// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Pooled arena of fixed-size byte blocks

use std::sync::Mutex;

use tracing::trace;

use crate::error::{FsError, FsResult};

/// One fixed-size byte block. Owned by a regular file while in use; contents
/// are guarded by the owning file's lock, not by the pool.
pub(crate) struct Block(Box<[u8]>);

impl Block {
    fn new_zeroed(size: usize) -> Self {
        Self(vec![0u8; size].into_boxed_slice())
    }

    pub(crate) fn read(&self, offset: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.0[offset..offset + dst.len()]);
    }

    pub(crate) fn write(&mut self, offset: usize, src: &[u8]) {
        self.0[offset..offset + src.len()].copy_from_slice(src);
    }

    pub(crate) fn zero(&mut self, offset: usize, len: usize) {
        self.0[offset..offset + len].fill(0);
    }

    pub(crate) fn copy_to(&self, other: &mut Block) {
        other.0.copy_from_slice(&self.0);
    }
}

struct PoolState {
    free: Vec<Block>,
    allocated: u64,
    closed: bool,
}

/// Fixed-size block pool.
///
/// Freed blocks are retained for reuse up to `max_cached` blocks; excess is
/// discarded. Allocation beyond `max_blocks` fails with out-of-space.
pub(crate) struct BlockPool {
    block_size: usize,
    max_blocks: u64,
    max_cached: u64,
    state: Mutex<PoolState>,
}

impl BlockPool {
    pub(crate) fn new(block_size: usize, max_size: u64, max_cache_size: Option<u64>) -> Self {
        let max_blocks = max_size / block_size as u64;
        let max_cached = match max_cache_size {
            Some(bytes) => bytes / block_size as u64,
            None => max_blocks,
        };
        Self {
            block_size,
            max_blocks,
            max_cached,
            state: Mutex::new(PoolState {
                free: Vec::new(),
                allocated: 0,
                closed: false,
            }),
        }
    }

    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    /// Hands out `count` zeroed blocks, reusing cached ones when available.
    pub(crate) fn allocate(&self, count: usize) -> FsResult<Vec<Block>> {
        let mut state = self.state.lock().unwrap();
        if state.allocated + count as u64 > self.max_blocks {
            return Err(FsError::OutOfSpace);
        }
        state.allocated += count as u64;
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            match state.free.pop() {
                Some(mut block) => {
                    block.zero(0, self.block_size);
                    blocks.push(block);
                }
                None => blocks.push(Block::new_zeroed(self.block_size)),
            }
        }
        trace!(count, allocated = state.allocated, "allocated blocks");
        Ok(blocks)
    }

    /// Returns blocks to the pool; blocks beyond the cache bound are dropped.
    pub(crate) fn free(&self, blocks: Vec<Block>) {
        let mut state = self.state.lock().unwrap();
        state.allocated = state.allocated.saturating_sub(blocks.len() as u64);
        if state.closed {
            return;
        }
        for block in blocks {
            if (state.free.len() as u64) < self.max_cached {
                state.free.push(block);
            }
        }
    }

    /// Drops the free list and stops caching; called when the filesystem
    /// closes.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.free.clear();
    }

    pub(crate) fn allocated_blocks(&self) -> u64 {
        self.state.lock().unwrap().allocated
    }

    pub(crate) fn cached_blocks(&self) -> u64 {
        self.state.lock().unwrap().free.len() as u64
    }

    /// Total process-resident bytes held by this pool's blocks, in use or
    /// cached.
    pub(crate) fn resident_bytes(&self) -> u64 {
        let state = self.state.lock().unwrap();
        (state.allocated + state.free.len() as u64) * self.block_size as u64
    }
}
