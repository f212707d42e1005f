// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only utilities
//!
//! A deterministic clock for asserting on timestamps. Compiled into the
//! library so integration tests can inject it through
//! [`FileSystem::with_time_source`](crate::FileSystem::with_time_source).

use std::sync::atomic::{AtomicI64, Ordering};

use crate::time::{FileTime, TimeSource};

/// A virtual clock: returns the same instant until advanced, or ticks by a
/// fixed amount per query.
#[derive(Debug)]
pub struct FakeTimeSource {
    nanos: AtomicI64,
    tick: i64,
}

impl FakeTimeSource {
    /// A clock frozen at the epoch until [`advance`](Self::advance) is
    /// called.
    pub fn new() -> Self {
        Self {
            nanos: AtomicI64::new(0),
            tick: 0,
        }
    }

    /// A clock that moves forward `tick` nanoseconds on every query.
    pub fn ticking(tick: i64) -> Self {
        Self {
            nanos: AtomicI64::new(0),
            tick,
        }
    }

    pub fn advance(&self, nanos: i64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn current(&self) -> FileTime {
        FileTime::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Default for FakeTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for FakeTimeSource {
    fn now(&self) -> FileTime {
        FileTime::from_nanos(self.nanos.fetch_add(self.tick, Ordering::SeqCst))
    }
}
