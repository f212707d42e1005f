// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File timestamps and the injectable time source

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A file timestamp with nanosecond resolution, counted from the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileTime(i64);

impl FileTime {
    pub const EPOCH: FileTime = FileTime(0);

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_seconds(secs: i64) -> Self {
        Self(secs * 1_000_000_000)
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_seconds(self) -> i64 {
        self.0 / 1_000_000_000
    }
}

impl std::fmt::Display for FileTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}s", self.0 / 1_000_000_000, self.0.rem_euclid(1_000_000_000))
    }
}

/// Source of file timestamps.
///
/// The filesystem takes this as a capability so tests can inject a
/// deterministic clock.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> FileTime;
}

/// Wall-clock time source backed by [`SystemTime`].
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> FileTime {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        FileTime::from_nanos(since_epoch.as_nanos() as i64)
    }
}

/// Interior-mutable timestamp cell, updatable under the tree read lock.
#[derive(Debug)]
pub(crate) struct TimeCell(AtomicI64);

impl TimeCell {
    pub(crate) fn new(t: FileTime) -> Self {
        Self(AtomicI64::new(t.as_nanos()))
    }

    pub(crate) fn get(&self) -> FileTime {
        FileTime::from_nanos(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, t: FileTime) {
        self.0.store(t.as_nanos(), Ordering::SeqCst);
    }
}
