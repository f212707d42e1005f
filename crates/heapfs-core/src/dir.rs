// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory entry tables

use std::collections::BTreeMap;

use crate::file::FileId;
use crate::name::Name;

/// The ordered entry map of one directory.
///
/// The `.` and `..` sentinels are stored as real entries under their reserved
/// names; `snapshot`, `child_count` and `is_empty` exclude them. Equality of
/// entry names follows the canonical form of [`Name`], so a case-insensitive
/// configuration collides `Foo` with `foo` while each entry keeps the display
/// form it was created with.
pub(crate) struct DirectoryTable {
    entries: BTreeMap<Name, FileId>,
}

impl DirectoryTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&self, name: &Name) -> Option<FileId> {
        self.entries.get(name).copied()
    }

    pub(crate) fn insert(&mut self, name: Name, id: FileId) {
        self.entries.insert(name, id);
    }

    pub(crate) fn remove(&mut self, name: &Name) -> Option<FileId> {
        self.entries.remove(name)
    }

    pub(crate) fn set_self(&mut self, id: FileId) {
        self.entries.insert(Name::self_name(), id);
    }

    pub(crate) fn set_parent(&mut self, id: FileId) {
        self.entries.insert(Name::parent_name(), id);
    }

    pub(crate) fn parent(&self) -> Option<FileId> {
        self.entries.get(&Name::parent_name()).copied()
    }

    pub(crate) fn remove_parent(&mut self) -> Option<FileId> {
        self.entries.remove(&Name::parent_name())
    }

    pub(crate) fn remove_self(&mut self) -> Option<FileId> {
        self.entries.remove(&Name::self_name())
    }

    /// A stable snapshot of the real entries, ordered by canonical name.
    pub(crate) fn snapshot(&self) -> Vec<(Name, FileId)> {
        self.entries
            .iter()
            .filter(|(name, _)| !name.is_reserved())
            .map(|(name, id)| (name.clone(), *id))
            .collect()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.entries.keys().filter(|name| !name.is_reserved()).count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.child_count() == 0
    }
}
