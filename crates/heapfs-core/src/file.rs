// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Filesystem nodes: a shared header plus a tagged kind

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::attr::value::AttributeValue;
use crate::dir::DirectoryTable;
use crate::path::VPath;
use crate::regular::RegularFile;
use crate::time::{FileTime, TimeCell};

/// Stable node identifier; surfaced as `basic:fileKey`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub(crate) u64);

impl FileId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three node kinds.
pub(crate) enum FileKind {
    Directory(Mutex<DirectoryTable>),
    Regular(RegularFile),
    Symlink(VPath),
}

/// A filesystem node.
///
/// The node table owns every `File` behind an `Arc`; directory entries refer
/// to nodes by id only, while open channels hold strong references. Link and
/// open counts are mutated under the tree lock; timestamps and the attribute
/// bag have their own interior locks so attribute reads never contend with
/// structural mutation.
pub struct File {
    id: FileId,
    kind: FileKind,
    nlinks: AtomicU32,
    open_count: AtomicU32,
    created: TimeCell,
    modified: TimeCell,
    accessed: TimeCell,
    attrs: Mutex<BTreeMap<String, AttributeValue>>,
}

impl File {
    fn new(id: FileId, kind: FileKind, now: FileTime) -> Self {
        Self {
            id,
            kind,
            nlinks: AtomicU32::new(0),
            open_count: AtomicU32::new(0),
            created: TimeCell::new(now),
            modified: TimeCell::new(now),
            accessed: TimeCell::new(now),
            attrs: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn directory(id: FileId, now: FileTime) -> Self {
        Self::new(id, FileKind::Directory(Mutex::new(DirectoryTable::new())), now)
    }

    pub(crate) fn regular(id: FileId, now: FileTime, content: RegularFile) -> Self {
        Self::new(id, FileKind::Regular(content), now)
    }

    pub(crate) fn symlink(id: FileId, now: FileTime, target: VPath) -> Self {
        Self::new(id, FileKind::Symlink(target), now)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, FileKind::Directory(_))
    }

    pub fn is_regular_file(&self) -> bool {
        matches!(self.kind, FileKind::Regular(_))
    }

    pub fn is_symbolic_link(&self) -> bool {
        matches!(self.kind, FileKind::Symlink(_))
    }

    /// Logical byte size; zero for directories and symbolic links.
    pub fn size(&self) -> u64 {
        match &self.kind {
            FileKind::Regular(content) => content.size(),
            _ => 0,
        }
    }

    pub fn link_count(&self) -> u32 {
        self.nlinks.load(Ordering::SeqCst)
    }

    pub(crate) fn increment_links(&self) {
        self.nlinks.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn decrement_links(&self) {
        self.nlinks.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn open_count(&self) -> u32 {
        self.open_count.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) {
        self.open_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn closed(&self) {
        self.open_count.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn dir(&self) -> Option<&Mutex<DirectoryTable>> {
        match &self.kind {
            FileKind::Directory(table) => Some(table),
            _ => None,
        }
    }

    pub(crate) fn regular_content(&self) -> Option<&RegularFile> {
        match &self.kind {
            FileKind::Regular(content) => Some(content),
            _ => None,
        }
    }

    pub(crate) fn symlink_target(&self) -> Option<&VPath> {
        match &self.kind {
            FileKind::Symlink(target) => Some(target),
            _ => None,
        }
    }

    pub fn creation_time(&self) -> FileTime {
        self.created.get()
    }

    pub fn last_modified_time(&self) -> FileTime {
        self.modified.get()
    }

    pub fn last_access_time(&self) -> FileTime {
        self.accessed.get()
    }

    pub fn set_creation_time(&self, t: FileTime) {
        self.created.set(t);
    }

    pub fn set_last_modified_time(&self, t: FileTime) {
        self.modified.set(t);
    }

    pub fn set_last_access_time(&self, t: FileTime) {
        self.accessed.set(t);
    }

    /// Reads one stored attribute from this node's bag.
    pub fn stored_attribute(&self, view: &str, name: &str) -> Option<AttributeValue> {
        self.attrs.lock().unwrap().get(&bag_key(view, name)).cloned()
    }

    /// Stores one attribute in this node's bag.
    pub fn set_stored_attribute(&self, view: &str, name: &str, value: AttributeValue) {
        self.attrs.lock().unwrap().insert(bag_key(view, name), value);
    }

    pub fn remove_stored_attribute(&self, view: &str, name: &str) -> Option<AttributeValue> {
        self.attrs.lock().unwrap().remove(&bag_key(view, name))
    }

    /// Names of the attributes stored for `view`, in sorted order.
    pub fn stored_attribute_names(&self, view: &str) -> Vec<String> {
        let prefix = format!("{view}:");
        self.attrs
            .lock()
            .unwrap()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Copies the whole attribute bag and all three timestamps onto `other`.
    pub(crate) fn copy_attributes_to(&self, other: &File) {
        let attrs = self.attrs.lock().unwrap().clone();
        *other.attrs.lock().unwrap() = attrs;
        other.created.set(self.created.get());
        other.modified.set(self.modified.get());
        other.accessed.set(self.accessed.get());
    }
}

fn bag_key(view: &str, name: &str) -> String {
    format!("{view}:{name}")
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            FileKind::Directory(_) => "directory",
            FileKind::Regular(_) => "regular",
            FileKind::Symlink(_) => "symlink",
        };
        f.debug_struct("File")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("nlinks", &self.link_count())
            .finish()
    }
}
