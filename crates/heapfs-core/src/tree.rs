// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The file tree: node table and path resolution

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::error::{FsError, FsResult};
use crate::file::{File, FileId};
use crate::name::Name;
use crate::path::VPath;

/// Whether a terminal symbolic link is followed during resolution.
/// Intermediate links are always followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkPolicy {
    #[default]
    Follow,
    NoFollow,
}

/// Owner of every node. Directory entries refer to nodes by [`FileId`] and
/// are resolved through this table; removing a node here is what finally
/// frees it.
pub(crate) struct FileTable {
    files: HashMap<FileId, Arc<File>>,
    next_id: u64,
}

impl FileTable {
    pub(crate) fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> FileId {
        let id = FileId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, file: File) -> Arc<File> {
        let arc = Arc::new(file);
        self.files.insert(arc.id(), arc.clone());
        arc
    }

    pub(crate) fn get(&self, id: FileId) -> Option<Arc<File>> {
        self.files.get(&id).cloned()
    }

    pub(crate) fn remove(&mut self, id: FileId) -> Option<Arc<File>> {
        self.files.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn clear(&mut self) {
        self.files.clear();
    }
}

/// The directory graph: the locked node table plus the root directories.
///
/// The `RwLock` here is the filesystem-wide tree lock. Lookups take the read
/// side; every mutating verb holds the write side for its whole duration so
/// resolution and parent mutation appear atomic.
pub(crate) struct FileTree {
    pub(crate) table: RwLock<FileTable>,
    pub(crate) roots: BTreeMap<Name, FileId>,
}

/// Result of resolving a path: the parent directory that holds (or would
/// hold) the entry, the final name, and the target if it exists.
#[derive(Clone, Debug)]
pub(crate) struct Resolved {
    pub(crate) parent: FileId,
    pub(crate) name: Name,
    pub(crate) file: Option<FileId>,
}

impl Resolved {
    pub(crate) fn require_exists(&self, ctx: &str) -> FsResult<FileId> {
        self.file.ok_or_else(|| FsError::NotFound(ctx.to_string()))
    }

    pub(crate) fn require_absent(&self, ctx: &str) -> FsResult<()> {
        if self.file.is_some() {
            return Err(FsError::AlreadyExists(ctx.to_string()));
        }
        Ok(())
    }
}

/// Resolves `path` against `base`, walking `.`, `..` and symbolic links.
///
/// Succeeds with `file: None` when everything but the final segment exists;
/// a missing intermediate segment is an error. The symlink traversal counter
/// is shared across the whole resolution and fails with a loop error past
/// `limit`.
pub(crate) fn lookup(
    table: &FileTable,
    roots: &BTreeMap<Name, FileId>,
    base: FileId,
    path: &VPath,
    policy: LinkPolicy,
    limit: usize,
    ctx: &str,
) -> FsResult<Resolved> {
    let mut depth = 0usize;
    lookup_inner(table, roots, base, path, policy, limit, ctx, &mut depth)
}

#[allow(clippy::too_many_arguments)]
fn lookup_inner(
    table: &FileTable,
    roots: &BTreeMap<Name, FileId>,
    base: FileId,
    path: &VPath,
    policy: LinkPolicy,
    limit: usize,
    ctx: &str,
    depth: &mut usize,
) -> FsResult<Resolved> {
    let mut current = match path.root() {
        Some(root) => *roots.get(root).ok_or_else(|| FsError::NotFound(ctx.to_string()))?,
        None => base,
    };
    if table.get(current).is_none() {
        // deleted working directory or stale base
        return Err(FsError::NotFound(ctx.to_string()));
    }

    let names = path.names();
    if names.is_empty() {
        return Ok(Resolved {
            parent: current,
            name: Name::self_name(),
            file: Some(current),
        });
    }

    for (i, name) in names.iter().enumerate() {
        let last = i + 1 == names.len();
        let dir_file = table.get(current).ok_or_else(|| FsError::NotFound(ctx.to_string()))?;
        let Some(dir) = dir_file.dir() else {
            return Err(FsError::NotADirectory(ctx.to_string()));
        };

        if name.is_self() {
            if last {
                return Ok(Resolved {
                    parent: current,
                    name: Name::self_name(),
                    file: Some(current),
                });
            }
            continue;
        }
        if name.is_parent() {
            let parent = dir
                .lock()
                .unwrap()
                .parent()
                .ok_or_else(|| FsError::NotFound(ctx.to_string()))?;
            if last {
                return Ok(Resolved {
                    parent,
                    name: Name::self_name(),
                    file: Some(parent),
                });
            }
            current = parent;
            continue;
        }

        let child_id = dir.lock().unwrap().get(name);
        match child_id {
            None => {
                if last {
                    return Ok(Resolved {
                        parent: current,
                        name: name.clone(),
                        file: None,
                    });
                }
                return Err(FsError::NotFound(ctx.to_string()));
            }
            Some(child_id) => {
                let child =
                    table.get(child_id).ok_or_else(|| FsError::NotFound(ctx.to_string()))?;
                if child.is_symbolic_link() && (!last || policy == LinkPolicy::Follow) {
                    *depth += 1;
                    if *depth > limit {
                        return Err(FsError::LinkLoop(ctx.to_string()));
                    }
                    let target = child.symlink_target().expect("symlink node").clone();
                    let resolved = lookup_inner(
                        table,
                        roots,
                        current,
                        &target,
                        LinkPolicy::Follow,
                        limit,
                        ctx,
                        depth,
                    )?;
                    if last {
                        return Ok(resolved);
                    }
                    match resolved.file {
                        Some(f) => current = f,
                        None => return Err(FsError::NotFound(ctx.to_string())),
                    }
                } else if last {
                    return Ok(Resolved {
                        parent: current,
                        name: name.clone(),
                        file: Some(child_id),
                    });
                } else {
                    current = child_id;
                }
            }
        }
    }
    unreachable!("loop returns on the last segment")
}

/// Inserts `child` into `parent` under `name`, maintaining link counts and,
/// for directories, the `..` sentinel. The caller has checked the name is
/// free.
pub(crate) fn link_entry(table: &FileTable, parent_id: FileId, name: Name, child_id: FileId) {
    let parent = table.get(parent_id).expect("parent in table");
    let child = table.get(child_id).expect("child in table");

    parent.dir().expect("parent is a directory").lock().unwrap().insert(name, child_id);
    child.increment_links();

    if let Some(child_dir) = child.dir() {
        child_dir.lock().unwrap().set_parent(parent_id);
        parent.increment_links();
    }
}

/// Removes the entry `name` from `parent`, maintaining link counts and the
/// `..` sentinel of an unlinked directory. Returns the unlinked node's id.
pub(crate) fn unlink_entry(table: &FileTable, parent_id: FileId, name: &Name) -> Option<FileId> {
    let parent = table.get(parent_id)?;
    let child_id = parent.dir()?.lock().unwrap().remove(name)?;
    let child = table.get(child_id)?;
    child.decrement_links();

    if let Some(child_dir) = child.dir() {
        child_dir.lock().unwrap().remove_parent();
        parent.decrement_links();
    }
    Some(child_id)
}

/// Whether `id` is reachable from a root by walking `..` entries. Entries may
/// only be added under a linked directory.
pub(crate) fn is_linked(table: &FileTable, roots: &BTreeMap<Name, FileId>, id: FileId) -> bool {
    let mut current = id;
    // bounded walk; the tree has no hard-link cycles among directories
    for _ in 0..4096 {
        if roots.values().any(|root| *root == current) {
            return true;
        }
        let Some(file) = table.get(current) else {
            return false;
        };
        let Some(dir) = file.dir() else {
            return false;
        };
        let Some(parent) = dir.lock().unwrap().parent() else {
            return false;
        };
        if parent == current {
            return false;
        }
        current = parent;
    }
    false
}
