// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The file-operations layer: the verbs a filesystem-provider façade calls
//!
//! Every mutating verb holds the tree write lock for its whole duration, so
//! path resolution and parent mutation appear atomic to readers.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::attr::value::AttributeValue;
use crate::attr::ReadableAttributes;
use crate::config::Feature;
use crate::error::{FsError, FsResult};
use crate::file::{File, FileId};
use crate::state::FileSystem;
use crate::tree::{self, FileTable, LinkPolicy, Resolved};

/// Options for [`FileSystem::copy`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyOptions {
    /// Delete an existing destination entry first (an existing directory must
    /// be empty).
    pub replace_existing: bool,
    /// Carry the attribute bag and all timestamps over to the copy.
    pub copy_attributes: bool,
    /// Copy a terminal symbolic link itself instead of its target.
    pub nofollow_links: bool,
}

/// Options for [`FileSystem::move_file`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveOptions {
    pub replace_existing: bool,
    /// Demand atomicity observable through open channels: moving a directory
    /// subtree containing open channels is refused.
    pub atomic_move: bool,
}

impl FileSystem {
    /// Creates an empty regular file. Initial attribute overrides are
    /// `"view:attr"` specs applied with on-create semantics.
    pub fn create_file(&self, path: &str, attrs: &[(&str, AttributeValue)]) -> FsResult<()> {
        self.create_node(path, |fs, table| fs.make_regular(table, attrs))?;
        debug!(path, "created regular file");
        Ok(())
    }

    /// Creates an empty directory.
    pub fn create_directory(&self, path: &str, attrs: &[(&str, AttributeValue)]) -> FsResult<()> {
        self.create_node(path, |fs, table| fs.make_directory(table, attrs))?;
        debug!(path, "created directory");
        Ok(())
    }

    /// Creates a symbolic link holding `target` unresolved.
    pub fn create_symbolic_link(
        &self,
        path: &str,
        target: &str,
        attrs: &[(&str, AttributeValue)],
    ) -> FsResult<()> {
        if !self.config.features.contains(Feature::SYMBOLIC_LINKS) {
            return Err(FsError::Unsupported("symbolic links".to_string()));
        }
        let target = self.paths.parse(target)?;
        self.create_node(path, move |fs, table| fs.make_symlink(table, target, attrs))?;
        debug!(path, "created symbolic link");
        Ok(())
    }

    fn create_node<F>(&self, path: &str, make: F) -> FsResult<()>
    where
        F: FnOnce(&FileSystem, &mut FileTable) -> FsResult<Arc<File>>,
    {
        self.check_open()?;
        let parsed = self.paths.parse(path)?;
        let mut table = self.tree.table.write().unwrap();
        let resolved = self.resolve_in(&table, &parsed, LinkPolicy::NoFollow, path)?;
        resolved.require_absent(path)?;
        if !tree::is_linked(&table, &self.tree.roots, resolved.parent) {
            return Err(FsError::NotFound(path.to_string()));
        }
        let file = make(self, &mut table)?;
        tree::link_entry(&table, resolved.parent, resolved.name.clone(), file.id());
        let parent = self.file_in(&table, resolved.parent, path)?;
        parent.set_last_modified_time(self.now());
        Ok(())
    }

    /// Creates a hard link at `link` to the regular file at `existing`.
    pub fn create_link(&self, link: &str, existing: &str) -> FsResult<()> {
        if !self.config.features.contains(Feature::LINKS) {
            return Err(FsError::Unsupported("hard links".to_string()));
        }
        self.check_open()?;
        let link_parsed = self.paths.parse(link)?;
        let existing_parsed = self.paths.parse(existing)?;
        let mut table = self.tree.table.write().unwrap();

        let existing_res =
            self.resolve_in(&table, &existing_parsed, LinkPolicy::Follow, existing)?;
        let existing_id = existing_res.require_exists(existing)?;
        let existing_file = self.file_in(&table, existing_id, existing)?;
        if !existing_file.is_regular_file() {
            return Err(FsError::InvalidArgument(format!(
                "hard links are only supported for regular files: {existing}"
            )));
        }

        let link_res = self.resolve_in(&table, &link_parsed, LinkPolicy::NoFollow, link)?;
        link_res.require_absent(link)?;
        if !tree::is_linked(&table, &self.tree.roots, link_res.parent) {
            return Err(FsError::NotFound(link.to_string()));
        }
        tree::link_entry(&table, link_res.parent, link_res.name.clone(), existing_id);
        self.file_in(&table, link_res.parent, link)?.set_last_modified_time(self.now());
        debug!(link, existing, "created hard link");
        Ok(())
    }

    /// Deletes the entry at `path` without following a terminal symbolic
    /// link. A directory must be empty; the node is finalized once no open
    /// channel keeps it alive.
    pub fn delete(&self, path: &str) -> FsResult<()> {
        self.check_open()?;
        let parsed = self.paths.parse(path)?;
        let mut table = self.tree.table.write().unwrap();
        let resolved = self.resolve_in(&table, &parsed, LinkPolicy::NoFollow, path)?;
        resolved.require_exists(path)?;
        self.delete_resolved(&mut table, &resolved, path)?;
        debug!(path, "deleted");
        Ok(())
    }

    /// Shared removal path for `delete` and replace-existing copy/move.
    fn delete_resolved(
        &self,
        table: &mut FileTable,
        resolved: &Resolved,
        ctx: &str,
    ) -> FsResult<()> {
        let id = resolved.require_exists(ctx)?;
        if resolved.name.is_reserved() {
            // the root, `.` or `..`
            return Err(FsError::InvalidArgument(format!("cannot delete: {ctx}")));
        }
        let file = self.file_in(table, id, ctx)?;
        if let Some(dir) = file.dir() {
            if !dir.lock().unwrap().is_empty() {
                return Err(FsError::DirectoryNotEmpty(ctx.to_string()));
            }
            tree::unlink_entry(table, resolved.parent, &resolved.name);
            dir.lock().unwrap().remove_self();
            file.decrement_links();
        } else {
            tree::unlink_entry(table, resolved.parent, &resolved.name);
        }
        self.maybe_finalize(table, id);
        if let Ok(parent) = self.file_in(table, resolved.parent, ctx) {
            parent.set_last_modified_time(self.now());
        }
        Ok(())
    }

    /// Copies `src` to `dst` within this filesystem.
    ///
    /// Regular files copy block contents; directories copy as a new empty
    /// directory; with `nofollow_links` a terminal symbolic link is copied
    /// itself. The copy is a new node: its file key always differs.
    pub fn copy(&self, src: &str, dst: &str, options: CopyOptions) -> FsResult<()> {
        self.check_open()?;
        let src_parsed = self.paths.parse(src)?;
        let dst_parsed = self.paths.parse(dst)?;
        let policy = if options.nofollow_links {
            LinkPolicy::NoFollow
        } else {
            LinkPolicy::Follow
        };

        let mut table = self.tree.table.write().unwrap();
        let src_res = self.resolve_in(&table, &src_parsed, policy, src)?;
        let src_id = src_res.require_exists(src)?;
        let src_file = self.file_in(&table, src_id, src)?;

        let dst_res = self.resolve_in(&table, &dst_parsed, LinkPolicy::NoFollow, dst)?;
        if dst_res.file == Some(src_id) {
            return Ok(());
        }
        if dst_res.file.is_some() {
            if !options.replace_existing {
                return Err(FsError::AlreadyExists(dst.to_string()));
            }
            self.delete_resolved(&mut table, &dst_res, dst)?;
        }
        if !tree::is_linked(&table, &self.tree.roots, dst_res.parent) {
            return Err(FsError::NotFound(dst.to_string()));
        }

        let copy = duplicate_node(&src_file, self, &mut table, &options)?;
        tree::link_entry(&table, dst_res.parent, dst_res.name.clone(), copy.id());
        self.file_in(&table, dst_res.parent, dst)?.set_last_modified_time(self.now());
        debug!(src, dst, "copied");
        Ok(())
    }

    /// Copies `src` in this filesystem to `dst` in `target`, which may be a
    /// differently configured instance. Names re-intern under the target's
    /// normalization policy and bytes copy block-wise.
    pub fn copy_to(
        &self,
        src: &str,
        target: &FileSystem,
        dst: &str,
        options: CopyOptions,
    ) -> FsResult<()> {
        if std::ptr::eq(self, target) {
            return self.copy(src, dst, options);
        }
        self.check_open()?;
        target.check_open()?;
        let src_parsed = self.paths.parse(src)?;
        let dst_parsed = target.paths.parse(dst)?;
        let policy = if options.nofollow_links {
            LinkPolicy::NoFollow
        } else {
            LinkPolicy::Follow
        };

        // tree locks in instance order so concurrent cross-instance copies
        // cannot deadlock
        let (src_table, mut dst_table) = if self.instance < target.instance {
            let a = self.tree.table.write().unwrap();
            let b = target.tree.table.write().unwrap();
            (a, b)
        } else {
            let b = target.tree.table.write().unwrap();
            let a = self.tree.table.write().unwrap();
            (a, b)
        };

        let src_res = self.resolve_in(&src_table, &src_parsed, policy, src)?;
        let src_id = src_res.require_exists(src)?;
        let src_file = self.file_in(&src_table, src_id, src)?;

        let dst_res = target.resolve_in(&dst_table, &dst_parsed, LinkPolicy::NoFollow, dst)?;
        if dst_res.file.is_some() {
            if !options.replace_existing {
                return Err(FsError::AlreadyExists(dst.to_string()));
            }
            target.delete_resolved(&mut dst_table, &dst_res, dst)?;
        }
        if !tree::is_linked(&dst_table, &target.tree.roots, dst_res.parent) {
            return Err(FsError::NotFound(dst.to_string()));
        }

        let copy = duplicate_node(&src_file, target, &mut dst_table, &options)?;
        tree::link_entry(&dst_table, dst_res.parent, dst_res.name.clone(), copy.id());
        target.file_in(&dst_table, dst_res.parent, dst)?.set_last_modified_time(target.now());
        debug!(src, dst, "copied across instances");
        Ok(())
    }

    /// Moves `src` to `dst` within this filesystem: relink under the new
    /// parent plus unlink of the old entry, atomic under the tree write lock.
    /// The node itself is preserved, so its file key does not change and open
    /// channels keep working.
    pub fn move_file(&self, src: &str, dst: &str, options: MoveOptions) -> FsResult<()> {
        self.check_open()?;
        let src_parsed = self.paths.parse(src)?;
        let dst_parsed = self.paths.parse(dst)?;
        let mut table = self.tree.table.write().unwrap();

        let src_res = self.resolve_in(&table, &src_parsed, LinkPolicy::NoFollow, src)?;
        let src_id = src_res.require_exists(src)?;
        if src_res.name.is_reserved() {
            return Err(FsError::InvalidArgument(format!("cannot move: {src}")));
        }
        let src_file = self.file_in(&table, src_id, src)?;

        let dst_res = self.resolve_in(&table, &dst_parsed, LinkPolicy::NoFollow, dst)?;
        if dst_res.file == Some(src_id) {
            return Ok(());
        }

        if src_file.is_directory() {
            // refuse moving a directory under itself
            let mut ancestor = Some(dst_res.parent);
            while let Some(current) = ancestor {
                if current == src_id {
                    return Err(FsError::InvalidArgument(format!(
                        "cannot move directory into its own subtree: {src}"
                    )));
                }
                ancestor = self
                    .file_in(&table, current, dst)?
                    .dir()
                    .and_then(|d| d.lock().unwrap().parent())
                    .filter(|parent| *parent != current);
            }
            if options.atomic_move && subtree_has_open_channels(&table, src_id) {
                return Err(FsError::AtomicViolation(src.to_string()));
            }
        }

        if dst_res.file.is_some() {
            if !options.replace_existing {
                return Err(FsError::AlreadyExists(dst.to_string()));
            }
            self.delete_resolved(&mut table, &dst_res, dst)?;
        }
        if !tree::is_linked(&table, &self.tree.roots, dst_res.parent) {
            return Err(FsError::NotFound(dst.to_string()));
        }

        tree::unlink_entry(&table, src_res.parent, &src_res.name);
        tree::link_entry(&table, dst_res.parent, dst_res.name.clone(), src_id);
        let now = self.now();
        self.file_in(&table, src_res.parent, src)?.set_last_modified_time(now);
        self.file_in(&table, dst_res.parent, dst)?.set_last_modified_time(now);
        debug!(src, dst, "moved");
        Ok(())
    }

    /// Moving between instances is always refused for this in-memory engine;
    /// a façade falls back to copy-and-delete.
    pub fn move_to(
        &self,
        src: &str,
        target: &FileSystem,
        dst: &str,
        options: MoveOptions,
    ) -> FsResult<()> {
        if std::ptr::eq(self, target) {
            return self.move_file(src, dst, options);
        }
        Err(FsError::CrossDevice)
    }

    /// Lists a directory: a stable snapshot of child display names, ordered
    /// by canonical name.
    pub fn list(&self, path: &str) -> FsResult<Vec<String>> {
        self.check_open()?;
        let parsed = self.paths.parse(path)?;
        let table = self.tree.table.read().unwrap();
        let resolved = self.resolve_in(&table, &parsed, LinkPolicy::Follow, path)?;
        let id = resolved.require_exists(path)?;
        let file = self.file_in(&table, id, path)?;
        let dir = file.dir().ok_or_else(|| FsError::NotADirectory(path.to_string()))?;
        let snapshot = dir.lock().unwrap().snapshot();
        Ok(snapshot.into_iter().map(|(name, _)| name.display().to_string()).collect())
    }

    /// Reads a symbolic link's target, unresolved, rendered as a string.
    pub fn read_symbolic_link(&self, path: &str) -> FsResult<String> {
        if !self.config.features.contains(Feature::SYMBOLIC_LINKS) {
            return Err(FsError::Unsupported("symbolic links".to_string()));
        }
        let file = self.resolve_file(path, LinkPolicy::NoFollow)?;
        match file.symlink_target() {
            Some(target) => Ok(target.to_string()),
            None => Err(FsError::InvalidArgument(format!("not a symbolic link: {path}"))),
        }
    }

    pub fn exists(&self, path: &str, policy: LinkPolicy) -> bool {
        self.resolve_file(path, policy).is_ok()
    }

    /// The stable node id backing `basic:fileKey`.
    pub fn file_key(&self, path: &str, policy: LinkPolicy) -> FsResult<FileId> {
        Ok(self.resolve_file(path, policy)?.id())
    }

    /// Reads one attribute by `"view:attr"` spec (view defaults to `basic`).
    pub fn get_attribute(
        &self,
        path: &str,
        spec: &str,
        policy: LinkPolicy,
    ) -> FsResult<AttributeValue> {
        let file = self.resolve_file(path, policy)?;
        self.attrs.get_attribute(&file, spec)
    }

    /// Writes one attribute by `"view:attr"` spec.
    pub fn set_attribute(
        &self,
        path: &str,
        spec: &str,
        value: AttributeValue,
        policy: LinkPolicy,
    ) -> FsResult<()> {
        let file = self.resolve_file(path, policy)?;
        self.attrs.set_attribute(&file, spec, value, false)
    }

    /// Reads several attributes of one view: `"view:a,b,c"` or `"view:*"`.
    pub fn read_attributes_map(
        &self,
        path: &str,
        spec: &str,
        policy: LinkPolicy,
    ) -> FsResult<BTreeMap<String, AttributeValue>> {
        let file = self.resolve_file(path, policy)?;
        self.attrs.read_attributes_map(&file, spec)
    }

    /// Reads a typed attributes snapshot, e.g.
    /// `read_attributes::<BasicFileAttributes>(path, policy)`.
    pub fn read_attributes<A: ReadableAttributes>(
        &self,
        path: &str,
        policy: LinkPolicy,
    ) -> FsResult<A> {
        let file = self.resolve_file(path, policy)?;
        self.attrs.read_typed(&file)
    }
}

/// Creates an unlinked duplicate of `src_file` in `dst_table`, per the copy
/// options. Block contents transfer block-granular without intermediate
/// buffers; attribute copies carry the bag and all three timestamps.
fn duplicate_node(
    src_file: &Arc<File>,
    dst_fs: &FileSystem,
    dst_table: &mut FileTable,
    options: &CopyOptions,
) -> FsResult<Arc<File>> {
    let copy = if src_file.is_directory() {
        dst_fs.make_directory(dst_table, &[])?
    } else if let Some(content) = src_file.regular_content() {
        let copy = dst_fs.make_regular(dst_table, &[])?;
        let result = content.transfer_to(copy.regular_content().expect("regular node"));
        if let Err(err) = result {
            let id = copy.id();
            dst_table.remove(id);
            return Err(err);
        }
        copy
    } else {
        let target = src_file.symlink_target().expect("symlink node");
        if !dst_fs.config.features.contains(Feature::SYMBOLIC_LINKS) {
            return Err(FsError::Unsupported("symbolic links".to_string()));
        }
        let reparsed = dst_fs.paths.parse(&target.to_string())?;
        dst_fs.make_symlink(dst_table, reparsed, &[])?
    };
    if options.copy_attributes {
        src_file.copy_attributes_to(&copy);
    }
    Ok(copy)
}

/// Whether any node reachable from `id` (inclusive) has an open channel.
fn subtree_has_open_channels(table: &FileTable, id: FileId) -> bool {
    let Some(file) = table.get(id) else {
        return false;
    };
    if file.open_count() > 0 {
        return true;
    }
    if let Some(dir) = file.dir() {
        let children = dir.lock().unwrap().snapshot();
        for (_, child) in children {
            if subtree_has_open_channels(table, child) {
                return true;
            }
        }
    }
    false
}
