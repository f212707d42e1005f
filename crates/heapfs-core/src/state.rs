// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The filesystem instance: configuration, roots, pool, attributes, tree lock

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::attr::value::AttributeValue;
use crate::attr::AttributeService;
use crate::block::BlockPool;
use crate::config::{self, Config, Feature};
use crate::error::{FsError, FsResult};
use crate::file::{File, FileId};
use crate::name::Name;
use crate::path::{PathService, VPath};
use crate::regular::RegularFile;
use crate::time::{FileTime, SystemTimeSource, TimeSource};
use crate::tree::{self, FileTable, FileTree, LinkPolicy, Resolved};

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Point-in-time resource numbers for one filesystem instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsStats {
    pub files: usize,
    pub open_channels: u32,
    pub allocated_blocks: u64,
    pub cached_blocks: u64,
    pub resident_bytes: u64,
}

/// An in-memory filesystem instance.
///
/// All verbs are synchronous and thread-safe. Structural mutation of the
/// directory graph is serialized by a filesystem-wide readers/writer lock;
/// regular-file bytes are guarded per file, so bulk reads and writes through
/// open channels never hold the tree lock.
pub struct FileSystem {
    pub(crate) config: Config,
    pub(crate) paths: PathService,
    pub(crate) pool: Arc<BlockPool>,
    pub(crate) attrs: AttributeService,
    pub(crate) tree: FileTree,
    pub(crate) cwd: FileId,
    pub(crate) time: Arc<dyn TimeSource>,
    pub(crate) open_channels: AtomicU32,
    closed: AtomicBool,
    pub(crate) instance: u64,
}

impl FileSystem {
    pub fn new(config: Config) -> FsResult<FileSystem> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Creates a filesystem with an injected clock; tests use a fake source
    /// with virtual time.
    pub fn with_time_source(config: Config, time: Arc<dyn TimeSource>) -> FsResult<FileSystem> {
        config::validate(&config)?;
        let paths = PathService::new(
            config.style,
            config.name_canonical_normalization,
            config.name_display_normalization,
            config.path_equality_uses_canonical_form,
        );
        let pool = Arc::new(BlockPool::new(
            config.block_size,
            config.max_size,
            config.max_cache_size,
        ));
        let attrs = AttributeService::new(
            &config.attribute_views,
            &config.attribute_providers,
            &config.default_attribute_values,
        )?;

        let mut table = FileTable::new();
        let mut roots: BTreeMap<Name, FileId> = BTreeMap::new();
        let now = time.now();

        for root_str in &config.roots {
            let parsed = paths.parse(root_str)?;
            let root_name = match parsed.root() {
                Some(name) if parsed.name_count() == 0 => name.clone(),
                _ => {
                    return Err(FsError::InvalidArgument(format!(
                        "root must be a bare root path: {root_str}"
                    )))
                }
            };
            if roots.contains_key(&root_name) {
                return Err(FsError::InvalidArgument(format!("duplicate root: {root_str}")));
            }
            let id = table.allocate_id();
            let root = table.insert(File::directory(id, now));
            {
                let mut dir = root.dir().expect("directory node").lock().unwrap();
                dir.set_self(id);
                dir.set_parent(id);
            }
            // self entry plus the root's own parent entry
            root.increment_links();
            root.increment_links();
            attrs.set_initial_attributes(&root, &[])?;
            roots.insert(root_name, id);
        }

        // working directory, creating intermediate directories as needed
        let cwd_path = paths.parse(&config.working_directory)?;
        let cwd_root = cwd_path
            .root()
            .and_then(|name| roots.get(name).copied())
            .ok_or_else(|| {
                FsError::InvalidArgument(format!(
                    "working directory must be under a configured root: {}",
                    config.working_directory
                ))
            })?;
        let mut cwd = cwd_root;
        for name in cwd_path.names() {
            if name.is_reserved() {
                return Err(FsError::InvalidArgument(format!(
                    "working directory must be normalized: {}",
                    config.working_directory
                )));
            }
            let dir_file = table.get(cwd).expect("walked node in table");
            let existing =
                dir_file.dir().expect("directory node").lock().unwrap().get(name);
            cwd = match existing {
                Some(id) => id,
                None => {
                    let id = table.allocate_id();
                    let child = table.insert(File::directory(id, time.now()));
                    child.dir().expect("directory node").lock().unwrap().set_self(id);
                    child.increment_links();
                    attrs.set_initial_attributes(&child, &[])?;
                    tree::link_entry(&table, cwd, name.clone(), id);
                    id
                }
            };
        }

        let fs = FileSystem {
            config,
            paths,
            pool,
            attrs,
            tree: FileTree {
                table: std::sync::RwLock::new(table),
                roots,
            },
            cwd,
            time,
            open_channels: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            instance: INSTANCE_COUNTER.fetch_add(1, Ordering::SeqCst),
        };
        debug!(
            instance = fs.instance,
            roots = fs.tree.roots.len(),
            "created in-memory filesystem"
        );
        Ok(fs)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn supported_features(&self) -> Feature {
        self.config.features
    }

    pub fn supported_file_attribute_views(&self) -> Vec<&'static str> {
        self.attrs.supported_views()
    }

    pub fn separator(&self) -> char {
        self.config.style.separator()
    }

    /// Parses a path string under this instance's path syntax.
    pub fn parse_path(&self, path: &str) -> FsResult<VPath> {
        self.paths.parse(path)
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> FsStats {
        let files = self.tree.table.read().unwrap().len();
        FsStats {
            files,
            open_channels: self.open_channels.load(Ordering::SeqCst),
            allocated_blocks: self.pool.allocated_blocks(),
            cached_blocks: self.pool.cached_blocks(),
            resident_bytes: self.pool.resident_bytes(),
        }
    }

    /// Closes the instance: outstanding channels start failing, every node is
    /// dropped and all blocks are released. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close();
        self.tree.table.write().unwrap().clear();
        debug!(instance = self.instance, "closed filesystem");
    }

    pub(crate) fn check_open(&self) -> FsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FsError::Closed);
        }
        Ok(())
    }

    pub(crate) fn now(&self) -> FileTime {
        self.time.now()
    }

    /// Resolves `path` against the working directory under an already-held
    /// tree lock guard.
    pub(crate) fn resolve_in(
        &self,
        table: &FileTable,
        path: &VPath,
        policy: LinkPolicy,
        ctx: &str,
    ) -> FsResult<Resolved> {
        tree::lookup(
            table,
            &self.tree.roots,
            self.cwd,
            path,
            policy,
            self.config.link_depth_limit,
            ctx,
        )
    }

    pub(crate) fn file_in(&self, table: &FileTable, id: FileId, ctx: &str) -> FsResult<Arc<File>> {
        table.get(id).ok_or_else(|| FsError::NotFound(ctx.to_string()))
    }

    /// Resolves a path string to its node under a fresh tree read lock.
    pub(crate) fn resolve_file(&self, path: &str, policy: LinkPolicy) -> FsResult<Arc<File>> {
        self.check_open()?;
        let parsed = self.paths.parse(path)?;
        let table = self.tree.table.read().unwrap();
        let resolved = self.resolve_in(&table, &parsed, policy, path)?;
        let id = resolved.require_exists(path)?;
        self.file_in(&table, id, path)
    }

    /// Builds a fresh regular-file node in `table` with initial attributes
    /// applied; the node is not linked anywhere yet.
    pub(crate) fn make_regular(
        &self,
        table: &mut FileTable,
        overrides: &[(&str, AttributeValue)],
    ) -> FsResult<Arc<File>> {
        let id = table.allocate_id();
        let file = table.insert(File::regular(id, self.now(), RegularFile::new(self.pool.clone())));
        if let Err(err) = self.attrs.set_initial_attributes(&file, overrides) {
            table.remove(id);
            return Err(err);
        }
        Ok(file)
    }

    pub(crate) fn make_directory(
        &self,
        table: &mut FileTable,
        overrides: &[(&str, AttributeValue)],
    ) -> FsResult<Arc<File>> {
        let id = table.allocate_id();
        let file = table.insert(File::directory(id, self.now()));
        file.dir().expect("directory node").lock().unwrap().set_self(id);
        file.increment_links();
        if let Err(err) = self.attrs.set_initial_attributes(&file, overrides) {
            table.remove(id);
            return Err(err);
        }
        Ok(file)
    }

    pub(crate) fn make_symlink(
        &self,
        table: &mut FileTable,
        target: VPath,
        overrides: &[(&str, AttributeValue)],
    ) -> FsResult<Arc<File>> {
        let id = table.allocate_id();
        let file = table.insert(File::symlink(id, self.now(), target));
        if let Err(err) = self.attrs.set_initial_attributes(&file, overrides) {
            table.remove(id);
            return Err(err);
        }
        Ok(file)
    }

    /// Drops a node from the table once nothing references it: no directory
    /// entries and no open channels. Dropping a regular file returns its
    /// blocks to the pool.
    pub(crate) fn maybe_finalize(&self, table: &mut FileTable, id: FileId) {
        let Some(file) = table.get(id) else {
            return;
        };
        if file.link_count() == 0 && file.open_count() == 0 {
            table.remove(id);
        }
    }

    /// Channel close path: runs under a fresh tree write lock.
    pub(crate) fn finalize_after_close(&self, id: FileId) {
        if !self.is_open() {
            return;
        }
        let mut table = self.tree.table.write().unwrap();
        self.maybe_finalize(&mut table, id);
    }
}

impl Drop for FileSystem {
    fn drop(&mut self) {
        self.close();
    }
}
