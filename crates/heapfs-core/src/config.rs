// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Declarative description of a filesystem instance

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::attr::value::AttributeValue;
use crate::attr::AttributeProvider;
use crate::error::{FsError, FsResult};
use crate::name::Normalization;
use crate::path::PathStyle;

bitflags::bitflags! {
    /// Optional capabilities a filesystem instance advertises.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Feature: u8 {
        /// Hard links to regular files.
        const LINKS = 1 << 0;
        const SYMBOLIC_LINKS = 1 << 1;
        const SECURE_DIRECTORY_STREAM = 1 << 2;
        const FILE_CHANNEL = 1 << 3;
    }
}

pub const DEFAULT_BLOCK_SIZE: usize = 8192;
pub const DEFAULT_MAX_SIZE: u64 = 4 * 1024 * 1024 * 1024;
pub const DEFAULT_LINK_DEPTH_LIMIT: usize = 40;

/// Immutable configuration of one filesystem instance.
///
/// Built through [`Config::builder`] or one of the `unix`/`osx`/`windows`
/// presets; every recognized option has a builder setter.
#[derive(Clone)]
pub struct Config {
    pub(crate) style: PathStyle,
    pub(crate) roots: Vec<String>,
    pub(crate) working_directory: String,
    pub(crate) name_canonical_normalization: Normalization,
    pub(crate) name_display_normalization: Normalization,
    pub(crate) path_equality_uses_canonical_form: bool,
    pub(crate) block_size: usize,
    pub(crate) max_size: u64,
    pub(crate) max_cache_size: Option<u64>,
    pub(crate) attribute_views: BTreeSet<String>,
    pub(crate) attribute_providers: Vec<Arc<dyn AttributeProvider>>,
    pub(crate) default_attribute_values: BTreeMap<String, AttributeValue>,
    pub(crate) features: Feature,
    pub(crate) link_depth_limit: usize,
}

impl Config {
    /// A Unix-like configuration: root `/`, working directory `/work`,
    /// case-sensitive names, symbolic and hard links enabled.
    pub fn unix() -> Config {
        Config::builder(PathStyle::Unix)
            .roots(["/"])
            .working_directory("/work")
            .attribute_views(["basic"])
            .supported_features(
                Feature::LINKS
                    | Feature::SYMBOLIC_LINKS
                    | Feature::SECURE_DIRECTORY_STREAM
                    | Feature::FILE_CHANNEL,
            )
            .build()
    }

    /// Like [`Config::unix`], with Mac-style name handling: NFC display
    /// forms, NFD case-insensitive-ASCII canonical forms.
    pub fn osx() -> Config {
        Config::builder(PathStyle::Unix)
            .roots(["/"])
            .working_directory("/work")
            .name_display_normalization(Normalization::NFC)
            .name_canonical_normalization(Normalization::NFD | Normalization::CASE_FOLD_ASCII)
            .attribute_views(["basic"])
            .supported_features(Feature::LINKS | Feature::SYMBOLIC_LINKS | Feature::FILE_CHANNEL)
            .build()
    }

    /// A Windows-like configuration: root `C:\`, case-insensitive names with
    /// canonical path equality, `basic`/`owner`/`dos`/`user` views.
    pub fn windows() -> Config {
        Config::builder(PathStyle::Windows)
            .roots(["C:\\"])
            .working_directory("C:\\work")
            .name_canonical_normalization(Normalization::CASE_FOLD_ASCII)
            .path_equality_uses_canonical_form(true)
            .attribute_views(["basic", "owner", "dos", "user"])
            .supported_features(Feature::LINKS | Feature::FILE_CHANNEL)
            .build()
    }

    pub fn builder(style: PathStyle) -> ConfigBuilder {
        ConfigBuilder {
            style,
            roots: Vec::new(),
            working_directory: String::new(),
            name_canonical_normalization: Normalization::empty(),
            name_display_normalization: Normalization::empty(),
            path_equality_uses_canonical_form: false,
            block_size: DEFAULT_BLOCK_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            max_cache_size: None,
            attribute_views: BTreeSet::new(),
            attribute_providers: Vec::new(),
            default_attribute_values: BTreeMap::new(),
            features: Feature::empty(),
            link_depth_limit: DEFAULT_LINK_DEPTH_LIMIT,
        }
    }

    /// A builder seeded with this configuration.
    pub fn to_builder(&self) -> ConfigBuilder {
        ConfigBuilder {
            style: self.style,
            roots: self.roots.clone(),
            working_directory: self.working_directory.clone(),
            name_canonical_normalization: self.name_canonical_normalization,
            name_display_normalization: self.name_display_normalization,
            path_equality_uses_canonical_form: self.path_equality_uses_canonical_form,
            block_size: self.block_size,
            max_size: self.max_size,
            max_cache_size: self.max_cache_size,
            attribute_views: self.attribute_views.clone(),
            attribute_providers: self.attribute_providers.clone(),
            default_attribute_values: self.default_attribute_values.clone(),
            features: self.features,
            link_depth_limit: self.link_depth_limit,
        }
    }

    pub fn supported_features(&self) -> Feature {
        self.features
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn path_style(&self) -> PathStyle {
        self.style
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("style", &self.style)
            .field("roots", &self.roots)
            .field("working_directory", &self.working_directory)
            .field("block_size", &self.block_size)
            .field("max_size", &self.max_size)
            .field("max_cache_size", &self.max_cache_size)
            .field("attribute_views", &self.attribute_views)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    style: PathStyle,
    roots: Vec<String>,
    working_directory: String,
    name_canonical_normalization: Normalization,
    name_display_normalization: Normalization,
    path_equality_uses_canonical_form: bool,
    block_size: usize,
    max_size: u64,
    max_cache_size: Option<u64>,
    attribute_views: BTreeSet<String>,
    attribute_providers: Vec<Arc<dyn AttributeProvider>>,
    default_attribute_values: BTreeMap<String, AttributeValue>,
    features: Feature,
    link_depth_limit: usize,
}

impl ConfigBuilder {
    pub fn roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Absolute path used as the default base for relative paths. Missing
    /// intermediate directories are created when the filesystem is built.
    pub fn working_directory(mut self, path: impl Into<String>) -> Self {
        self.working_directory = path.into();
        self
    }

    pub fn name_canonical_normalization(mut self, normalization: Normalization) -> Self {
        self.name_canonical_normalization = normalization;
        self
    }

    pub fn name_display_normalization(mut self, normalization: Normalization) -> Self {
        self.name_display_normalization = normalization;
        self
    }

    pub fn path_equality_uses_canonical_form(mut self, canonical: bool) -> Self {
        self.path_equality_uses_canonical_form = canonical;
        self
    }

    pub fn block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Hard cap on total bytes held in blocks.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Bytes worth of freed blocks retained for reuse. Unset means every
    /// freed block is kept, bounded only by `max_size`.
    pub fn max_cache_size(mut self, bytes: u64) -> Self {
        self.max_cache_size = Some(bytes);
        self
    }

    pub fn attribute_views<I, S>(mut self, views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_views = views.into_iter().map(Into::into).collect();
        self
    }

    /// Registers a user-supplied attribute provider.
    pub fn add_attribute_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.attribute_providers.push(provider);
        self
    }

    /// Overrides one provider default, keyed `"view:attr"`.
    pub fn default_attribute_value(mut self, spec: impl Into<String>, value: AttributeValue) -> Self {
        self.default_attribute_values.insert(spec.into(), value);
        self
    }

    pub fn supported_features(mut self, features: Feature) -> Self {
        self.features = features;
        self
    }

    pub fn link_depth_limit(mut self, limit: usize) -> Self {
        self.link_depth_limit = limit;
        self
    }

    pub fn build(self) -> Config {
        Config {
            style: self.style,
            roots: self.roots,
            working_directory: self.working_directory,
            name_canonical_normalization: self.name_canonical_normalization,
            name_display_normalization: self.name_display_normalization,
            path_equality_uses_canonical_form: self.path_equality_uses_canonical_form,
            block_size: self.block_size,
            max_size: self.max_size,
            max_cache_size: self.max_cache_size,
            attribute_views: self.attribute_views,
            attribute_providers: self.attribute_providers,
            default_attribute_values: self.default_attribute_values,
            features: self.features,
            link_depth_limit: self.link_depth_limit,
        }
    }
}

pub(crate) fn validate(config: &Config) -> FsResult<()> {
    if config.block_size == 0 {
        return Err(FsError::InvalidArgument("block size must be positive".to_string()));
    }
    if config.max_size < config.block_size as u64 {
        return Err(FsError::InvalidArgument(
            "max size must hold at least one block".to_string(),
        ));
    }
    if config.roots.is_empty() {
        return Err(FsError::InvalidArgument("at least one root is required".to_string()));
    }
    if config.working_directory.is_empty() {
        return Err(FsError::InvalidArgument("working directory is required".to_string()));
    }
    if config
        .name_canonical_normalization
        .contains(Normalization::NFC | Normalization::NFD)
        || config
            .name_display_normalization
            .contains(Normalization::NFC | Normalization::NFD)
    {
        return Err(FsError::InvalidArgument(
            "NFC and NFD normalization are mutually exclusive".to_string(),
        ));
    }
    Ok(())
}
