// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute views: the provider registry and the attribute service

pub mod basic;
pub mod dos;
pub mod owner;
pub mod posix;
pub mod unix;
pub mod user;
pub mod value;
pub mod views;

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::file::File;

use self::value::{AttributeType, AttributeValue};

pub use self::basic::BasicFileAttributes;
pub use self::dos::DosFileAttributes;
pub use self::posix::PosixFileAttributes;

/// Declaration of one attribute within a view.
#[derive(Clone, Copy, Debug)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub ty: AttributeType,
    pub readable: bool,
    pub writable: bool,
    pub settable_on_create: bool,
}

impl AttributeSpec {
    pub const fn read_only(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            readable: true,
            writable: false,
            settable_on_create: false,
        }
    }

    pub const fn writable(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            readable: true,
            writable: true,
            settable_on_create: false,
        }
    }

    pub const fn settable_on_create(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            readable: true,
            writable: true,
            settable_on_create: true,
        }
    }
}

/// An attribute view plugin.
///
/// Each provider owns one view name and its attributes. A provider may
/// declare other views it `inherits`; the service answers reads of those
/// views' attributes through this provider's name, and wildcard reads pull
/// them in transitively.
pub trait AttributeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn inherits(&self) -> &[&'static str] {
        &[]
    }

    fn attributes(&self) -> &[AttributeSpec];

    /// An open-namespace view accepts any attribute name (the `user` view).
    fn open_namespace(&self) -> bool {
        false
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue>;

    /// Stores a value already validated against the declared type.
    fn set(&self, file: &File, attr: &str, value: AttributeValue) -> FsResult<()>;

    /// Seeds this provider's per-file defaults at creation time.
    fn apply_defaults(&self, _file: &File) {}

    /// Attribute names an open-namespace provider currently stores on `file`.
    fn stored_names(&self, _file: &File) -> Vec<String> {
        Vec::new()
    }
}

/// Registry of attribute providers keyed by view name.
pub struct AttributeService {
    providers: Vec<Arc<dyn AttributeProvider>>,
    by_name: HashMap<&'static str, usize>,
}

impl AttributeService {
    /// Builds the service for the configured view names, instantiating the
    /// standard providers (plus everything they inherit) and appending
    /// user-supplied ones. `defaults` override provider defaults per
    /// `"view:attr"` key.
    pub(crate) fn new(
        views: &BTreeSet<String>,
        extra: &[Arc<dyn AttributeProvider>],
        defaults: &BTreeMap<String, AttributeValue>,
    ) -> FsResult<Self> {
        let mut service = Self {
            providers: Vec::new(),
            by_name: HashMap::new(),
        };

        // basic is always supported and registers first
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back("basic".to_string());
        queue.extend(views.iter().cloned());

        while let Some(view) = queue.pop_front() {
            if service.by_name.contains_key(view.as_str()) {
                continue;
            }
            let provider = match standard_provider(&view, defaults)? {
                Some(p) => p,
                None => extra
                    .iter()
                    .find(|p| p.name() == view)
                    .cloned()
                    .ok_or_else(|| FsError::Unsupported(format!("attribute view: {view}")))?,
            };
            for inherited in provider.inherits() {
                queue.push_back((*inherited).to_string());
            }
            service.register(provider);
        }

        for extra_provider in extra {
            if !service.by_name.contains_key(extra_provider.name()) {
                service.register(extra_provider.clone());
            }
        }

        for key in defaults.keys() {
            let (view, _) = parse_single_spec(key)?;
            if !service.supports(view) {
                return Err(FsError::InvalidArgument(format!(
                    "default value for unrecognized view: {key}"
                )));
            }
        }

        Ok(service)
    }

    fn register(&mut self, provider: Arc<dyn AttributeProvider>) {
        self.by_name.insert(provider.name(), self.providers.len());
        self.providers.push(provider);
    }

    pub fn supports(&self, view: &str) -> bool {
        self.by_name.contains_key(view)
    }

    /// Registered view names, `basic` first.
    pub fn supported_views(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    fn provider(&self, view: &str) -> FsResult<&dyn AttributeProvider> {
        self.by_name
            .get(view)
            .map(|&i| self.providers[i].as_ref())
            .ok_or_else(|| FsError::Unsupported(format!("attribute view: {view}")))
    }

    /// The provider for `view` followed by the providers of the views it
    /// declares as inherited.
    fn provider_chain(&self, view: &str) -> FsResult<Vec<&dyn AttributeProvider>> {
        let first = self.provider(view)?;
        let mut chain = vec![first];
        for inherited in first.inherits() {
            chain.push(self.provider(inherited)?);
        }
        Ok(chain)
    }

    /// Reads one attribute given a `"view:attr"` or bare `"attr"` spec.
    pub fn get_attribute(&self, file: &File, spec: &str) -> FsResult<AttributeValue> {
        let (view, attr) = parse_single_spec(spec)?;
        self.get_attribute_of_view(file, view, attr)
    }

    pub fn get_attribute_of_view(
        &self,
        file: &File,
        view: &str,
        attr: &str,
    ) -> FsResult<AttributeValue> {
        for provider in self.provider_chain(view)? {
            if defines(provider, attr) {
                return provider
                    .get(file, attr)
                    .ok_or_else(|| FsError::InvalidAttribute(format!("{view}:{attr}")));
            }
        }
        Err(FsError::InvalidAttribute(format!("{view}:{attr}")))
    }

    /// Writes one attribute. The write is routed to the provider that owns
    /// the attribute, following the view's inheritance declaration, and the
    /// value is coerced into the declared domain type.
    pub fn set_attribute(
        &self,
        file: &File,
        spec: &str,
        value: AttributeValue,
        create: bool,
    ) -> FsResult<()> {
        let (view, attr) = parse_single_spec(spec)?;
        for provider in self.provider_chain(view)? {
            let declared = provider.attributes().iter().find(|a| a.name == attr).copied();
            let declared = match declared {
                Some(d) => Some(d),
                None if provider.open_namespace() => Some(AttributeSpec::writable(
                    // open namespaces accept any name as a byte attribute
                    "",
                    AttributeType::Bytes,
                )),
                None => None,
            };
            let Some(declared) = declared else {
                continue;
            };
            if create && !declared.settable_on_create {
                return Err(FsError::Unsupported(format!(
                    "cannot set attribute on create: {view}:{attr}"
                )));
            }
            if !declared.writable {
                return Err(FsError::InvalidArgument(format!(
                    "attribute is not settable: {view}:{attr}"
                )));
            }
            let coerced = value.coerce(declared.ty).ok_or_else(|| {
                FsError::InvalidArgument(format!("invalid value type for attribute {view}:{attr}"))
            })?;
            return provider.set(file, attr, coerced);
        }
        Err(FsError::Unsupported(format!("cannot set attribute: {view}:{attr}")))
    }

    /// Reads several attributes of one view: `"view:a,b,c"` or `"view:*"`.
    /// The wildcard pulls in inherited views' attributes and must stand
    /// alone.
    pub fn read_attributes_map(
        &self,
        file: &File,
        spec: &str,
    ) -> FsResult<BTreeMap<String, AttributeValue>> {
        let (view, list) = match spec.split_once(':') {
            None => ("basic", spec),
            Some((view, list)) => (view, list),
        };
        if view.is_empty() || list.is_empty() || list.contains(':') {
            return Err(FsError::InvalidFormat(spec.to_string()));
        }

        let chain = self.provider_chain(view)?;
        let mut out = BTreeMap::new();

        if list == "*" {
            for provider in &chain {
                for decl in provider.attributes() {
                    if !decl.readable {
                        continue;
                    }
                    if let Some(v) = provider.get(file, decl.name) {
                        out.entry(decl.name.to_string()).or_insert(v);
                    }
                }
                for name in provider.stored_names(file) {
                    if let Some(v) = provider.get(file, &name) {
                        out.entry(name).or_insert(v);
                    }
                }
            }
            return Ok(out);
        }

        let names: Vec<&str> = list.split(',').collect();
        if names.iter().any(|n| *n == "*") {
            return Err(FsError::InvalidAttribute(format!("invalid attributes: {spec}")));
        }
        for name in names {
            if name.is_empty() {
                return Err(FsError::InvalidFormat(spec.to_string()));
            }
            let value = self.get_attribute_of_view(file, view, name)?;
            out.insert(name.to_string(), value);
        }
        Ok(out)
    }

    /// Instantiates the typed attributes object for a registered view.
    pub fn read_typed<A: ReadableAttributes>(&self, file: &File) -> FsResult<A> {
        if !self.supports(A::VIEW) {
            return Err(FsError::Unsupported(format!("attributes for view: {}", A::VIEW)));
        }
        Ok(A::read_from(file))
    }

    /// Applies every provider's defaults, then the `"view:attr"` overrides
    /// with on-create semantics.
    pub fn set_initial_attributes(
        &self,
        file: &File,
        overrides: &[(&str, AttributeValue)],
    ) -> FsResult<()> {
        for provider in &self.providers {
            provider.apply_defaults(file);
        }
        for (spec, value) in overrides {
            self.set_attribute(file, spec, value.clone(), true)?;
        }
        Ok(())
    }
}

/// Typed snapshot of one view's attributes, readable through
/// [`AttributeService::read_typed`].
pub trait ReadableAttributes: Sized {
    const VIEW: &'static str;
    fn read_from(file: &File) -> Self;
}

fn defines(provider: &dyn AttributeProvider, attr: &str) -> bool {
    provider.open_namespace() || provider.attributes().iter().any(|a| a.name == attr)
}

/// Parses a single-attribute spec `"view:attr"`, defaulting the view to
/// `basic`. Exactly one `:`, non-empty on both sides, no commas.
fn parse_single_spec(spec: &str) -> FsResult<(&str, &str)> {
    let (view, attr) = match spec.split_once(':') {
        None => ("basic", spec),
        Some(parts) => parts,
    };
    if view.is_empty() || attr.is_empty() || attr.contains(':') {
        return Err(FsError::InvalidFormat(spec.to_string()));
    }
    if attr.contains(',') {
        return Err(FsError::InvalidFormat(format!("single attribute expected: {spec}")));
    }
    Ok((view, attr))
}

fn standard_provider(
    view: &str,
    defaults: &BTreeMap<String, AttributeValue>,
) -> FsResult<Option<Arc<dyn AttributeProvider>>> {
    Ok(match view {
        "basic" => Some(Arc::new(basic::BasicAttributeProvider)),
        "owner" => Some(Arc::new(owner::OwnerAttributeProvider::new(defaults)?)),
        "posix" => Some(Arc::new(posix::PosixAttributeProvider::new(defaults)?)),
        "unix" => Some(Arc::new(unix::UnixAttributeProvider::new())),
        "dos" => Some(Arc::new(dos::DosAttributeProvider)),
        "user" => Some(Arc::new(user::UserAttributeProvider)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileId;
    use crate::time::FileTime;

    #[test]
    fn test_parse_single_spec() {
        assert_eq!(parse_single_spec("basic:size").unwrap(), ("basic", "size"));
        assert_eq!(parse_single_spec("size").unwrap(), ("basic", "size"));
        assert!(parse_single_spec(":size").is_err());
        assert!(parse_single_spec("basic:").is_err());
        assert!(parse_single_spec("a:b:c").is_err());
        assert!(parse_single_spec("basic:a,b").is_err());
    }

    fn posix_service() -> AttributeService {
        let views = BTreeSet::from(["posix".to_string()]);
        AttributeService::new(&views, &[], &BTreeMap::new()).expect("standard views")
    }

    #[test]
    fn test_enabling_posix_pulls_inherited_providers() {
        let service = posix_service();
        let mut views = service.supported_views();
        views.sort_unstable();
        assert_eq!(views, vec!["basic", "owner", "posix"]);
    }

    #[test]
    fn test_unknown_view_is_unsupported() {
        let views = BTreeSet::from(["acl".to_string()]);
        assert!(matches!(
            AttributeService::new(&views, &[], &BTreeMap::new()),
            Err(FsError::Unsupported(_))
        ));
    }

    #[test]
    fn test_wildcard_read_is_transitive_over_inheritance() {
        let service = posix_service();
        let file = File::directory(FileId(0), FileTime::EPOCH);
        service.set_initial_attributes(&file, &[]).unwrap();

        // posix's two attributes, owner's one, basic's nine
        let map = service.read_attributes_map(&file, "posix:*").unwrap();
        assert_eq!(map.len(), 12);
        assert!(map.contains_key("permissions"));
        assert!(map.contains_key("owner"));
        assert!(map.contains_key("isDirectory"));
    }

    #[test]
    fn test_set_routes_to_owning_provider() {
        let service = posix_service();
        let file = File::directory(FileId(0), FileTime::EPOCH);
        service.set_initial_attributes(&file, &[]).unwrap();

        let t = AttributeValue::FileTime(FileTime::from_seconds(7));
        service.set_attribute(&file, "posix:lastModifiedTime", t.clone(), false).unwrap();
        assert_eq!(service.get_attribute(&file, "basic:lastModifiedTime").unwrap(), t);
        // the write went to the basic provider, not into a posix-keyed slot
        assert!(file.stored_attribute("posix", "lastModifiedTime").is_none());
    }

    #[test]
    fn test_unix_attributes_are_read_only() {
        let views = BTreeSet::from(["unix".to_string()]);
        let service = AttributeService::new(&views, &[], &BTreeMap::new()).unwrap();
        let file = File::directory(FileId(3), FileTime::EPOCH);
        service.set_initial_attributes(&file, &[]).unwrap();

        assert_eq!(
            service.get_attribute(&file, "unix:ino").unwrap(),
            AttributeValue::Long(3)
        );
        assert!(matches!(
            service.set_attribute(&file, "unix:mode", AttributeValue::Int(0o600), false),
            Err(FsError::InvalidArgument(_))
        ));
    }
}
