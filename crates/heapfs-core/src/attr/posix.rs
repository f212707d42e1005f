// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `posix` attribute view

use std::collections::{BTreeMap, BTreeSet};

use crate::attr::basic::BasicFileAttributes;
use crate::attr::value::{
    AttributeType, AttributeValue, GroupPrincipal, PosixPermission, UserPrincipal,
};
use crate::attr::{AttributeProvider, AttributeSpec, ReadableAttributes};
use crate::error::{FsError, FsResult};
use crate::file::File;

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::settable_on_create("permissions", AttributeType::Permissions),
    AttributeSpec::settable_on_create("group", AttributeType::Group),
];

pub struct PosixAttributeProvider {
    default_group: GroupPrincipal,
    default_permissions: BTreeSet<PosixPermission>,
}

impl PosixAttributeProvider {
    pub(crate) fn new(defaults: &BTreeMap<String, AttributeValue>) -> FsResult<Self> {
        let default_group = match defaults.get("posix:group") {
            None => GroupPrincipal("group".to_string()),
            Some(AttributeValue::Group(g)) => g.clone(),
            Some(AttributeValue::String(s)) => GroupPrincipal(s.clone()),
            Some(_) => {
                return Err(FsError::InvalidArgument(
                    "default value for posix:group must be a group principal".to_string(),
                ))
            }
        };
        let default_permissions = match defaults.get("posix:permissions") {
            None => PosixPermission::parse_set("rw-r--r--")?,
            Some(AttributeValue::Permissions(p)) => p.clone(),
            Some(AttributeValue::String(s)) => PosixPermission::parse_set(s)?,
            Some(_) => {
                return Err(FsError::InvalidArgument(
                    "default value for posix:permissions must be a permission set".to_string(),
                ))
            }
        };
        Ok(Self {
            default_group,
            default_permissions,
        })
    }
}

impl AttributeProvider for PosixAttributeProvider {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn inherits(&self) -> &[&'static str] {
        &["basic", "owner"]
    }

    fn attributes(&self) -> &[AttributeSpec] {
        ATTRIBUTES
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue> {
        match attr {
            "permissions" => Some(file.stored_attribute("posix", "permissions").unwrap_or_else(
                || AttributeValue::Permissions(self.default_permissions.clone()),
            )),
            "group" => Some(
                file.stored_attribute("posix", "group")
                    .unwrap_or_else(|| AttributeValue::Group(self.default_group.clone())),
            ),
            _ => None,
        }
    }

    fn set(&self, file: &File, attr: &str, value: AttributeValue) -> FsResult<()> {
        file.set_stored_attribute("posix", attr, value);
        Ok(())
    }

    fn apply_defaults(&self, file: &File) {
        file.set_stored_attribute(
            "posix",
            "permissions",
            AttributeValue::Permissions(self.default_permissions.clone()),
        );
        file.set_stored_attribute(
            "posix",
            "group",
            AttributeValue::Group(self.default_group.clone()),
        );
    }
}

/// Owned snapshot of the posix view, including the inherited basic and owner
/// attributes.
#[derive(Clone, Debug)]
pub struct PosixFileAttributes {
    pub basic: BasicFileAttributes,
    pub owner: UserPrincipal,
    pub group: GroupPrincipal,
    pub permissions: BTreeSet<PosixPermission>,
}

impl ReadableAttributes for PosixFileAttributes {
    const VIEW: &'static str = "posix";

    fn read_from(file: &File) -> Self {
        let owner = match file.stored_attribute("owner", "owner") {
            Some(AttributeValue::User(u)) => u,
            _ => UserPrincipal("user".to_string()),
        };
        let group = match file.stored_attribute("posix", "group") {
            Some(AttributeValue::Group(g)) => g,
            _ => GroupPrincipal("group".to_string()),
        };
        let permissions = match file.stored_attribute("posix", "permissions") {
            Some(AttributeValue::Permissions(p)) => p,
            _ => PosixPermission::from_mode(0o644),
        };
        Self {
            basic: BasicFileAttributes::read_from(file),
            owner,
            group,
            permissions,
        }
    }
}
