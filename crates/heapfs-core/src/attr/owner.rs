// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `owner` attribute view

use std::collections::BTreeMap;

use crate::attr::value::{AttributeType, AttributeValue, UserPrincipal};
use crate::attr::{AttributeProvider, AttributeSpec};
use crate::error::{FsError, FsResult};
use crate::file::File;

const ATTRIBUTES: &[AttributeSpec] =
    &[AttributeSpec::settable_on_create("owner", AttributeType::User)];

pub struct OwnerAttributeProvider {
    default_owner: UserPrincipal,
}

impl OwnerAttributeProvider {
    pub(crate) fn new(defaults: &BTreeMap<String, AttributeValue>) -> FsResult<Self> {
        let default_owner = match defaults.get("owner:owner") {
            None => UserPrincipal("user".to_string()),
            Some(AttributeValue::User(u)) => u.clone(),
            Some(AttributeValue::String(s)) => UserPrincipal(s.clone()),
            Some(_) => {
                return Err(FsError::InvalidArgument(
                    "default value for owner:owner must be a user principal".to_string(),
                ))
            }
        };
        Ok(Self { default_owner })
    }
}

impl AttributeProvider for OwnerAttributeProvider {
    fn name(&self) -> &'static str {
        "owner"
    }

    fn attributes(&self) -> &[AttributeSpec] {
        ATTRIBUTES
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue> {
        match attr {
            "owner" => Some(
                file.stored_attribute("owner", "owner")
                    .unwrap_or_else(|| AttributeValue::User(self.default_owner.clone())),
            ),
            _ => None,
        }
    }

    fn set(&self, file: &File, attr: &str, value: AttributeValue) -> FsResult<()> {
        debug_assert_eq!(attr, "owner");
        file.set_stored_attribute("owner", "owner", value);
        Ok(())
    }

    fn apply_defaults(&self, file: &File) {
        file.set_stored_attribute("owner", "owner", AttributeValue::User(self.default_owner.clone()));
    }
}
