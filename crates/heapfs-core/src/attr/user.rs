// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `user` attribute view: arbitrary byte-array attributes

use crate::attr::value::AttributeValue;
use crate::attr::{AttributeProvider, AttributeSpec};
use crate::error::FsResult;
use crate::file::File;

pub struct UserAttributeProvider;

impl AttributeProvider for UserAttributeProvider {
    fn name(&self) -> &'static str {
        "user"
    }

    fn attributes(&self) -> &[AttributeSpec] {
        &[]
    }

    fn open_namespace(&self) -> bool {
        true
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue> {
        file.stored_attribute("user", attr)
    }

    fn set(&self, file: &File, attr: &str, value: AttributeValue) -> FsResult<()> {
        file.set_stored_attribute("user", attr, value);
        Ok(())
    }

    fn stored_names(&self, file: &File) -> Vec<String> {
        file.stored_attribute_names("user")
    }
}
