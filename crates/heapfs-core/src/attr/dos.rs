// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `dos` attribute view

use crate::attr::basic::BasicFileAttributes;
use crate::attr::value::{AttributeType, AttributeValue};
use crate::attr::{AttributeProvider, AttributeSpec, ReadableAttributes};
use crate::error::FsResult;
use crate::file::File;

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::writable("readonly", AttributeType::Bool),
    AttributeSpec::writable("hidden", AttributeType::Bool),
    AttributeSpec::writable("system", AttributeType::Bool),
    AttributeSpec::writable("archive", AttributeType::Bool),
];

pub struct DosAttributeProvider;

impl AttributeProvider for DosAttributeProvider {
    fn name(&self) -> &'static str {
        "dos"
    }

    fn inherits(&self) -> &[&'static str] {
        &["basic"]
    }

    fn attributes(&self) -> &[AttributeSpec] {
        ATTRIBUTES
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue> {
        if !ATTRIBUTES.iter().any(|a| a.name == attr) {
            return None;
        }
        Some(file.stored_attribute("dos", attr).unwrap_or(AttributeValue::Bool(false)))
    }

    fn set(&self, file: &File, attr: &str, value: AttributeValue) -> FsResult<()> {
        file.set_stored_attribute("dos", attr, value);
        Ok(())
    }

    fn apply_defaults(&self, file: &File) {
        for decl in ATTRIBUTES {
            file.set_stored_attribute("dos", decl.name, AttributeValue::Bool(false));
        }
    }
}

/// Owned snapshot of the dos view, including the inherited basic attributes.
#[derive(Clone, Debug)]
pub struct DosFileAttributes {
    pub basic: BasicFileAttributes,
    pub readonly: bool,
    pub hidden: bool,
    pub system: bool,
    pub archive: bool,
}

impl ReadableAttributes for DosFileAttributes {
    const VIEW: &'static str = "dos";

    fn read_from(file: &File) -> Self {
        let flag = |name: &str| {
            matches!(
                file.stored_attribute("dos", name),
                Some(AttributeValue::Bool(true))
            )
        };
        Self {
            basic: BasicFileAttributes::read_from(file),
            readonly: flag("readonly"),
            hidden: flag("hidden"),
            system: flag("system"),
            archive: flag("archive"),
        }
    }
}
