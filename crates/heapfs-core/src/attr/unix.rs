// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `unix` attribute view

use std::collections::HashMap;
use std::sync::Mutex;

use crate::attr::value::{AttributeType, AttributeValue, PosixPermission};
use crate::attr::{AttributeProvider, AttributeSpec};
use crate::error::{FsError, FsResult};
use crate::file::File;

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::read_only("uid", AttributeType::Int),
    AttributeSpec::read_only("gid", AttributeType::Int),
    AttributeSpec::read_only("mode", AttributeType::Int),
    AttributeSpec::read_only("ctime", AttributeType::FileTime),
    AttributeSpec::read_only("ino", AttributeType::Long),
    AttributeSpec::read_only("dev", AttributeType::Long),
    AttributeSpec::read_only("rdev", AttributeType::Long),
    AttributeSpec::read_only("nlink", AttributeType::Int),
];

/// Read-only unix attributes derived from the node header and the posix
/// view. Principal names map to stable synthetic ids, handed out from 1000
/// in first-seen order.
pub struct UnixAttributeProvider {
    ids: Mutex<HashMap<String, i32>>,
}

impl UnixAttributeProvider {
    pub(crate) fn new() -> Self {
        Self {
            ids: Mutex::new(HashMap::new()),
        }
    }

    fn id_for(&self, principal: &str) -> i32 {
        let mut ids = self.ids.lock().unwrap();
        let next = 1000 + ids.len() as i32;
        *ids.entry(principal.to_string()).or_insert(next)
    }
}

impl AttributeProvider for UnixAttributeProvider {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn inherits(&self) -> &[&'static str] {
        &["basic", "owner", "posix"]
    }

    fn attributes(&self) -> &[AttributeSpec] {
        ATTRIBUTES
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue> {
        match attr {
            "uid" => {
                let owner = match file.stored_attribute("owner", "owner") {
                    Some(AttributeValue::User(u)) => u.0,
                    _ => "user".to_string(),
                };
                Some(AttributeValue::Int(self.id_for(&owner)))
            }
            "gid" => {
                let group = match file.stored_attribute("posix", "group") {
                    Some(AttributeValue::Group(g)) => g.0,
                    _ => "group".to_string(),
                };
                Some(AttributeValue::Int(self.id_for(&group)))
            }
            "mode" => {
                let mode = match file.stored_attribute("posix", "permissions") {
                    Some(AttributeValue::Permissions(p)) => PosixPermission::to_mode(&p),
                    _ => 0o644,
                };
                Some(AttributeValue::Int(mode as i32))
            }
            "ctime" => Some(AttributeValue::FileTime(file.creation_time())),
            "ino" => Some(AttributeValue::Long(file.id().as_u64() as i64)),
            "dev" => Some(AttributeValue::Long(1)),
            "rdev" => Some(AttributeValue::Long(0)),
            "nlink" => Some(AttributeValue::Int(file.link_count() as i32)),
            _ => None,
        }
    }

    fn set(&self, _file: &File, attr: &str, _value: AttributeValue) -> FsResult<()> {
        // every unix attribute is read-only through the service
        Err(FsError::InvalidArgument(format!("attribute is not settable: unix:{attr}")))
    }
}
