// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The `basic` attribute view

use crate::attr::value::{AttributeType, AttributeValue};
use crate::attr::{AttributeProvider, AttributeSpec, ReadableAttributes};
use crate::error::{FsError, FsResult};
use crate::file::{File, FileId};
use crate::time::FileTime;

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::read_only("size", AttributeType::Long),
    AttributeSpec::read_only("fileKey", AttributeType::Long),
    AttributeSpec::read_only("isDirectory", AttributeType::Bool),
    AttributeSpec::read_only("isRegularFile", AttributeType::Bool),
    AttributeSpec::read_only("isSymbolicLink", AttributeType::Bool),
    AttributeSpec::read_only("isOther", AttributeType::Bool),
    AttributeSpec::writable("lastModifiedTime", AttributeType::FileTime),
    AttributeSpec::writable("lastAccessTime", AttributeType::FileTime),
    AttributeSpec::writable("creationTime", AttributeType::FileTime),
];

/// Answers the nine basic attributes straight from the node header.
pub struct BasicAttributeProvider;

impl AttributeProvider for BasicAttributeProvider {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn attributes(&self) -> &[AttributeSpec] {
        ATTRIBUTES
    }

    fn get(&self, file: &File, attr: &str) -> Option<AttributeValue> {
        match attr {
            "size" => Some(AttributeValue::Long(file.size() as i64)),
            "fileKey" => Some(AttributeValue::Long(file.id().as_u64() as i64)),
            "isDirectory" => Some(AttributeValue::Bool(file.is_directory())),
            "isRegularFile" => Some(AttributeValue::Bool(file.is_regular_file())),
            "isSymbolicLink" => Some(AttributeValue::Bool(file.is_symbolic_link())),
            "isOther" => Some(AttributeValue::Bool(false)),
            "lastModifiedTime" => Some(AttributeValue::FileTime(file.last_modified_time())),
            "lastAccessTime" => Some(AttributeValue::FileTime(file.last_access_time())),
            "creationTime" => Some(AttributeValue::FileTime(file.creation_time())),
            _ => None,
        }
    }

    fn set(&self, file: &File, attr: &str, value: AttributeValue) -> FsResult<()> {
        let time = value
            .as_file_time()
            .ok_or_else(|| FsError::InvalidArgument(format!("basic:{attr} expects a time")))?;
        match attr {
            "lastModifiedTime" => file.set_last_modified_time(time),
            "lastAccessTime" => file.set_last_access_time(time),
            "creationTime" => file.set_creation_time(time),
            _ => return Err(FsError::InvalidAttribute(format!("basic:{attr}"))),
        }
        Ok(())
    }
}

/// Owned snapshot of the basic view.
#[derive(Clone, Debug)]
pub struct BasicFileAttributes {
    pub last_modified_time: FileTime,
    pub last_access_time: FileTime,
    pub creation_time: FileTime,
    pub size: u64,
    pub file_key: FileId,
    pub is_regular_file: bool,
    pub is_directory: bool,
    pub is_symbolic_link: bool,
    pub is_other: bool,
}

impl ReadableAttributes for BasicFileAttributes {
    const VIEW: &'static str = "basic";

    fn read_from(file: &File) -> Self {
        Self {
            last_modified_time: file.last_modified_time(),
            last_access_time: file.last_access_time(),
            creation_time: file.creation_time(),
            size: file.size(),
            file_key: file.id(),
            is_regular_file: file.is_regular_file(),
            is_directory: file.is_directory(),
            is_symbolic_link: file.is_symbolic_link(),
            is_other: false,
        }
    }
}
