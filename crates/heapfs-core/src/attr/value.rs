// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute value domain

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::time::FileTime;

/// A user principal, identified by name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserPrincipal(pub String);

impl UserPrincipal {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group principal, identified by name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupPrincipal(pub String);

impl GroupPrincipal {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One POSIX permission bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PosixPermission {
    OwnerRead,
    OwnerWrite,
    OwnerExecute,
    GroupRead,
    GroupWrite,
    GroupExecute,
    OthersRead,
    OthersWrite,
    OthersExecute,
}

impl PosixPermission {
    const ALL: [PosixPermission; 9] = [
        PosixPermission::OwnerRead,
        PosixPermission::OwnerWrite,
        PosixPermission::OwnerExecute,
        PosixPermission::GroupRead,
        PosixPermission::GroupWrite,
        PosixPermission::GroupExecute,
        PosixPermission::OthersRead,
        PosixPermission::OthersWrite,
        PosixPermission::OthersExecute,
    ];

    fn bit(self) -> u32 {
        match self {
            PosixPermission::OwnerRead => 0o400,
            PosixPermission::OwnerWrite => 0o200,
            PosixPermission::OwnerExecute => 0o100,
            PosixPermission::GroupRead => 0o040,
            PosixPermission::GroupWrite => 0o020,
            PosixPermission::GroupExecute => 0o010,
            PosixPermission::OthersRead => 0o004,
            PosixPermission::OthersWrite => 0o002,
            PosixPermission::OthersExecute => 0o001,
        }
    }

    /// Decodes the low nine mode bits into a permission set.
    pub fn from_mode(mode: u32) -> BTreeSet<PosixPermission> {
        Self::ALL.iter().copied().filter(|p| mode & p.bit() != 0).collect()
    }

    /// Encodes a permission set as mode bits.
    pub fn to_mode(perms: &BTreeSet<PosixPermission>) -> u32 {
        perms.iter().fold(0, |m, p| m | p.bit())
    }

    /// Parses the `rwxr-x---` form.
    pub fn parse_set(s: &str) -> FsResult<BTreeSet<PosixPermission>> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(FsError::InvalidArgument(format!("bad permission string: {s}")));
        }
        let mut set = BTreeSet::new();
        for (i, (&c, &perm)) in chars.iter().zip(Self::ALL.iter()).enumerate() {
            let expected = ['r', 'w', 'x'][i % 3];
            match c {
                '-' => {}
                c if c == expected => {
                    set.insert(perm);
                }
                _ => return Err(FsError::InvalidArgument(format!("bad permission string: {s}"))),
            }
        }
        Ok(set)
    }
}

/// Declared domain type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    Bool,
    Int,
    Long,
    String,
    FileTime,
    Bytes,
    Permissions,
    User,
    Group,
}

/// A value in the attribute domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    String(String),
    FileTime(FileTime),
    Bytes(Vec<u8>),
    Permissions(BTreeSet<PosixPermission>),
    User(UserPrincipal),
    Group(GroupPrincipal),
}

impl AttributeValue {
    pub fn type_of(&self) -> AttributeType {
        match self {
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::Long(_) => AttributeType::Long,
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::FileTime(_) => AttributeType::FileTime,
            AttributeValue::Bytes(_) => AttributeType::Bytes,
            AttributeValue::Permissions(_) => AttributeType::Permissions,
            AttributeValue::User(_) => AttributeType::User,
            AttributeValue::Group(_) => AttributeType::Group,
        }
    }

    /// Converts this value into the target domain type if a lossless
    /// conversion exists, consuming it. Returns `None` otherwise.
    pub fn coerce(self, target: AttributeType) -> Option<AttributeValue> {
        if self.type_of() == target {
            return Some(self);
        }
        match (self, target) {
            (AttributeValue::Int(i), AttributeType::Long) => Some(AttributeValue::Long(i as i64)),
            (AttributeValue::Long(l), AttributeType::Int) => {
                i32::try_from(l).ok().map(AttributeValue::Int)
            }
            (AttributeValue::String(s), AttributeType::User) => {
                Some(AttributeValue::User(UserPrincipal(s)))
            }
            (AttributeValue::String(s), AttributeType::Group) => {
                Some(AttributeValue::Group(GroupPrincipal(s)))
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            AttributeValue::Long(l) => Some(*l),
            AttributeValue::Int(i) => Some(*i as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file_time(&self) -> Option<FileTime> {
        match self {
            AttributeValue::FileTime(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_permissions(&self) -> Option<&BTreeSet<PosixPermission>> {
        match self {
            AttributeValue::Permissions(p) => Some(p),
            _ => None,
        }
    }
}
