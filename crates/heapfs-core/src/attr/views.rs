// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute view objects bound to a file lookup
//!
//! A view holds the path it was created for and re-resolves it on every
//! call, so the view keeps working across renames of the target and fails
//! with not-found once the file is gone.

use std::collections::BTreeSet;

use crate::attr::value::{
    AttributeValue, GroupPrincipal, PosixPermission, UserPrincipal,
};
use crate::attr::{BasicFileAttributes, DosFileAttributes, PosixFileAttributes};
use crate::error::{FsError, FsResult};
use crate::state::FileSystem;
use crate::time::FileTime;
use crate::tree::LinkPolicy;

/// The `basic` view bound to one path.
pub struct BasicFileAttributeView<'fs> {
    fs: &'fs FileSystem,
    path: String,
    policy: LinkPolicy,
}

/// The `owner` view bound to one path.
pub struct OwnerFileAttributeView<'fs> {
    fs: &'fs FileSystem,
    path: String,
    policy: LinkPolicy,
}

/// The `posix` view bound to one path.
pub struct PosixFileAttributeView<'fs> {
    fs: &'fs FileSystem,
    path: String,
    policy: LinkPolicy,
}

/// The `dos` view bound to one path.
pub struct DosFileAttributeView<'fs> {
    fs: &'fs FileSystem,
    path: String,
    policy: LinkPolicy,
}

/// The `user` view bound to one path: named byte-array attributes.
pub struct UserDefinedFileAttributeView<'fs> {
    fs: &'fs FileSystem,
    path: String,
    policy: LinkPolicy,
}

impl FileSystem {
    /// The `basic` view, supported by every instance.
    pub fn basic_file_attribute_view<'fs>(
        &'fs self,
        path: &str,
        policy: LinkPolicy,
    ) -> BasicFileAttributeView<'fs> {
        BasicFileAttributeView {
            fs: self,
            path: path.to_string(),
            policy,
        }
    }

    /// The `owner` view, or `None` when the view is not enabled.
    pub fn owner_file_attribute_view<'fs>(
        &'fs self,
        path: &str,
        policy: LinkPolicy,
    ) -> Option<OwnerFileAttributeView<'fs>> {
        self.attrs.supports("owner").then(|| OwnerFileAttributeView {
            fs: self,
            path: path.to_string(),
            policy,
        })
    }

    /// The `posix` view, or `None` when the view is not enabled.
    pub fn posix_file_attribute_view<'fs>(
        &'fs self,
        path: &str,
        policy: LinkPolicy,
    ) -> Option<PosixFileAttributeView<'fs>> {
        self.attrs.supports("posix").then(|| PosixFileAttributeView {
            fs: self,
            path: path.to_string(),
            policy,
        })
    }

    /// The `dos` view, or `None` when the view is not enabled.
    pub fn dos_file_attribute_view<'fs>(
        &'fs self,
        path: &str,
        policy: LinkPolicy,
    ) -> Option<DosFileAttributeView<'fs>> {
        self.attrs.supports("dos").then(|| DosFileAttributeView {
            fs: self,
            path: path.to_string(),
            policy,
        })
    }

    /// The `user` view, or `None` when the view is not enabled.
    pub fn user_defined_file_attribute_view<'fs>(
        &'fs self,
        path: &str,
        policy: LinkPolicy,
    ) -> Option<UserDefinedFileAttributeView<'fs>> {
        self.attrs.supports("user").then(|| UserDefinedFileAttributeView {
            fs: self,
            path: path.to_string(),
            policy,
        })
    }
}

impl BasicFileAttributeView<'_> {
    pub fn name(&self) -> &'static str {
        "basic"
    }

    pub fn read_attributes(&self) -> FsResult<BasicFileAttributes> {
        self.fs.read_attributes(&self.path, self.policy)
    }

    /// Sets any of the three timestamps; `None` leaves a time unchanged.
    pub fn set_times(
        &self,
        modified: Option<FileTime>,
        accessed: Option<FileTime>,
        created: Option<FileTime>,
    ) -> FsResult<()> {
        let file = self.fs.resolve_file(&self.path, self.policy)?;
        if let Some(t) = modified {
            file.set_last_modified_time(t);
        }
        if let Some(t) = accessed {
            file.set_last_access_time(t);
        }
        if let Some(t) = created {
            file.set_creation_time(t);
        }
        Ok(())
    }
}

impl OwnerFileAttributeView<'_> {
    pub fn name(&self) -> &'static str {
        "owner"
    }

    pub fn get_owner(&self) -> FsResult<UserPrincipal> {
        match self.fs.get_attribute(&self.path, "owner:owner", self.policy)? {
            AttributeValue::User(user) => Ok(user),
            _ => Err(FsError::InvalidAttribute("owner:owner".to_string())),
        }
    }

    pub fn set_owner(&self, owner: UserPrincipal) -> FsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "owner:owner",
            AttributeValue::User(owner),
            self.policy,
        )
    }
}

impl PosixFileAttributeView<'_> {
    pub fn name(&self) -> &'static str {
        "posix"
    }

    pub fn read_attributes(&self) -> FsResult<PosixFileAttributes> {
        self.fs.read_attributes(&self.path, self.policy)
    }

    pub fn set_permissions(&self, permissions: BTreeSet<PosixPermission>) -> FsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "posix:permissions",
            AttributeValue::Permissions(permissions),
            self.policy,
        )
    }

    pub fn set_group(&self, group: GroupPrincipal) -> FsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "posix:group",
            AttributeValue::Group(group),
            self.policy,
        )
    }

    pub fn set_times(
        &self,
        modified: Option<FileTime>,
        accessed: Option<FileTime>,
        created: Option<FileTime>,
    ) -> FsResult<()> {
        self.fs
            .basic_file_attribute_view(&self.path, self.policy)
            .set_times(modified, accessed, created)
    }
}

impl DosFileAttributeView<'_> {
    pub fn name(&self) -> &'static str {
        "dos"
    }

    pub fn read_attributes(&self) -> FsResult<DosFileAttributes> {
        self.fs.read_attributes(&self.path, self.policy)
    }

    fn set_flag(&self, attr: &str, value: bool) -> FsResult<()> {
        self.fs.set_attribute(
            &self.path,
            &format!("dos:{attr}"),
            AttributeValue::Bool(value),
            self.policy,
        )
    }

    pub fn set_readonly(&self, value: bool) -> FsResult<()> {
        self.set_flag("readonly", value)
    }

    pub fn set_hidden(&self, value: bool) -> FsResult<()> {
        self.set_flag("hidden", value)
    }

    pub fn set_system(&self, value: bool) -> FsResult<()> {
        self.set_flag("system", value)
    }

    pub fn set_archive(&self, value: bool) -> FsResult<()> {
        self.set_flag("archive", value)
    }

    pub fn set_times(
        &self,
        modified: Option<FileTime>,
        accessed: Option<FileTime>,
        created: Option<FileTime>,
    ) -> FsResult<()> {
        self.fs
            .basic_file_attribute_view(&self.path, self.policy)
            .set_times(modified, accessed, created)
    }
}

impl UserDefinedFileAttributeView<'_> {
    pub fn name(&self) -> &'static str {
        "user"
    }

    pub fn list(&self) -> FsResult<Vec<String>> {
        let file = self.fs.resolve_file(&self.path, self.policy)?;
        Ok(file.stored_attribute_names("user"))
    }

    pub fn size(&self, attr: &str) -> FsResult<usize> {
        Ok(self.read(attr)?.len())
    }

    pub fn read(&self, attr: &str) -> FsResult<Vec<u8>> {
        let value = self.fs.get_attribute(&self.path, &format!("user:{attr}"), self.policy)?;
        match value {
            AttributeValue::Bytes(bytes) => Ok(bytes),
            _ => Err(FsError::InvalidAttribute(format!("user:{attr}"))),
        }
    }

    pub fn write(&self, attr: &str, value: &[u8]) -> FsResult<()> {
        self.fs.set_attribute(
            &self.path,
            &format!("user:{attr}"),
            AttributeValue::Bytes(value.to_vec()),
            self.policy,
        )
    }

    pub fn delete(&self, attr: &str) -> FsResult<()> {
        let file = self.fs.resolve_file(&self.path, self.policy)?;
        file.remove_stored_attribute("user", attr);
        Ok(())
    }
}
