// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Virtual path values and the configured path syntax

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::name::{Name, NameTable, Normalization};

/// Path syntax flavor: separator and root form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStyle {
    /// `/`-separated with the single root `/`.
    Unix,
    /// `\`-separated (accepting `/`) with drive-letter roots like `C:\`.
    Windows,
}

impl PathStyle {
    pub fn separator(self) -> char {
        match self {
            PathStyle::Unix => '/',
            PathStyle::Windows => '\\',
        }
    }

    fn is_separator(self, c: char) -> bool {
        match self {
            PathStyle::Unix => c == '/',
            PathStyle::Windows => c == '\\' || c == '/',
        }
    }
}

/// Rendering/equality parameters carried by every path value.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathFlavor {
    pub(crate) style: PathStyle,
    pub(crate) canonical_equality: bool,
}

/// An immutable virtual path: an optional root plus a sequence of names.
///
/// Paths are pure values; none of the operations below touch the filesystem.
#[derive(Clone, Debug)]
pub struct VPath {
    flavor: PathFlavor,
    root: Option<Name>,
    names: Vec<Name>,
}

impl VPath {
    pub(crate) fn new(flavor: PathFlavor, root: Option<Name>, names: Vec<Name>) -> Self {
        Self { flavor, root, names }
    }

    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Name> {
        self.root.as_ref()
    }

    pub fn file_name(&self) -> Option<&Name> {
        self.names.last()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, index: usize) -> Option<&Name> {
        self.names.get(index)
    }

    pub(crate) fn names(&self) -> &[Name] {
        &self.names
    }

    /// The parent path, or `None` for a bare root or a single relative name.
    pub fn parent(&self) -> Option<VPath> {
        if self.names.is_empty() {
            return None;
        }
        if self.names.len() == 1 && self.root.is_none() {
            return None;
        }
        Some(VPath::new(
            self.flavor,
            self.root.clone(),
            self.names[..self.names.len() - 1].to_vec(),
        ))
    }

    /// A relative path over `names[begin..end]`.
    pub fn subpath(&self, begin: usize, end: usize) -> FsResult<VPath> {
        if begin >= end || end > self.names.len() {
            return Err(FsError::InvalidArgument(format!(
                "subpath range {begin}..{end} out of bounds for {} names",
                self.names.len()
            )));
        }
        Ok(VPath::new(self.flavor, None, self.names[begin..end].to_vec()))
    }

    /// Removes `.` segments and collapses `..` against prior non-`..` names.
    pub fn normalize(&self) -> VPath {
        let mut out: Vec<Name> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            if name.is_self() {
                continue;
            }
            if name.is_parent() {
                match out.last() {
                    Some(prev) if !prev.is_parent() => {
                        out.pop();
                    }
                    _ if self.root.is_some() => {
                        // `..` at an absolute root resolves to the root itself
                    }
                    _ => out.push(name.clone()),
                }
                continue;
            }
            out.push(name.clone());
        }
        VPath::new(self.flavor, self.root.clone(), out)
    }

    /// Resolves `other` against this path. An absolute `other` wins; an empty
    /// `other` yields `self`.
    pub fn resolve(&self, other: &VPath) -> VPath {
        if other.is_absolute() {
            return other.clone();
        }
        if other.names.is_empty() {
            return self.clone();
        }
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        VPath::new(self.flavor, self.root.clone(), names)
    }

    pub(crate) fn resolve_name(&self, name: Name) -> VPath {
        let mut names = self.names.clone();
        names.push(name);
        VPath::new(self.flavor, self.root.clone(), names)
    }

    /// Constructs a relative path from `self` to `other`. Both paths must be
    /// of the same kind (absolute with equal roots, or both relative).
    pub fn relativize(&self, other: &VPath) -> FsResult<VPath> {
        if self.root() != other.root() {
            return Err(FsError::InvalidArgument(format!(
                "cannot relativize {other} against {self}"
            )));
        }
        let common = self
            .names
            .iter()
            .zip(other.names.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let mut names: Vec<Name> = Vec::new();
        for _ in common..self.names.len() {
            names.push(Name::parent_name());
        }
        names.extend(other.names[common..].iter().cloned());
        Ok(VPath::new(self.flavor, None, names))
    }

    /// Resolves this path against `cwd` if it is relative.
    pub fn to_absolute(&self, cwd: &VPath) -> VPath {
        if self.is_absolute() {
            self.clone()
        } else {
            cwd.resolve(self)
        }
    }
}

impl PartialEq for VPath {
    fn eq(&self, other: &Self) -> bool {
        if self.flavor.canonical_equality {
            self.root == other.root && self.names == other.names
        } else {
            self.root.as_ref().map(Name::display) == other.root.as_ref().map(Name::display)
                && self.names.len() == other.names.len()
                && self
                    .names
                    .iter()
                    .zip(other.names.iter())
                    .all(|(a, b)| a.display() == b.display())
        }
    }
}

impl Eq for VPath {}

impl Hash for VPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.flavor.canonical_equality {
            self.root.as_ref().map(Name::canonical).hash(state);
            for n in &self.names {
                n.canonical().hash(state);
            }
        } else {
            self.root.as_ref().map(Name::display).hash(state);
            for n in &self.names {
                n.display().hash(state);
            }
        }
    }
}

impl fmt::Display for VPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = self.flavor.style.separator();
        if let Some(root) = &self.root {
            match self.flavor.style {
                PathStyle::Unix => f.write_str(root.display())?,
                PathStyle::Windows => write!(f, "{}{}", root.display(), sep)?,
            }
        }
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, "{sep}")?;
            }
            f.write_str(name.display())?;
        }
        Ok(())
    }
}

/// Parses and renders path strings for one filesystem instance, interning
/// names through its [`NameTable`].
pub(crate) struct PathService {
    flavor: PathFlavor,
    names: NameTable,
}

impl PathService {
    pub(crate) fn new(
        style: PathStyle,
        canonical_form: Normalization,
        display_form: Normalization,
        canonical_equality: bool,
    ) -> Self {
        Self {
            flavor: PathFlavor {
                style,
                canonical_equality,
            },
            names: NameTable::new(canonical_form, display_form),
        }
    }

    pub(crate) fn name(&self, s: &str) -> Name {
        self.names.name(s)
    }

    pub(crate) fn parse(&self, input: &str) -> FsResult<VPath> {
        let (root, rest) = self.split_root(input)?;
        let mut names = Vec::new();
        for segment in rest.split(|c| self.flavor.style.is_separator(c)) {
            if segment.is_empty() {
                continue;
            }
            self.check_segment(input, segment)?;
            names.push(self.names.name(segment));
        }
        Ok(VPath::new(self.flavor, root, names))
    }

    fn split_root<'a>(&self, input: &'a str) -> FsResult<(Option<Name>, &'a str)> {
        match self.flavor.style {
            PathStyle::Unix => {
                if let Some(rest) = input.strip_prefix('/') {
                    Ok((Some(self.names.name("/")), rest))
                } else {
                    Ok((None, input))
                }
            }
            PathStyle::Windows => {
                let bytes = input.as_bytes();
                if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
                    let rest = &input[2..];
                    if rest.is_empty() || self.flavor.style.is_separator(rest.chars().next().unwrap())
                    {
                        return Ok((Some(self.names.name(&input[..2])), rest));
                    }
                    return Err(FsError::InvalidArgument(format!("bad path syntax: {input}")));
                }
                if !input.is_empty() && self.flavor.style.is_separator(bytes[0] as char) {
                    return Err(FsError::InvalidArgument(format!(
                        "rootless absolute path: {input}"
                    )));
                }
                Ok((None, input))
            }
        }
    }

    fn check_segment(&self, path: &str, segment: &str) -> FsResult<()> {
        let invalid = match self.flavor.style {
            PathStyle::Unix => segment.contains('\0'),
            PathStyle::Windows => segment
                .chars()
                .any(|c| matches!(c, '\0' | '<' | '>' | ':' | '"' | '|' | '?' | '*')),
        };
        if invalid {
            return Err(FsError::InvalidArgument(format!("bad path syntax: {path}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix() -> PathService {
        PathService::new(
            PathStyle::Unix,
            Normalization::empty(),
            Normalization::empty(),
            false,
        )
    }

    fn windows() -> PathService {
        PathService::new(
            PathStyle::Windows,
            Normalization::CASE_FOLD_ASCII,
            Normalization::empty(),
            true,
        )
    }

    #[test]
    fn test_parse_absolute_unix() {
        let svc = unix();
        let p = svc.parse("/work/a/b").unwrap();
        assert!(p.is_absolute());
        assert_eq!(p.name_count(), 3);
        assert_eq!(p.to_string(), "/work/a/b");
    }

    #[test]
    fn test_parse_collapses_repeated_separators() {
        let svc = unix();
        let p = svc.parse("//work///a").unwrap();
        assert_eq!(p.to_string(), "/work/a");
    }

    #[test]
    fn test_parent_and_file_name() {
        let svc = unix();
        let p = svc.parse("/work/a").unwrap();
        assert_eq!(p.file_name().unwrap().display(), "a");
        assert_eq!(p.parent().unwrap().to_string(), "/work");
        assert_eq!(svc.parse("/").unwrap().parent(), None);
        assert_eq!(svc.parse("a").unwrap().parent(), None);
    }

    #[test]
    fn test_normalize() {
        let svc = unix();
        assert_eq!(svc.parse("/a/./b/../c").unwrap().normalize().to_string(), "/a/c");
        assert_eq!(svc.parse("../a").unwrap().normalize().to_string(), "../a");
        assert_eq!(svc.parse("/../a").unwrap().normalize().to_string(), "/a");
        assert_eq!(svc.parse("a/b/../../..").unwrap().normalize().to_string(), "..");
    }

    #[test]
    fn test_resolve_and_relativize() {
        let svc = unix();
        let base = svc.parse("/work").unwrap();
        let rel = svc.parse("x/y").unwrap();
        assert_eq!(base.resolve(&rel).to_string(), "/work/x/y");
        assert_eq!(base.resolve(&svc.parse("/etc").unwrap()).to_string(), "/etc");

        let a = svc.parse("/work/a/b").unwrap();
        let b = svc.parse("/work/c").unwrap();
        assert_eq!(a.relativize(&b).unwrap().to_string(), "../../c");
        assert!(svc.parse("a").unwrap().relativize(&b).is_err());
    }

    #[test]
    fn test_windows_roots() {
        let svc = windows();
        let p = svc.parse("C:\\work\\sub").unwrap();
        assert!(p.is_absolute());
        assert_eq!(p.root().unwrap().display(), "C:");
        assert_eq!(p.to_string(), "C:\\work\\sub");
        // forward slashes accepted on parse
        assert_eq!(svc.parse("C:/work/sub").unwrap(), p);
    }

    #[test]
    fn test_windows_case_insensitive_equality() {
        let svc = windows();
        assert_eq!(svc.parse("C:\\Foo").unwrap(), svc.parse("c:\\foo").unwrap());
    }

    #[test]
    fn test_windows_rejects_reserved_characters() {
        let svc = windows();
        assert!(svc.parse("C:\\a<b").is_err());
        assert!(svc.parse("C:\\a?b").is_err());
    }
}
