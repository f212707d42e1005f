// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interned, normalization-aware filename tokens

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use unicode_normalization::UnicodeNormalization;

bitflags::bitflags! {
    /// Normalizations applied to a name to produce its canonical or display
    /// form. `NFC` and `NFD` are mutually exclusive.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Normalization: u8 {
        const NFC = 1 << 0;
        const NFD = 1 << 1;
        const CASE_FOLD = 1 << 2;
        const CASE_FOLD_ASCII = 1 << 3;
    }
}

impl Normalization {
    pub(crate) fn apply(self, s: &str) -> String {
        let mut out: String = if self.contains(Normalization::NFC) {
            s.nfc().collect()
        } else if self.contains(Normalization::NFD) {
            s.nfd().collect()
        } else {
            s.to_string()
        };
        if self.contains(Normalization::CASE_FOLD) {
            out = out.chars().flat_map(char::to_lowercase).collect();
        } else if self.contains(Normalization::CASE_FOLD_ASCII) {
            out.make_ascii_lowercase();
        }
        out
    }
}

/// A single filename token.
///
/// Carries the display form used when the name was created and the canonical
/// form that drives equality, ordering and hashing. The two sentinel names
/// `.` and `..` compare by identity of their display form and are never
/// normalized.
#[derive(Clone)]
pub struct Name {
    display: Arc<str>,
    canonical: Arc<str>,
}

impl Name {
    pub(crate) fn reserved(s: &'static str) -> Self {
        let shared: Arc<str> = Arc::from(s);
        Self {
            display: shared.clone(),
            canonical: shared,
        }
    }

    /// The `.` sentinel.
    pub(crate) fn self_name() -> Self {
        Self::reserved(".")
    }

    /// The `..` sentinel.
    pub(crate) fn parent_name() -> Self {
        Self::reserved("..")
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub(crate) fn is_self(&self) -> bool {
        &*self.display == "."
    }

    pub(crate) fn is_parent(&self) -> bool {
        &*self.display == ".."
    }

    pub(crate) fn is_reserved(&self) -> bool {
        self.is_self() || self.is_parent()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.display)
    }
}

/// Intern pool producing [`Name`]s under the configured normalization policy.
///
/// Canonical strings are shared across all names with the same canonical
/// form, so map keys and comparisons work on pointer-stable data.
pub(crate) struct NameTable {
    canonical_form: Normalization,
    display_form: Normalization,
    pool: Mutex<HashMap<String, Arc<str>>>,
}

impl NameTable {
    pub(crate) fn new(canonical_form: Normalization, display_form: Normalization) -> Self {
        Self {
            canonical_form,
            display_form,
            pool: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn name(&self, s: &str) -> Name {
        if s == "." {
            return Name::self_name();
        }
        if s == ".." {
            return Name::parent_name();
        }
        let display = self.display_form.apply(s);
        let canonical = self.canonical_form.apply(&display);
        let canonical = {
            let mut pool = self.pool.lock().unwrap();
            pool.entry(canonical.clone()).or_insert_with(|| Arc::from(canonical.as_str())).clone()
        };
        let display: Arc<str> = if &*canonical == display {
            canonical.clone()
        } else {
            Arc::from(display.as_str())
        };
        Name { display, canonical }
    }
}
