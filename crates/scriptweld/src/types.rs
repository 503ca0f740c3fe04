//! Shared type definitions for the scriptweld crate
//!
//! This module contains common types that are used across multiple components
//! of the bundler, ensuring consistency and avoiding circular dependencies.

use std::{
    hash::BuildHasherDefault,
    path::{Component, Path},
};

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Type alias for FxHasher-based IndexMap
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Type alias for FxHasher-based IndexSet
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Classification of an import specifier based on how it is written
///
/// Only relative and rooted specifiers name files inside the source tree;
/// everything else (package names, URLs) passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecifierKind {
    /// `./x` or `../x`, resolved against the importing module's directory
    Relative,

    /// `/x`, resolved against the source root
    Rooted,

    /// Bare names such as `lodash`; never resolved or validated
    External,
}

impl SpecifierKind {
    pub fn classify(specifier: &str) -> Self {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            Self::Relative
        } else if specifier.starts_with('/') {
            Self::Rooted
        } else {
            Self::External
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

impl std::fmt::Display for SpecifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relative => write!(f, "relative"),
            Self::Rooted => write!(f, "rooted"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Render a path with `/` separators so output does not depend on the host OS
pub fn display_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
