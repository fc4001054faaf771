//! Hierarchical path values addressing files and directories in the
//! distributed namespace.
//!
//! A path is an immutable sequence of non-empty components. The empty
//! sequence is the root. The canonical string form is `/` for the root and
//! `/` + components joined by `/` otherwise; paths are totally ordered by
//! lexicographic comparison of that form.


use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separator between components in the canonical string form.
pub const SEPARATOR: char = '/';

/// Reserved for the wire format; never valid inside a path.
pub const RESERVED: char = ':';

/// An immutable path in the distributed namespace.
///
/// Equality and hashing derive from the component sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DfsPath {
    components: Vec<String>,
}

impl DfsPath {
    /// The root path (the empty component sequence).
    pub fn root() -> DfsPath {
        DfsPath { components: Vec::new() }
    }

    /// Parses a path from its string form.
    ///
    /// The string must begin with `/` and must not contain `:`. Empty
    /// components between slashes are discarded, so `//a///b` parses the
    /// same as `/a/b`.
    pub fn parse(raw: &str) -> Result<DfsPath> {
        if !raw.starts_with(SEPARATOR) {
            return Err(Error::InvalidArgument(format!("path does not begin with '/': {raw:?}")));
        }
        if raw.contains(RESERVED) {
            return Err(Error::InvalidArgument(format!("path contains ':': {raw:?}")));
        }
        let components = raw
            .split(SEPARATOR)
            .filter(|component| !component.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(DfsPath { components })
    }

    /// Returns this path extended by one component.
    ///
    /// The component must be non-empty and must not contain `/` or `:`.
    pub fn child(&self, component: &str) -> Result<DfsPath> {
        if component.is_empty() {
            return Err(Error::InvalidArgument("empty path component".to_owned()));
        }
        if component.contains(SEPARATOR) || component.contains(RESERVED) {
            return Err(Error::InvalidArgument(format!(
                "path component contains a separator or ':': {component:?}"
            )));
        }
        let mut components = self.components.clone();
        components.push(component.to_owned());
        Ok(DfsPath { components })
    }

    /// True iff this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The number of components.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// The path with the final component removed. `None` on the root.
    pub fn parent(&self) -> Option<DfsPath> {
        if self.is_root() {
            return None;
        }
        let mut components = self.components.clone();
        components.pop();
        Some(DfsPath { components })
    }

    /// The final component. `None` on the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Components in order, root first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// True iff `other` is a prefix of this path.
    ///
    /// Every path is a subpath of itself, and every path is a subpath of
    /// the root.
    pub fn is_subpath(&self, other: &DfsPath) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    /// The component of this path immediately below `parent`.
    ///
    /// Fails unless this path is a strict descendant of `parent`.
    pub fn direct_child(&self, parent: &DfsPath) -> Result<&str> {
        if self == parent || !self.is_subpath(parent) {
            return Err(Error::InvalidArgument(format!(
                "{self} is not a strict descendant of {parent}"
            )));
        }
        Ok(&self.components[parent.components.len()])
    }

    /// Joins the components beneath a host filesystem root.
    ///
    /// Used by storage nodes to locate the on-disk file backing a
    /// namespace path.
    pub fn to_file(&self, root: &Path) -> PathBuf {
        let mut file = root.to_path_buf();
        for component in &self.components {
            file.push(component);
        }
        file
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl FromStr for DfsPath {
    type Err = Error;

    fn from_str(raw: &str) -> Result<DfsPath> {
        DfsPath::parse(raw)
    }
}

impl Ord for DfsPath {
    fn cmp(&self, other: &Self) -> Ordering {
        // Canonical-string order, not componentwise order: "/a!" sorts
        // before "/a/b" because '!' < '/'.
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for DfsPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
