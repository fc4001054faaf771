//! The in-memory directory tree: files, directories, and their mapping to
//! storage nodes.
//!
//! The namespace is an explicit tree of nodes rooted at `/`. Directory
//! nodes map child names to child nodes; file nodes record the storage
//! node hosting them. Directory nodes may carry a *stamp*, the handle pair
//! of the registration that materialized them, which drives placement of
//! files created beneath them later.
//!
//! The tree is plain data with no interior locking. Callers serialize
//! access through the naming facade's monitor and hold the appropriate
//! path locks. Mutators that need an outbound directive are split into a
//! `prepare_*` step (validate, pick the target node) and a `commit_*` step
//! (re-validate, apply), so the facade can run the directive RPC between
//! the two without the monitor.


use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::path::DfsPath;
use crate::storage::{CommandHandle, NodePair, StorageHandle};

/// Index of a registered storage node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Outcome of [`Tree::prepare_create_file`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CreateFileStep {
    /// The path (or the root) is already present; the operation reports
    /// `false` without contacting any storage node.
    AlreadyPresent,
    /// Issue `create` to this node, then commit.
    Host(NodeId),
}

/// Outcome of [`Tree::prepare_delete`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeleteStep {
    /// The root cannot be deleted; the operation reports `false`.
    Root,
    /// Issue `delete` to the owning node (when there is one), then commit.
    Target {
        /// `None` only when no storage node has ever been registered, in
        /// which case there is no disk state to clean up.
        owner: Option<NodeId>,
    },
}

enum NodeKind {
    Directory { explicit: bool, stamp: Option<NodeId> },
    File { owner: NodeId },
}

struct Node {
    children: HashMap<String, Node>,
    kind: NodeKind,
}

impl Node {
    fn directory(explicit: bool, stamp: Option<NodeId>) -> Node {
        Node { children: HashMap::new(), kind: NodeKind::Directory { explicit, stamp } }
    }

    fn file(owner: NodeId) -> Node {
        Node { children: HashMap::new(), kind: NodeKind::File { owner } }
    }

    fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    fn is_implicit_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { explicit: false, .. })
    }

    fn stamp(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Directory { stamp, .. } => stamp,
            NodeKind::File { owner } => Some(owner),
        }
    }
}

/// The directory tree plus the set of registered storage nodes.
pub struct Tree {
    root: Node,
    nodes: Vec<NodePair>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Tree {
        // The root is a permanent directory; marking it explicit keeps it
        // out of the implicit-ancestor pruning done after deletions.
        Tree { root: Node::directory(true, None), nodes: Vec::new() }
    }

    /// Number of registered storage nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Admits a new storage node.
    ///
    /// Fails with [`Error::AlreadyRegistered`] if either handle is already
    /// known. The first registration stamps the root, so placement is
    /// defined even for nodes that register no files.
    pub fn admit_pair(&mut self, pair: NodePair) -> Result<NodeId> {
        if self
            .nodes
            .iter()
            .any(|known| known.storage == pair.storage || known.command == pair.command)
        {
            return Err(Error::AlreadyRegistered);
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(pair);
        if let NodeKind::Directory { stamp: stamp @ None, .. } = &mut self.root.kind {
            *stamp = Some(id);
        }
        Ok(id)
    }

    /// True iff `path` is present: an explicitly created directory or
    /// file, or an ancestor of one.
    pub fn contains(&self, path: &DfsPath) -> bool {
        self.node(path).is_some()
    }

    /// True iff `path` is a present directory.
    ///
    /// Fails with [`Error::NotFound`] if the path is absent.
    pub fn is_directory(&self, path: &DfsPath) -> Result<bool> {
        let node = self.node(path).ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(node.is_directory())
    }

    /// The sorted names of the entries directly under the directory
    /// `path`.
    ///
    /// Fails with [`Error::NotFound`] if `path` is absent or a file.
    pub fn list(&self, path: &DfsPath) -> Result<Vec<String>> {
        let node = self.node(path).ok_or_else(|| Error::NotFound(path.to_string()))?;
        if !node.is_directory() {
            return Err(Error::NotFound(format!("{path} is not a directory")));
        }
        let mut names: Vec<String> = node.children.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// The storage handle of the file `path`.
    ///
    /// Fails with [`Error::NotFound`] if the path is absent or a
    /// directory.
    pub fn storage_for(&self, path: &DfsPath) -> Result<StorageHandle> {
        let node = self.node(path).ok_or_else(|| Error::NotFound(path.to_string()))?;
        match node.kind {
            NodeKind::File { owner } => Ok(self.nodes[owner.0].storage),
            NodeKind::Directory { .. } => {
                Err(Error::NotFound(format!("{path} is not a file")))
            }
        }
    }

    /// The command handle of a registered node.
    pub fn command_of(&self, id: NodeId) -> CommandHandle {
        self.nodes[id.0].command
    }

    /// True iff a file may be inserted at `path` by a registration: the
    /// path is not present and no ancestor of it is a file.
    pub fn can_insert_file(&self, path: &DfsPath) -> bool {
        if path.is_root() {
            return false;
        }
        let mut node = &self.root;
        for (index, component) in path.components().enumerate() {
            match node.children.get(component) {
                None => return true,
                Some(_) if index + 1 == path.depth() => return false,
                Some(child) => {
                    if !child.is_directory() {
                        return false;
                    }
                    node = child;
                }
            }
        }
        false
    }

    /// Inserts a registered file, materializing implicit directories along
    /// the way and stamping each new one with the registering node.
    ///
    /// The caller must have checked [`Tree::can_insert_file`].
    pub fn insert_file(&mut self, path: &DfsPath, owner: NodeId) {
        debug_assert!(!path.is_root());
        let mut node = &mut self.root;
        let depth = path.depth();
        for (index, component) in path.components().enumerate() {
            if index + 1 == depth {
                let prior = node.children.insert(component.to_owned(), Node::file(owner));
                debug_assert!(prior.is_none(), "inserting over a present path");
            } else {
                node = node
                    .children
                    .entry(component.to_owned())
                    .or_insert_with(|| Node::directory(false, Some(owner)));
            }
        }
    }

    /// Creates an explicit directory at `path`.
    ///
    /// Returns `false` if `path` is the root or already present. Fails
    /// with [`Error::NotFound`] if the parent is absent or not a
    /// directory. The new directory inherits its parent's stamp.
    pub fn create_directory(&mut self, path: &DfsPath) -> Result<bool> {
        if path.is_root() || self.contains(path) {
            return Ok(false);
        }
        let parent = path.parent().expect("non-root path has a parent");
        let name = path.last().expect("non-root path has a last component");
        let stamp = {
            let parent_node = self
                .node(&parent)
                .filter(|node| node.is_directory())
                .ok_or_else(|| Error::NotFound(format!("{parent} is not a directory")))?;
            parent_node.stamp()
        };
        let parent_node = self.node_mut(&parent).expect("parent just resolved");
        parent_node.children.insert(name.to_owned(), Node::directory(true, stamp));
        Ok(true)
    }

    /// Validates a file creation and picks the hosting node: the owner of
    /// the nearest existing ancestor directory.
    pub fn prepare_create_file(&self, path: &DfsPath) -> Result<CreateFileStep> {
        if path.is_root() || self.contains(path) {
            return Ok(CreateFileStep::AlreadyPresent);
        }
        let parent = path.parent().expect("non-root path has a parent");
        if self.node(&parent).filter(|node| node.is_directory()).is_none() {
            return Err(Error::NotFound(format!("{parent} is not a directory")));
        }
        if self.nodes.is_empty() {
            return Err(Error::NoStorage);
        }
        let owner = self.nearest_stamp(&parent).unwrap_or(NodeId(0));
        Ok(CreateFileStep::Host(owner))
    }

    /// Records a created file after its hosting node acknowledged the
    /// directive.
    pub fn commit_create_file(&mut self, path: &DfsPath, owner: NodeId) -> Result<()> {
        // The caller held the exclusive path lock across the directive, so
        // the checks from prepare still hold.
        match self.prepare_create_file(path)? {
            CreateFileStep::Host(_) => {}
            CreateFileStep::AlreadyPresent => {
                return Err(Error::Transport(format!("{path} appeared during the directive")));
            }
        }
        self.insert_file(path, owner);
        Ok(())
    }

    /// Validates a deletion and picks the node to receive the directive.
    ///
    /// Fails with [`Error::NotFound`] if `path` is absent.
    pub fn prepare_delete(&self, path: &DfsPath) -> Result<DeleteStep> {
        if path.is_root() {
            return Ok(DeleteStep::Root);
        }
        let node = self.node(path).ok_or_else(|| Error::NotFound(path.to_string()))?;
        let owner = match node.kind {
            NodeKind::File { owner } => Some(owner),
            NodeKind::Directory { .. } => {
                if self.nodes.is_empty() {
                    None
                } else {
                    Some(node.stamp().or_else(|| self.nearest_stamp(path)).unwrap_or(NodeId(0)))
                }
            }
        };
        Ok(DeleteStep::Target { owner })
    }

    /// Removes `path` and, for a directory, its whole subtree. Implicit
    /// directories emptied by the removal are pruned as well.
    pub fn commit_delete(&mut self, path: &DfsPath) -> Result<()> {
        debug_assert!(!path.is_root());
        let components: Vec<String> = path.components().map(str::to_owned).collect();
        Self::remove_rec(&mut self.root, &components, 0, path)
    }

    fn remove_rec(
        node: &mut Node,
        components: &[String],
        index: usize,
        path: &DfsPath,
    ) -> Result<()> {
        let name = &components[index];
        if index + 1 == components.len() {
            node.children
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(path.to_string()))
        } else {
            let child = node
                .children
                .get_mut(name)
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
            Self::remove_rec(child, components, index + 1, path)?;
            if child.is_implicit_directory() && child.children.is_empty() {
                node.children.remove(name);
            }
            Ok(())
        }
    }

    /// The deepest stamp on the existing chain of ancestors of `path`,
    /// including `path` itself.
    fn nearest_stamp(&self, path: &DfsPath) -> Option<NodeId> {
        let mut node = &self.root;
        let mut found = node.stamp();
        for component in path.components() {
            match node.children.get(component) {
                Some(child) => {
                    if let Some(stamp) = child.stamp() {
                        found = Some(stamp);
                    }
                    node = child;
                }
                None => break,
            }
        }
        found
    }

    fn node(&self, path: &DfsPath) -> Option<&Node> {
        let mut node = &self.root;
        for component in path.components() {
            node = node.children.get(component)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &DfsPath) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for component in path.components() {
            node = node.children.get_mut(component)?;
        }
        Some(node)
    }
}
