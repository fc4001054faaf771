//! The naming engine: client-facing namespace operations and storage-node
//! registration, layered over the lock manager and the directory tree.
//!
//! Every operation acquires its path lock first (shared for reads,
//! exclusive for mutations), consults the tree under the namespace
//! monitor, and releases the lock on every exit path. Mutations that
//! require a storage-node directive run it between the tree's prepare and
//! commit steps, holding the path lock but not the monitor, so unrelated
//! namespace traffic keeps flowing during the RPC. The linearization point
//! of such an operation is its in-memory commit.


use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::lock::LockManager;
use crate::path::DfsPath;
use crate::storage::{CommandHandle, Directives, NodePair, StorageHandle};
use crate::tree::{CreateFileStep, DeleteStep, Tree};

/// The shared metadata engine behind both RPC surfaces.
pub struct NamingEngine {
    tree: Mutex<Tree>,
    locks: LockManager,
    directives: Arc<dyn Directives>,
}

impl NamingEngine {
    pub fn new(directives: Arc<dyn Directives>) -> NamingEngine {
        NamingEngine { tree: Mutex::new(Tree::new()), locks: LockManager::new(), directives }
    }

    /// Cancels all lock waiters. Called once during server shutdown.
    pub fn shutdown(&self) {
        self.locks.shutdown();
    }

    /// Takes a client-visible lock on `path`.
    ///
    /// Fails with [`Error::NotFound`] if the path is absent, and with
    /// [`Error::Cancelled`] if the server shuts down during the wait.
    pub async fn lock(&self, path: &DfsPath, exclusive: bool) -> Result<()> {
        if !self.monitor().contains(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        debug!(%path, exclusive, "client lock");
        self.locks.lock(path, exclusive).await
    }

    /// Releases a client-visible lock on `path`.
    ///
    /// Fails with [`Error::InvalidArgument`] if no such lock is held.
    pub fn unlock(&self, path: &DfsPath, exclusive: bool) -> Result<()> {
        debug!(%path, exclusive, "client unlock");
        self.locks.unlock(path, exclusive)
    }

    /// True iff `path` names a directory.
    pub async fn is_directory(&self, path: &DfsPath) -> Result<bool> {
        let _lock = self.locks.lock_guard(path, false).await?;
        self.monitor().is_directory(path)
    }

    /// The sorted entry names directly under the directory `path`.
    pub async fn list(&self, path: &DfsPath) -> Result<Vec<String>> {
        let _lock = self.locks.lock_guard(path, false).await?;
        self.monitor().list(path)
    }

    /// Creates an empty file hosted by the storage node owning the
    /// nearest existing ancestor of `path`.
    ///
    /// Returns `false` if the path is already present.
    pub async fn create_file(&self, path: &DfsPath) -> Result<bool> {
        let _lock = self.locks.lock_guard(path, true).await?;
        let (owner, command) = {
            let tree = self.monitor();
            match tree.prepare_create_file(path)? {
                CreateFileStep::AlreadyPresent => return Ok(false),
                CreateFileStep::Host(owner) => (owner, tree.command_of(owner)),
            }
        };

        debug!(%path, node = %command, "create directive");
        if !self.directives.create(command, path).await? {
            return Err(Error::Transport(format!(
                "storage node {command} refused to create {path}"
            )));
        }

        self.monitor().commit_create_file(path, owner)?;
        Ok(true)
    }

    /// Creates an explicit directory at `path`, on the naming server only.
    ///
    /// Returns `false` if the path is the root or already present.
    pub async fn create_directory(&self, path: &DfsPath) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let _lock = self.locks.lock_guard(path, true).await?;
        self.monitor().create_directory(path)
    }

    /// Deletes `path` — a file, or a directory with its whole subtree.
    ///
    /// Returns `false` for the root. Fails with [`Error::NotFound`] if the
    /// path is absent.
    pub async fn delete(&self, path: &DfsPath) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let _lock = self.locks.lock_guard(path, true).await?;
        let target = {
            let tree = self.monitor();
            match tree.prepare_delete(path)? {
                DeleteStep::Root => return Ok(false),
                DeleteStep::Target { owner } => owner.map(|owner| tree.command_of(owner)),
            }
        };

        if let Some(command) = target {
            debug!(%path, node = %command, "delete directive");
            if !self.directives.delete(command, path).await? {
                return Err(Error::Transport(format!(
                    "storage node {command} refused to delete {path}"
                )));
            }
        }

        self.monitor().commit_delete(path)?;
        Ok(true)
    }

    /// The storage handle hosting the file `path`.
    pub async fn get_storage(&self, path: &DfsPath) -> Result<StorageHandle> {
        let _lock = self.locks.lock_guard(path, false).await?;
        self.monitor().storage_for(path)
    }

    /// Registers a storage node and merges its file list into the tree.
    ///
    /// Returns the paths the node must delete locally: the root, and every
    /// path that is already present or would sit beneath an existing file.
    /// Fails with [`Error::AlreadyRegistered`] if either handle is known.
    pub async fn register(
        &self,
        storage: StorageHandle,
        command: CommandHandle,
        files: Vec<DfsPath>,
    ) -> Result<Vec<DfsPath>> {
        let root = DfsPath::root();
        let _lock = self.locks.lock_guard(&root, true).await?;
        let mut tree = self.monitor();
        let id = tree.admit_pair(NodePair { storage, command })?;

        let mut rejected = Vec::new();
        for file in files {
            if tree.can_insert_file(&file) {
                tree.insert_file(&file, id);
            } else {
                rejected.push(file);
            }
        }
        info!(%storage, %command, rejected = rejected.len(), "storage node registered");
        Ok(rejected)
    }

    fn monitor(&self) -> std::sync::MutexGuard<'_, Tree> {
        self.tree.lock().expect("namespace monitor poisoned")
    }
}
