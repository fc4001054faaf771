//! Storage-node handles and the outbound directive interface.
//!
//! A storage node registers a pair of handles: the storage handle clients
//! use to read file data, and the command handle the naming server uses to
//! direct the node to create or delete files on its disk. Handles are
//! socket addresses; the naming server never opens the storage interface
//! itself, it only hands it out.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::path::DfsPath;
use crate::wire::{self, Reply, Request};

/// Remote reference to a storage node's data-read interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StorageHandle(pub SocketAddr);

/// Remote reference to a storage node's directive interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CommandHandle(pub SocketAddr);

/// The handle pair one storage node registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NodePair {
    pub storage: StorageHandle,
    pub command: CommandHandle,
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StorageHandle {
    type Err = Error;

    fn from_str(raw: &str) -> Result<StorageHandle> {
        let addr = raw
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("malformed storage handle: {raw:?}")))?;
        Ok(StorageHandle(addr))
    }
}

impl FromStr for CommandHandle {
    type Err = Error;

    fn from_str(raw: &str) -> Result<CommandHandle> {
        let addr = raw
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("malformed command handle: {raw:?}")))?;
        Ok(CommandHandle(addr))
    }
}

/// Outbound directive calls to storage nodes.
///
/// The naming engine issues these between its prepare and commit steps,
/// with path locks held but the namespace monitor released. The seam keeps
/// the engine independent of the transport and lets tests observe and
/// script directive traffic.
#[async_trait]
pub trait Directives: Send + Sync {
    /// Asks the node to create an empty file at `path`.
    async fn create(&self, node: CommandHandle, path: &DfsPath) -> Result<bool>;

    /// Asks the node to delete `path` (a file or a directory shell).
    async fn delete(&self, node: CommandHandle, path: &DfsPath) -> Result<bool>;
}

/// [`Directives`] implementation speaking the wire protocol, one
/// connection per call.
pub struct DirectiveClient;

impl DirectiveClient {
    async fn call(&self, node: CommandHandle, request: Request) -> Result<bool> {
        let stream = TcpStream::connect(node.0).await?;
        match wire::call(stream, &request).await? {
            Reply::Bool(done) => Ok(done),
            Reply::Err(err) => Err(err),
            other => Err(Error::Transport(format!(
                "storage node {node} sent an unexpected reply: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl Directives for DirectiveClient {
    async fn create(&self, node: CommandHandle, path: &DfsPath) -> Result<bool> {
        self.call(node, Request::StorageCreate { path: path.clone() }).await
    }

    async fn delete(&self, node: CommandHandle, path: &DfsPath) -> Result<bool> {
        self.call(node, Request::StorageDelete { path: path.clone() }).await
    }
}
