//! dfs-naming - the metadata coordinator ("naming server") of a
//! distributed file system.
//!
//! File bytes live on separate storage nodes; this crate keeps the
//! namespace. Clients resolve hierarchical paths through the service
//! interface (lookup, list, create, delete, lock); storage nodes announce
//! the files they host through the registration interface and receive
//! directive calls to create and delete data on disk.

pub mod config;
pub mod error;
pub mod lock;
pub mod naming;
pub mod path;
pub mod server;
pub mod storage;
pub mod tree;
pub mod wire;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::naming::NamingEngine;
pub use crate::path::DfsPath;
pub use crate::server::NamingServer;
