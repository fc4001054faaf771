//! TCP harness exposing the naming engine on its two ports.
//!
//! `start` binds the client-facing service listener and the storage-node
//! registration listener, then runs one accept loop per listener. Each
//! accepted connection is split into a [`ReadTask`] that decodes request
//! frames into a channel and a [`ServeTask`] that executes them against
//! the shared engine and writes replies back in order. A connection that
//! sends a malformed frame gets one error reply and is closed; the rest of
//! the server is unaffected.

mod read_task;
mod serve_task;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::NamingEngine;
use crate::storage::Directives;
use read_task::ReadTask;
use serve_task::ServeTask;

/// Called exactly once when the server stops: with `None` after a clean
/// [`NamingServer::stop`], with the fatal error if an accept loop died.
pub type ShutdownHook = Box<dyn FnOnce(Option<Error>) + Send + 'static>;

/// Which RPC surface a listener serves.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Surface {
    Service,
    Registration,
}

/// A started naming server.
///
/// Stopping is final; the server cannot be restarted.
pub struct NamingServer {
    engine: Arc<NamingEngine>,
    service_addr: SocketAddr,
    registration_addr: SocketAddr,
    accept_loops: Vec<JoinHandle<()>>,
    hook: Arc<Mutex<Option<ShutdownHook>>>,
}

impl NamingServer {
    /// Binds both listeners and starts serving.
    ///
    /// If either bind fails nothing is left running and the error is
    /// returned; the shutdown hook is not invoked.
    pub async fn start(
        config: &Config,
        directives: Arc<dyn Directives>,
        hook: ShutdownHook,
    ) -> Result<NamingServer> {
        let service = TcpListener::bind(config.service_addr()).await?;
        let registration = TcpListener::bind(config.registration_addr()).await?;
        let service_addr = service.local_addr()?;
        let registration_addr = registration.local_addr()?;

        let engine = Arc::new(NamingEngine::new(directives));
        let hook = Arc::new(Mutex::new(Some(hook)));
        let accept_loops = vec![
            tokio::spawn(accept_loop(service, Surface::Service, engine.clone(), hook.clone())),
            tokio::spawn(accept_loop(
                registration,
                Surface::Registration,
                engine.clone(),
                hook.clone(),
            )),
        ];

        info!(%service_addr, %registration_addr, "naming server started");
        Ok(NamingServer { engine, service_addr, registration_addr, accept_loops, hook })
    }

    /// Address of the client-facing service listener.
    pub fn service_addr(&self) -> SocketAddr {
        self.service_addr
    }

    /// Address of the storage-node registration listener.
    pub fn registration_addr(&self) -> SocketAddr {
        self.registration_addr
    }

    /// The shared engine, for embedding the server in tests or tools.
    pub fn engine(&self) -> Arc<NamingEngine> {
        self.engine.clone()
    }

    /// Unbinds both listeners, cancels all lock waiters, and fires the
    /// shutdown hook with `None`.
    pub fn stop(self) {
        info!("naming server stopping");
        for accept in &self.accept_loops {
            accept.abort();
        }
        self.engine.shutdown();
        fire(&self.hook, None);
    }
}

async fn accept_loop(
    listener: TcpListener,
    surface: Surface,
    engine: Arc<NamingEngine>,
    hook: Arc<Mutex<Option<ShutdownHook>>>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                debug!(%peer, ?surface, "connection accepted");
                serve_connection(socket, surface, engine.clone());
            }
            Err(err) => {
                warn!(?surface, %err, "accept loop failed");
                engine.shutdown();
                fire(&hook, Some(err.into()));
                return;
            }
        }
    }
}

fn serve_connection(socket: TcpStream, surface: Surface, engine: Arc<NamingEngine>) {
    if let Err(err) = socket.set_nodelay(true) {
        warn!(%err, "failed to disable Nagle on an accepted socket");
    }
    let (read_half, write_half) = socket.into_split();
    let (requests_send, requests_recv) = mpsc::unbounded_channel();

    ReadTask::spawn(read_half, requests_send);
    ServeTask::spawn(engine, surface, requests_recv, write_half);
}

fn fire(hook: &Arc<Mutex<Option<ShutdownHook>>>, cause: Option<Error>) {
    let taken = hook.lock().expect("shutdown hook poisoned").take();
    if let Some(hook) = taken {
        hook(cause);
    }
}

/// Re-exported for the connection tasks.
pub(crate) type RequestResult = Result<crate::wire::Request>;
