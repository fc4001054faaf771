//! Executes decoded requests against the naming engine and writes replies
//! back in request order.

use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{RequestResult, Surface};
use crate::error::{Error, Result};
use crate::naming::NamingEngine;
use crate::wire::{self, Reply, Request};

pub(crate) struct ServeTask {
    engine: Arc<NamingEngine>,
    surface: Surface,
    requests: UnboundedReceiver<RequestResult>,
    write_half: OwnedWriteHalf,
}

impl ServeTask {
    pub fn spawn(
        engine: Arc<NamingEngine>,
        surface: Surface,
        requests: UnboundedReceiver<RequestResult>,
        write_half: OwnedWriteHalf,
    ) -> JoinHandle<()> {
        tokio::spawn(Self { engine, surface, requests, write_half }.run())
    }

    async fn run(mut self) {
        while let Some(next) = self.requests.recv().await {
            let (reply, close) = match next {
                Ok(request) => (self.execute(request).await, false),
                // One error reply for the malformed frame, then close.
                Err(err) => (Reply::Err(err), true),
            };
            let payload = wire::encode_reply(&reply);
            if let Err(err) = wire::write_frame(&mut self.write_half, &payload).await {
                debug!(%err, "dropping connection after a write failure");
                return;
            }
            if close {
                return;
            }
        }
    }

    async fn execute(&self, request: Request) -> Reply {
        match (self.surface, request) {
            (Surface::Service, Request::Lock { path, exclusive }) => {
                unit(self.engine.lock(&path, exclusive).await)
            }
            (Surface::Service, Request::Unlock { path, exclusive }) => {
                unit(self.engine.unlock(&path, exclusive))
            }
            (Surface::Service, Request::IsDirectory { path }) => {
                boolean(self.engine.is_directory(&path).await)
            }
            (Surface::Service, Request::List { path }) => match self.engine.list(&path).await {
                Ok(names) => Reply::Names(names),
                Err(err) => Reply::Err(err),
            },
            (Surface::Service, Request::CreateFile { path }) => {
                boolean(self.engine.create_file(&path).await)
            }
            (Surface::Service, Request::CreateDirectory { path }) => {
                boolean(self.engine.create_directory(&path).await)
            }
            (Surface::Service, Request::Delete { path }) => {
                boolean(self.engine.delete(&path).await)
            }
            (Surface::Service, Request::GetStorage { path }) => {
                match self.engine.get_storage(&path).await {
                    Ok(handle) => Reply::Storage(handle),
                    Err(err) => Reply::Err(err),
                }
            }
            (Surface::Registration, Request::Register { storage, command, files }) => {
                match self.engine.register(storage, command, files).await {
                    Ok(rejected) => Reply::Paths(rejected),
                    Err(err) => Reply::Err(err),
                }
            }
            (surface, request) => Reply::Err(Error::InvalidArgument(format!(
                "request {request:?} is not served on the {surface:?} interface"
            ))),
        }
    }
}

fn unit(result: Result<()>) -> Reply {
    match result {
        Ok(()) => Reply::Unit,
        Err(err) => Reply::Err(err),
    }
}

fn boolean(result: Result<bool>) -> Reply {
    match result {
        Ok(value) => Reply::Bool(value),
        Err(err) => Reply::Err(err),
    }
}
