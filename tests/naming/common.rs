use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};

use dfs_naming::storage::{CommandHandle, DirectiveClient, StorageHandle};
use dfs_naming::wire::{self, Reply, Request};
use dfs_naming::{Config, DfsPath, NamingServer};

pub fn path(raw: &str) -> DfsPath {
    DfsPath::parse(raw).expect("valid path")
}

pub fn loopback_config() -> Config {
    Config { bind: IpAddr::V4(Ipv4Addr::LOCALHOST), service_port: 0, registration_port: 0 }
}

/// A naming server started on ephemeral loopback ports, driven over real
/// sockets with the wire protocol.
pub struct Fixture {
    pub server: NamingServer,
}

impl Fixture {
    pub async fn start() -> Fixture {
        let server = NamingServer::start(
            &loopback_config(),
            Arc::new(DirectiveClient),
            Box::new(|_| {}),
        )
        .await
        .expect("start naming server");
        Fixture { server }
    }

    /// One request/reply exchange on the service interface.
    pub async fn service(&self, request: &Request) -> Reply {
        let stream =
            TcpStream::connect(self.server.service_addr()).await.expect("connect service");
        wire::call(stream, request).await.expect("service call")
    }

    /// One request/reply exchange on the registration interface.
    pub async fn registration(&self, request: &Request) -> Reply {
        let stream = TcpStream::connect(self.server.registration_addr())
            .await
            .expect("connect registration");
        wire::call(stream, request).await.expect("registration call")
    }

    pub async fn register(&self, node: &ScriptedNode, files: &[&str]) -> Reply {
        self.registration(&Request::Register {
            storage: node.storage,
            command: node.command,
            files: files.iter().map(|raw| path(raw)).collect(),
        })
        .await
    }
}

/// A scripted storage node: real listeners for both handles, a command
/// loop that acknowledges every directive and records it.
pub struct ScriptedNode {
    pub storage: StorageHandle,
    pub command: CommandHandle,
    directives: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedNode {
    pub async fn start() -> ScriptedNode {
        let storage_listener =
            TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind storage");
        let command_listener =
            TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind command");
        let storage = StorageHandle(storage_listener.local_addr().expect("storage addr"));
        let command = CommandHandle(command_listener.local_addr().expect("command addr"));

        let directives = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&directives);
        tokio::spawn(async move {
            // The storage interface only has to exist; the naming server
            // never dials it.
            let _storage_listener = storage_listener;
            loop {
                let Ok((socket, _)) = command_listener.accept().await else {
                    return;
                };
                let log = Arc::clone(&log);
                tokio::spawn(serve_command_connection(socket, log));
            }
        });

        ScriptedNode { storage, command, directives }
    }

    /// The directives received so far, in arrival order.
    pub fn directives(&self) -> Vec<Request> {
        self.directives.lock().unwrap().clone()
    }
}

async fn serve_command_connection(mut socket: TcpStream, log: Arc<Mutex<Vec<Request>>>) {
    while let Ok(Some(payload)) = wire::read_frame(&mut socket).await {
        let Ok(request) = wire::decode_request(&payload) else {
            return;
        };
        log.lock().unwrap().push(request);
        let reply = wire::encode_reply(&Reply::Bool(true));
        if wire::write_frame(&mut socket, &reply).await.is_err() {
            return;
        }
    }
}
