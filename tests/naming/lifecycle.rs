use std::net::IpAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::sleep;

use super::common::{loopback_config, path, Fixture, ScriptedNode};
use dfs_naming::storage::DirectiveClient;
use dfs_naming::wire::{self, Reply, Request};
use dfs_naming::{Config, Error, NamingServer};

#[tokio::test]
async fn stop_fires_the_hook_and_unbinds() {
    let (hook_send, hook_recv) = mpsc::channel();
    let server = NamingServer::start(
        &loopback_config(),
        Arc::new(DirectiveClient),
        Box::new(move |cause| {
            hook_send.send(cause).expect("deliver shutdown cause");
        }),
    )
    .await
    .expect("start naming server");
    let service_addr = server.service_addr();

    server.stop();
    assert_eq!(hook_recv.recv().expect("hook fired"), None);

    sleep(Duration::from_millis(50)).await;
    let afterwards = async {
        let stream = TcpStream::connect(service_addr).await.map_err(Error::from)?;
        wire::call(stream, &Request::List { path: path("/") }).await
    }
    .await;
    assert!(afterwards.is_err());
}

#[tokio::test]
async fn occupied_ports_fail_the_start() {
    let fixture = Fixture::start().await;
    let occupied = Config {
        bind: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        service_port: fixture.server.service_addr().port(),
        registration_port: fixture.server.registration_addr().port(),
    };

    let second =
        NamingServer::start(&occupied, Arc::new(DirectiveClient), Box::new(|_| {})).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn stop_cancels_parked_lock_waiters() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/a/b"]).await;

    assert_eq!(
        fixture.service(&Request::Lock { path: path("/a"), exclusive: true }).await,
        Reply::Unit
    );
    let waiter = {
        let addr = fixture.server.service_addr();
        tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.expect("connect");
            wire::call(stream, &Request::Lock { path: path("/a/b"), exclusive: false })
                .await
                .expect("lock call")
        })
    };
    sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    fixture.server.stop();
    assert_eq!(waiter.await.unwrap(), Reply::Err(Error::Cancelled));
}
