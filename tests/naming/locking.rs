use std::time::Duration;

use tokio::time::{sleep, timeout};

use super::common::{path, Fixture, ScriptedNode};
use dfs_naming::wire::{Reply, Request};
use dfs_naming::Error;

const BLOCKED: Duration = Duration::from_millis(100);

#[tokio::test]
async fn locks_are_held_across_connections() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/a/b"]).await;

    assert_eq!(
        fixture.service(&Request::Lock { path: path("/a"), exclusive: true }).await,
        Reply::Unit
    );

    // A shared lock under the exclusive one cannot complete.
    let blocked_req = Request::Lock { path: path("/a/b"), exclusive: false };
    let blocked = fixture.service(&blocked_req);
    assert!(timeout(BLOCKED, blocked).await.is_err());

    assert_eq!(
        fixture.service(&Request::Unlock { path: path("/a"), exclusive: true }).await,
        Reply::Unit
    );
    assert_eq!(
        fixture.service(&Request::Lock { path: path("/a/b"), exclusive: false }).await,
        Reply::Unit
    );
    assert_eq!(
        fixture.service(&Request::Unlock { path: path("/a/b"), exclusive: false }).await,
        Reply::Unit
    );
}

#[tokio::test]
async fn queued_exclusive_lock_completes_after_release() {
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
            let stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
            dfs_naming::wire::call(
                stream,
                &Request::Lock { path: path("/a/b"), exclusive: true },
            )
            .await
            .expect("lock call")
        })
    };
    sleep(BLOCKED).await;
    assert!(!waiter.is_finished());

    assert_eq!(
        fixture.service(&Request::Unlock { path: path("/a"), exclusive: true }).await,
        Reply::Unit
    );
    assert_eq!(waiter.await.unwrap(), Reply::Unit);
    assert_eq!(
        fixture.service(&Request::Unlock { path: path("/a/b"), exclusive: true }).await,
        Reply::Unit
    );
}

#[tokio::test]
async fn unrelated_paths_stay_lockable() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/a/b", "/x"]).await;

    assert_eq!(
        fixture.service(&Request::Lock { path: path("/a/b"), exclusive: true }).await,
        Reply::Unit
    );
    assert_eq!(
        fixture.service(&Request::Lock { path: path("/x"), exclusive: false }).await,
        Reply::Unit
    );
}

#[tokio::test]
async fn lock_surface_validates_its_arguments() {
    let fixture = Fixture::start().await;

    assert!(matches!(
        fixture.service(&Request::Lock { path: path("/missing"), exclusive: false }).await,
        Reply::Err(Error::NotFound(_))
    ));
    assert!(matches!(
        fixture.service(&Request::Unlock { path: path("/"), exclusive: true }).await,
        Reply::Err(Error::InvalidArgument(_))
    ));
}
