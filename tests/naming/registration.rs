use super::common::{path, Fixture, ScriptedNode};
use dfs_naming::wire::{Reply, Request};
use dfs_naming::Error;

#[tokio::test]
async fn registered_files_appear_in_the_namespace() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;

    assert_eq!(fixture.register(&node, &["/a/b", "/c"]).await, Reply::Paths(Vec::new()));

    assert_eq!(
        fixture.service(&Request::List { path: path("/") }).await,
        Reply::Names(vec!["a".to_owned(), "c".to_owned()])
    );
    assert_eq!(
        fixture.service(&Request::List { path: path("/a") }).await,
        Reply::Names(vec!["b".to_owned()])
    );
    assert_eq!(
        fixture.service(&Request::IsDirectory { path: path("/a") }).await,
        Reply::Bool(true)
    );
    assert_eq!(
        fixture.service(&Request::IsDirectory { path: path("/a/b") }).await,
        Reply::Bool(false)
    );
    assert_eq!(
        fixture.service(&Request::GetStorage { path: path("/a/b") }).await,
        Reply::Storage(node.storage)
    );
}

#[tokio::test]
async fn duplicate_files_are_returned_to_the_later_node() {
    let fixture = Fixture::start().await;
    let first = ScriptedNode::start().await;
    let second = ScriptedNode::start().await;

    assert_eq!(fixture.register(&first, &["/x"]).await, Reply::Paths(Vec::new()));
    assert_eq!(
        fixture.register(&second, &["/x", "/y"]).await,
        Reply::Paths(vec![path("/x")])
    );

    assert_eq!(
        fixture.service(&Request::GetStorage { path: path("/x") }).await,
        Reply::Storage(first.storage)
    );
    assert_eq!(
        fixture.service(&Request::GetStorage { path: path("/y") }).await,
        Reply::Storage(second.storage)
    );
}

#[tokio::test]
async fn a_node_cannot_register_twice() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;

    assert_eq!(fixture.register(&node, &[]).await, Reply::Paths(Vec::new()));
    assert_eq!(fixture.register(&node, &[]).await, Reply::Err(Error::AlreadyRegistered));
}

#[tokio::test]
async fn registering_the_root_is_rejected_without_effect() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;

    assert_eq!(fixture.register(&node, &["/"]).await, Reply::Paths(vec![path("/")]));
    assert_eq!(
        fixture.service(&Request::List { path: path("/") }).await,
        Reply::Names(Vec::new())
    );
}

#[tokio::test]
async fn registration_requests_are_rejected_on_the_service_port() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;

    let misrouted = Request::Register {
        storage: node.storage,
        command: node.command,
        files: Vec::new(),
    };
    assert!(matches!(
        fixture.service(&misrouted).await,
        Reply::Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        fixture.registration(&Request::List { path: path("/") }).await,
        Reply::Err(Error::InvalidArgument(_))
    ));
}
