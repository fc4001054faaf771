use tokio::net::TcpStream;

use super::common::{path, Fixture, ScriptedNode};
use dfs_naming::wire::{self, Reply, Request};
use dfs_naming::Error;

#[tokio::test]
async fn create_file_directs_the_ancestor_owner() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/a/b"]).await;

    assert_eq!(
        fixture.service(&Request::CreateFile { path: path("/a/c") }).await,
        Reply::Bool(true)
    );
    assert_eq!(node.directives(), [Request::StorageCreate { path: path("/a/c") }]);
    assert_eq!(
        fixture.service(&Request::GetStorage { path: path("/a/c") }).await,
        Reply::Storage(node.storage)
    );

    // Recreating a present path is refused without another directive.
    assert_eq!(
        fixture.service(&Request::CreateFile { path: path("/a/c") }).await,
        Reply::Bool(false)
    );
    assert_eq!(node.directives().len(), 1);
}

#[tokio::test]
async fn create_file_with_no_nodes_reports_no_storage() {
    let fixture = Fixture::start().await;
    assert_eq!(
        fixture.service(&Request::CreateFile { path: path("/foo") }).await,
        Reply::Err(Error::NoStorage)
    );
}

#[tokio::test]
async fn directories_are_created_on_the_naming_server_only() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/a/b"]).await;

    assert_eq!(
        fixture.service(&Request::CreateDirectory { path: path("/a/dir") }).await,
        Reply::Bool(true)
    );
    assert_eq!(
        fixture.service(&Request::CreateDirectory { path: path("/") }).await,
        Reply::Bool(false)
    );
    assert_eq!(
        fixture.service(&Request::IsDirectory { path: path("/a/dir") }).await,
        Reply::Bool(true)
    );
    assert_eq!(
        fixture.service(&Request::List { path: path("/a/dir") }).await,
        Reply::Names(Vec::new())
    );
    // No directive traffic for directories.
    assert_eq!(node.directives(), Vec::<Request>::new());
}

#[tokio::test]
async fn delete_removes_the_subtree_and_notifies_the_owner() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/dir/one", "/dir/two"]).await;

    assert_eq!(fixture.service(&Request::Delete { path: path("/dir") }).await, Reply::Bool(true));
    assert_eq!(node.directives(), [Request::StorageDelete { path: path("/dir") }]);
    assert_eq!(
        fixture.service(&Request::List { path: path("/") }).await,
        Reply::Names(Vec::new())
    );
    assert_eq!(
        fixture.service(&Request::Delete { path: path("/dir") }).await,
        Reply::Err(Error::NotFound("/dir".to_owned()))
    );
    assert_eq!(fixture.service(&Request::Delete { path: path("/") }).await, Reply::Bool(false));
}

#[tokio::test]
async fn absent_paths_report_not_found() {
    let fixture = Fixture::start().await;

    assert!(matches!(
        fixture.service(&Request::IsDirectory { path: path("/missing") }).await,
        Reply::Err(Error::NotFound(_))
    ));
    assert!(matches!(
        fixture.service(&Request::GetStorage { path: path("/missing") }).await,
        Reply::Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn a_malformed_frame_poisons_only_its_connection() {
    let fixture = Fixture::start().await;
    let node = ScriptedNode::start().await;
    fixture.register(&node, &["/a/b"]).await;

    let mut stream =
        TcpStream::connect(fixture.server.service_addr()).await.expect("connect service");
    // Tag 99 is not a request.
    wire::write_frame(&mut stream, &99u32.to_be_bytes()).await.unwrap();
    let payload = wire::read_frame(&mut stream).await.unwrap().expect("error reply");
    assert!(matches!(
        wire::decode_reply(&payload).unwrap(),
        Reply::Err(Error::InvalidArgument(_))
    ));
    // The poisoned connection is closed...
    assert_eq!(wire::read_frame(&mut stream).await.unwrap(), None);

    // ...while fresh connections keep working.
    assert_eq!(
        fixture.service(&Request::IsDirectory { path: path("/a") }).await,
        Reply::Bool(true)
    );
}
