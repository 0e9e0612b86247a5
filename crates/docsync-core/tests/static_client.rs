use docsync_core::{DocStorage, DocSyncStorage, MockChannel, StaticSyncClient, SyncError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> StaticSyncClient {
    StaticSyncClient::new(&server.uri(), "ws-1").unwrap()
}

#[tokio::test]
async fn pull_returns_snapshot_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/workspaces/ws-1/docs/doc-1"))
        .and(header("priority", "u=0"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 255]))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).pull("doc-1").await.unwrap().unwrap();
    assert_eq!(result.data, vec![0u8, 1, 2, 255]);
    assert_eq!(result.state, None);
}

#[tokio::test]
async fn pull_not_found_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/workspaces/ws-1/docs/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(client_for(&server).pull("missing").await.unwrap(), None);
}

#[tokio::test]
async fn pull_server_error_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert_eq!(client_for(&server).pull("doc-1").await.unwrap(), None);
}

#[tokio::test]
async fn pull_ignores_local_state_vector() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/workspaces/ws-1/docs/doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"snapshot".to_vec()))
        .mount(&server)
        .await;

    let storage: DocStorage<MockChannel> = DocStorage::Static(client_for(&server));
    let result = storage.pull("doc-1", &[1, 2, 3]).await.unwrap().unwrap();
    assert_eq!(result.data, b"snapshot");
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    // Reserve a free port, then release it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = StaticSyncClient::new(&format!("http://127.0.0.1:{}", port), "ws-1").unwrap();
    let err = client.pull("doc-1").await.unwrap_err();
    assert!(matches!(err, SyncError::Http(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn push_and_subscribe_are_unsupported() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(matches!(
        client.push("doc-1", b"update").await,
        Err(SyncError::NotImplemented("push"))
    ));
    assert!(matches!(
        client.subscribe(|_, _| {}, |_| {}),
        Err(SyncError::NotImplemented("subscribe"))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
