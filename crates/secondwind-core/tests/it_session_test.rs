//! Integration tests for session restore and token persistence

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use secondwind_core::{
    ApiClient, ApiError, ApiRequest, Config, CredentialStore, FileStore, MemoryStore, Session,
};

fn session_for(base: &str, store: Arc<dyn CredentialStore>) -> Session {
    let client = ApiClient::new(&Config::with_api_url(base)).expect("Failed to build client");
    Session::new(client, store)
}

/// Poll the store until it holds `expected` or give up
async fn wait_for_token(store: &dyn CredentialStore, expected: &str) -> bool {
    for _ in 0..50 {
        if store.get().unwrap().as_deref() == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn restore_fetches_profile_and_stores_token() {
    //* Given
    let mut server = Server::new_async().await;

    let refresh_mock = server
        .mock("POST", "/refresh/token")
        .with_status(200)
        .with_header("authorization", "Bearer restored")
        .expect(1)
        .create_async()
        .await;

    let my_mock = server
        .mock("GET", "/my")
        .match_header("authorization", "Bearer restored")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 42, "nickname": "windrunner", "runnerGrade": "ELITE"}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().to_path_buf()));
    let mut session = session_for(&server.url(), store.clone());

    //* When
    let user = session.restore().await.expect("Restore should succeed").clone();

    //* Then
    refresh_mock.assert_async().await;
    my_mock.assert_async().await;
    assert_eq!(user.id, 42);
    assert_eq!(user.runner_grade.as_deref(), Some("ELITE"));
    assert!(session.is_authenticated());
    assert_eq!(store.get().unwrap(), Some("restored".to_string()));
}

#[tokio::test]
async fn restore_with_expired_cookie_clears_store() {
    //* Given
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/refresh/token")
        .with_status(401)
        .create_async()
        .await;

    let my_mock = server.mock("GET", "/my").expect(0).create_async().await;

    let store = Arc::new(MemoryStore::with_token("stale"));
    let mut session = session_for(&server.url(), store.clone());

    //* When
    let err = session.restore().await.unwrap_err();

    //* Then
    my_mock.assert_async().await;
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::SessionExpired)
    ));
    assert!(!session.is_authenticated());
    assert_eq!(store.get().unwrap(), None);
}

#[tokio::test]
async fn restore_fails_when_profile_unavailable() {
    //* Given
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/refresh/token")
        .with_status(200)
        .with_header("authorization", "Bearer restored")
        .create_async()
        .await;

    server
        .mock("GET", "/my")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::with_token("stale"));
    let mut session = session_for(&server.url(), store.clone());

    //* When
    let err = session.restore().await.unwrap_err();

    //* Then
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::ServerError(_))
    ));
    assert_eq!(store.get().unwrap(), None);
}

#[tokio::test]
async fn renewed_token_is_written_back_to_store() {
    //* Given
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/api/notifications")
        .match_header("authorization", "Bearer old")
        .with_status(401)
        .create_async()
        .await;

    server
        .mock("POST", "/refresh/token")
        .with_status(200)
        .with_header("authorization", "Bearer renewed")
        .create_async()
        .await;

    let retry_mock = server
        .mock("GET", "/api/notifications")
        .match_header("authorization", "Bearer renewed")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::with_token("old"));
    let session = session_for(&server.url(), store.clone());
    let sync = session.spawn_sync();

    //* When
    let url = session.client().endpoint("/api/notifications");
    let response = session
        .request(ApiRequest::get(url))
        .await
        .expect("Request should succeed");

    //* Then
    retry_mock.assert_async().await;
    assert_eq!(response.status(), 200);
    assert!(
        wait_for_token(store.as_ref(), "renewed").await,
        "Store should hold the renewed token"
    );

    // Sync stops once the last client is gone
    drop(session);
    tokio::time::timeout(Duration::from_secs(2), sync)
        .await
        .expect("Sync task should stop")
        .expect("Sync task panicked");
}

#[tokio::test]
async fn request_without_stored_token_is_rejected_locally() {
    //* Given
    let mut server = Server::new_async().await;
    let any_mock = server.mock("GET", "/my").expect(0).create_async().await;

    let session = session_for(&server.url(), Arc::new(MemoryStore::new()));

    //* When
    let url = session.client().endpoint("/my");
    let err = session.request(ApiRequest::get(url)).await.unwrap_err();

    //* Then
    any_mock.assert_async().await;
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::SessionExpired)
    ));
}

#[tokio::test]
async fn restore_keeps_token_renewed_during_profile_fetch() {
    //* Given
    let mut server = Server::new_async().await;

    // First refresh rotates the cookie; the second one sees the new cookie
    let first_refresh = server
        .mock("POST", "/refresh/token")
        .match_header("cookie", Matcher::Missing)
        .with_status(200)
        .with_header("authorization", "Bearer first")
        .with_header("set-cookie", "rt=rotated; Path=/")
        .expect(1)
        .create_async()
        .await;

    let second_refresh = server
        .mock("POST", "/refresh/token")
        .match_header("cookie", Matcher::Regex("rt=rotated".to_string()))
        .with_status(200)
        .with_header("authorization", "Bearer second")
        .expect(1)
        .create_async()
        .await;

    server
        .mock("GET", "/my")
        .match_header("authorization", "Bearer first")
        .with_status(401)
        .create_async()
        .await;

    server
        .mock("GET", "/my")
        .match_header("authorization", "Bearer second")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 7, "nickname": "tempo"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut session = session_for(&server.url(), store.clone());
    let _sync = session.spawn_sync();

    //* When
    let user_id = session.restore().await.expect("Restore should succeed").id;
    // Let the sync task catch up with both renewals
    tokio::time::sleep(Duration::from_millis(100)).await;

    //* Then
    first_refresh.assert_async().await;
    second_refresh.assert_async().await;
    assert_eq!(user_id, 7);
    assert_eq!(store.get().unwrap(), Some("second".to_string()));
}
