// SPDX-License-Identifier: MIT

//! Unlink and account-deletion tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

#[tokio::test]
async fn test_unlink_without_token_is_401() {
    let (app, _) = common::create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/unlink")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unlink_revokes_grant_not_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/applications/test_client_id/grant"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_github(&server.uri()).await;
    let user = common::seed_user(&state, 42, "ada").await;
    let secret = common::seed_refresh_secret(&state, user.user_id).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/unlink")
                .header(header::AUTHORIZATION, common::bearer_for(&state, &user))
                .header(
                    header::COOKIE,
                    format!("reposcope_refresh={secret}; reposcope_upstream=gho_live"),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Local account and its data survive; only the session is gone
    let row = state
        .db
        .find_user_by_upstream_id(42)
        .await
        .unwrap()
        .expect("account kept");
    assert!(row.refresh_token_hash.is_none());
}

#[tokio::test]
async fn test_unlink_succeeds_when_grant_revocation_fails() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/applications/test_client_id/grant"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "upstream exploded"
        })))
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_github(&server.uri()).await;
    let user = common::seed_user(&state, 42, "ada").await;
    let secret = common::seed_refresh_secret(&state, user.user_id).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/unlink")
                .header(header::AUTHORIZATION, common::bearer_for(&state, &user))
                .header(
                    header::COOKIE,
                    format!("reposcope_refresh={secret}; reposcope_upstream=gho_live"),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Revocation failure is logged and swallowed
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["success"], true);

    // ... and the refresh slot is still cleared
    let row = state
        .db
        .find_user_by_upstream_id(42)
        .await
        .unwrap()
        .unwrap();
    assert!(row.refresh_token_hash.is_none());
}

#[tokio::test]
async fn test_delete_without_token_is_401_and_store_untouched() {
    let (app, state) = common::create_test_app().await;
    let user = common::seed_user(&state, 42, "ada").await;
    let secret = common::seed_refresh_secret(&state, user.user_id).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                // Cookies alone are not enough for deletion
                .header(header::COOKIE, format!("reposcope_refresh={secret}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let row = state
        .db
        .find_user_by_upstream_id(42)
        .await
        .unwrap()
        .expect("row untouched");
    assert!(row.refresh_token_hash.is_some());
}

#[tokio::test]
async fn test_delete_removes_row_and_invalidates_session() {
    let (app, state) = common::create_test_app().await;
    let user = common::seed_user(&state, 42, "ada").await;
    let secret = common::seed_refresh_secret(&state, user.user_id).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header(header::AUTHORIZATION, common::bearer_for(&state, &user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Cookies are expired on the way out
    let cookies = common::set_cookie_headers(&response);
    assert!(common::find_cookie(&cookies, "reposcope_refresh").contains("Max-Age=0"));

    // Row gone; the old refresh secret is dead
    assert!(state
        .db
        .find_user_by_upstream_id(42)
        .await
        .unwrap()
        .is_none());

    let refresh = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .header(header::COOKIE, format!("reposcope_refresh={secret}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_cascades_tracked_data() {
    let (app, state) = common::create_test_app().await;
    let user = common::seed_user(&state, 42, "ada").await;
    let repo = state
        .db
        .add_repo(user.user_id, "rust-lang", "rust")
        .await
        .unwrap();
    state
        .db
        .add_chat_message(user.user_id, "user", "hello")
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/account")
                .header(header::AUTHORIZATION, common::bearer_for(&state, &user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state
        .db
        .get_repo(user.user_id, repo.id)
        .await
        .unwrap()
        .is_none());
    assert!(state
        .db
        .list_chat_messages(user.user_id, 10)
        .await
        .unwrap()
        .is_empty());
}
