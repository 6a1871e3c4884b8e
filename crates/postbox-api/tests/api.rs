use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use postbox_api::{AppState, AppStateInner, build_router};
use postbox_db::Database;

struct TestApp {
    app: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state: AppState = Arc::new(AppStateInner::new(db));
        Self {
            app: build_router(state.clone()),
            state,
        }
    }

    /// Send a request and return (status, parsed JSON body or Null).
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let resp = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(&self, username: &str, password: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/register",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
        body["user_id"].as_i64().unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {username}: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn inbox(&self, token: &str) -> Vec<Value> {
        let (status, body) = self.send(Method::GET, "/", Some(token), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["messages"].as_array().unwrap().clone()
    }

    async fn send_message(&self, token: &str, content: &str, recipients: &[i64]) -> StatusCode {
        self.send(
            Method::POST,
            "/",
            Some(token),
            Some(json!({ "content": content, "recipients": recipients })),
        )
        .await
        .0
    }
}

#[tokio::test]
async fn end_to_end_alice_messages_bob() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let bob_id = app.register("bob", "pw2").await;

    let alice = app.login("alice", "pw1").await;
    assert_eq!(
        app.send_message(&alice, "hi", &[bob_id]).await,
        StatusCode::CREATED
    );

    let bob = app.login("bob", "pw2").await;
    let inbox = app.inbox(&bob).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["content"], "hi");
    assert_eq!(inbox[0]["sender"], "alice");
    assert!(inbox[0].get("sender_id").is_none());
    assert_eq!(inbox[0]["sent_at"], inbox[0]["updated_at"]);
}

#[tokio::test]
async fn inbox_lists_every_message_from_every_sender() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let bob_id = app.register("bob", "pw2").await;
    app.register("carol", "pw3").await;
    let dave_id = app.register("dave", "pw4").await;

    let alice = app.login("alice", "pw1").await;
    let carol = app.login("carol", "pw3").await;
    for (token, content) in [(&alice, "first"), (&carol, "second"), (&alice, "third")] {
        assert_eq!(
            app.send_message(token, content, &[bob_id]).await,
            StatusCode::CREATED
        );
    }
    assert_eq!(
        app.send_message(&carol, "not for bob", &[dave_id]).await,
        StatusCode::CREATED
    );

    let bob = app.login("bob", "pw2").await;
    let inbox = app.inbox(&bob).await;

    // Order is whatever the store returns, so compare as a sorted set.
    let mut got: Vec<(String, String)> = inbox
        .iter()
        .map(|m| {
            (
                m["content"].as_str().unwrap().to_string(),
                m["sender"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    got.sort();
    assert_eq!(
        got,
        vec![
            ("first".to_string(), "alice".to_string()),
            ("second".to_string(), "carol".to_string()),
            ("third".to_string(), "alice".to_string()),
        ]
    );

    let mut ids: Vec<i64> = inbox.iter().map(|m| m["id"].as_i64().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn login_returns_token_and_expiry() {
    let app = TestApp::new();
    let user_id = app.register("alice", "pw1").await;

    let before = Utc::now();
    let (status, body) = app
        .send(
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "pw1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id);
    assert_eq!(body["token"].as_str().unwrap().len(), 28);

    let expire: chrono::DateTime<Utc> =
        serde_json::from_value(body["expire_time"].clone()).unwrap();
    assert!(expire >= before + Duration::hours(24));
    assert!(expire <= Utc::now() + Duration::hours(24));
}

#[tokio::test]
async fn usernames_are_normalized() {
    let app = TestApp::new();
    let id = app.register("  Alice ", "pw1").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "alice", "password": "other" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "username already exists");

    let token = app.login("ALICE", "pw1").await;
    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user_id": id, "username": "alice" }));
}

#[tokio::test]
async fn empty_credentials_are_rejected() {
    let app = TestApp::new();

    for path in ["/register", "/login"] {
        let (status, body) = app
            .send(
                Method::POST,
                path,
                None,
                Some(json!({ "username": "  ", "password": "pw" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(body["message"], "username is empty");

        let (status, body) = app
            .send(
                Method::POST,
                path,
                None,
                Some(json!({ "username": "alice" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(body["message"], "password is empty");

        let (status, body) = app.send(Method::POST, path, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(body["message"], "body is empty");
    }
}

#[tokio::test]
async fn bad_credentials_do_not_leak_which_field() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;

    let (wrong_pw_status, wrong_pw) = app
        .send(
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "nope" })),
        )
        .await;
    let (unknown_status, unknown) = app
        .send(
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "mallory", "password": "pw1" })),
        )
        .await;

    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw, unknown);
    assert_eq!(wrong_pw["message"], "invalid username or password");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new();
    let routes = [
        (Method::GET, "/"),
        (Method::POST, "/"),
        (Method::GET, "/me"),
        (Method::POST, "/1/"),
        (Method::DELETE, "/1/"),
    ];

    for (method, uri) in routes {
        let (status, body) = app.send(method.clone(), uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "missing authorization bearer header");

        let (status, body) = app.send(method.clone(), uri, Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "invalid token");
    }
}

#[tokio::test]
async fn token_expires_after_ttl() {
    let app = TestApp::new();
    let user_id = app.register("alice", "pw1").await;
    let token = app.login("alice", "pw1").await;

    // Just inside the window.
    let issued = Utc::now() - Duration::hours(24) + Duration::minutes(1);
    app.state.db.upsert_token(user_id, &token, issued).unwrap();
    let (status, _) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Past it. Using the token did not renew it.
    let issued = Utc::now() - Duration::hours(24) - Duration::nanoseconds(1);
    app.state.db.upsert_token(user_id, &token, issued).unwrap();
    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "expired token");
}

#[tokio::test]
async fn new_login_invalidates_previous_token() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;

    let first = app.login("alice", "pw1").await;
    let second = app.login("alice", "pw1").await;
    assert_ne!(first, second);

    let (status, body) = app.send(Method::GET, "/me", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid token");

    let (status, _) = app.send(Method::GET, "/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_message_create_persists_nothing() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let bob_id = app.register("bob", "pw2").await;
    let alice = app.login("alice", "pw1").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/",
            Some(&alice),
            Some(json!({ "content": "", "recipients": [bob_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "content is empty");

    let (status, body) = app
        .send(
            Method::POST,
            "/",
            Some(&alice),
            Some(json!({ "content": "hi", "recipients": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "recipients is empty");

    let (status, body) = app
        .send(
            Method::POST,
            "/",
            Some(&alice),
            Some(json!({ "content": "hi", "recipients": [bob_id, bob_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "duplicate recipient");

    let (status, body) = app
        .send(
            Method::POST,
            "/",
            Some(&alice),
            Some(json!({ "content": "hi", "recipients": [bob_id, 9999] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "unknown recipient");

    let bob = app.login("bob", "pw2").await;
    assert!(app.inbox(&bob).await.is_empty());
}

#[tokio::test]
async fn only_sender_may_update_or_delete() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let bob_id = app.register("bob", "pw2").await;
    let alice = app.login("alice", "pw1").await;
    let bob = app.login("bob", "pw2").await;

    app.send_message(&alice, "hi", &[bob_id]).await;
    let id = app.inbox(&bob).await[0]["id"].as_i64().unwrap();
    let uri = format!("/{id}/");

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            Some(&bob),
            Some(json!({ "content": "hijacked", "recipients": [bob_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "not permitted");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.inbox(&bob).await[0]["content"], "hi");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.inbox(&bob).await.is_empty());

    let (status, body) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid message id");
}

#[tokio::test]
async fn update_replaces_recipient_set() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let bob_id = app.register("bob", "pw2").await;
    let carol_id = app.register("carol", "pw3").await;
    let alice = app.login("alice", "pw1").await;
    let bob = app.login("bob", "pw2").await;
    let carol = app.login("carol", "pw3").await;

    app.send_message(&alice, "draft", &[bob_id, carol_id]).await;
    let id = app.inbox(&carol).await[0]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/{id}/"),
            Some(&alice),
            Some(json!({ "content": "final", "recipients": [bob_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    assert!(app.inbox(&carol).await.is_empty());
    let inbox = app.inbox(&bob).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["content"], "final");
    assert_ne!(inbox[0]["sent_at"], inbox[0]["updated_at"]);
}

#[tokio::test]
async fn update_validates_body() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let bob_id = app.register("bob", "pw2").await;
    let alice = app.login("alice", "pw1").await;
    let bob = app.login("bob", "pw2").await;

    app.send_message(&alice, "hi", &[bob_id]).await;
    let id = app.inbox(&bob).await[0]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/{id}/"),
            Some(&alice),
            Some(json!({ "content": "changed", "recipients": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "recipients is empty");
    assert_eq!(app.inbox(&bob).await[0]["content"], "hi");
}

#[tokio::test]
async fn malformed_message_ids_are_bad_requests() {
    let app = TestApp::new();
    app.register("alice", "pw1").await;
    let alice = app.login("alice", "pw1").await;

    for (uri, message) in [
        ("/abc/", "invalid id"),
        ("/0/", "invalid id"),
        ("/999/", "invalid message id"),
        ("/999", "invalid message id"),
    ] {
        let (status, body) = app.send(Method::DELETE, uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["message"], message, "{uri}");
    }
}

#[tokio::test]
async fn version_is_public() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/version/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["release"], env!("CARGO_PKG_VERSION"));
    assert!(body["buildTime"].is_string());
    assert!(body["commit"].is_string());
}

#[tokio::test]
async fn json_responses_declare_utf8() {
    let app = TestApp::new();

    let resp = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
}
