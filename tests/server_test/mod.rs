//! Tests that exercise the HTTP surface of the auto-watcher.
//!
//! Each test builds the router around an in-memory database and a real
//! `OnesClient`, then sends it requests the way the ONES platform and the
//! settings page would. OpenAPI calls land on the mock server from
//! [`crate::common`], and `events.assert_eq()` validates which calls were
//! made. If you are uncertain about what to put in there, just start with an
//! empty list, and the error will tell you what to add.

use crate::common::{
    self, Events, HttpServerHandle, INSTALLATION_ID, Method::*, MockOnes, Response,
};
use auto_watcher::db::InstallationStore;
use auto_watcher::db::sqlite::Sqlite;
use auto_watcher::handlers::Context;
use auto_watcher::ones::OnesClient;
use axum::Router;
use axum::body::Body;
use axum::http::{self, StatusCode, header};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// A context used for running a test.
struct ServerTestCtx {
    router: Router,
    db: Arc<Sqlite>,
    events: Events,
    server: HttpServerHandle,
    manifest_path: PathBuf,
}

impl ServerTestCtx {
    fn new(ones: MockOnes) -> ServerTestCtx {
        ServerTestCtx::with_base_url(ones, Some("https://watcher.example.com"))
    }

    fn with_base_url(ones: MockOnes, base_url: Option<&str>) -> ServerTestCtx {
        crate::maybe_enable_logging();
        let (server, events) = ones.start();
        let db = Arc::new(Sqlite::open_in_memory().unwrap());
        let manifest_path = crate::test_dir().join("manifest.json");
        let ctx = Context {
            rules: db.clone(),
            installations: db.clone(),
            ones: Arc::new(OnesClient::new(Duration::from_secs(5))),
            config: Arc::new(common::config(&manifest_path, base_url)),
        };
        ServerTestCtx {
            router: auto_watcher::router(Arc::new(ctx)),
            db,
            events,
            server,
            manifest_path,
        }
    }

    async fn install(&self) {
        self.db
            .save_installation(&common::installation(&self.server))
            .await
            .unwrap();
    }

    async fn send(&self, request: http::Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn send_event(&self, event: Value) -> Value {
        let (status, body) = self.send_json("POST", "/event_cb", event).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    async fn settings(&self, method: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = http::Request::builder()
            .method(method)
            .uri("/settings/watcher-rule")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        let (status, body) = self.send(request.body(body).unwrap()).await;
        (status, serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

fn issue_created(issue_id: &str, team_id: &str) -> Value {
    json!({
        "eventID": "evt-1",
        "eventType": "ones:project:issue:created",
        "timestamp": 1718000000,
        "subscriberID": INSTALLATION_ID,
        "eventData": {
            "issueID": issue_id,
            "teamID": team_id,
            "triggerUserID": "U9",
        }
    })
}

fn project_p1() -> MockOnes {
    MockOnes::default()
        .handler(GET, "openapi/v2/project/issues/{id}", |_| {
            Response::json(json!({"project": {"id": "P1", "name": "Alpha"}}))
        })
        .handler(POST, "openapi/v2/project/issues/{id}/watchers", |_| {
            Response::new()
        })
}

async fn save_rule(ctx: &ServerTestCtx, project_id: &str, watchers: &[&str]) {
    let (status, body) = ctx
        .settings(
            "PUT",
            Some(&common::token("admin")),
            Some(json!({
                "projectId": project_id,
                "teamId": "T1",
                "watcherUserIds": watchers,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn matching_issue_gets_watchers() {
    let ctx = ServerTestCtx::new(project_p1());
    ctx.install().await;
    save_rule(&ctx, "P1", &["U1", "U2"]).await;

    let outcome = ctx.send_event(issue_created("I1", "T1")).await;
    assert_eq!(outcome, json!({"status": "processed"}));

    ctx.events.assert_eq(&[
        (GET, "/openapi/v2/project/issues/I1?teamID=T1"),
        (POST, "/openapi/v2/project/issues/I1/watchers?teamID=T1"),
    ]);
    let requests = ctx.events.requests();
    assert_eq!(requests[0].header("ones-user-id"), Some("U9"));
    assert_eq!(requests[1].json(), json!({"watchers": ["U1", "U2"]}));
}

#[tokio::test]
async fn other_project_is_ignored() {
    let ctx = ServerTestCtx::new(project_p1());
    ctx.install().await;
    save_rule(&ctx, "P2", &["U1"]).await;

    let outcome = ctx.send_event(issue_created("I1", "T1")).await;
    assert_eq!(
        outcome,
        json!({"status": "ignored", "reason": "project_mismatch"})
    );
    ctx.events
        .assert_eq(&[(GET, "/openapi/v2/project/issues/I1?teamID=T1")]);
}

#[tokio::test]
async fn unsupported_event_type() {
    let ctx = ServerTestCtx::new(project_p1());
    ctx.install().await;
    save_rule(&ctx, "P1", &["U1"]).await;

    let mut event = issue_created("I1", "T1");
    event["eventType"] = json!("ones:project:issue:updated");
    let outcome = ctx.send_event(event).await;
    assert_eq!(
        outcome,
        json!({"status": "ignored", "reason": "unsupported_event"})
    );
    ctx.events.assert_eq(&[]);
}

#[tokio::test]
async fn no_rule_configured() {
    let ctx = ServerTestCtx::new(project_p1());
    ctx.install().await;

    let outcome = ctx.send_event(issue_created("I1", "T1")).await;
    assert_eq!(outcome, json!({"status": "ignored", "reason": "no_rule"}));
    ctx.events.assert_eq(&[]);
}

#[tokio::test]
async fn unknown_installation() {
    let ctx = ServerTestCtx::new(project_p1());
    save_rule(&ctx, "P1", &["U1"]).await;

    let outcome = ctx.send_event(issue_created("I1", "T1")).await;
    assert_eq!(
        outcome,
        json!({"status": "failed", "reason": "missing_installation"})
    );
    ctx.events.assert_eq(&[]);
}

#[tokio::test]
async fn failed_lookup_is_ignored() {
    let ctx = ServerTestCtx::new(MockOnes::default().handler(
        GET,
        "openapi/v2/project/issues/{id}",
        |_| Response::new().status(404).body(b"no such issue"),
    ));
    ctx.install().await;
    save_rule(&ctx, "P1", &["U1"]).await;

    let outcome = ctx.send_event(issue_created("I1", "T1")).await;
    assert_eq!(
        outcome,
        json!({"status": "ignored", "reason": "lookup_failed"})
    );
}

#[tokio::test]
async fn failed_watcher_update() {
    let ctx = ServerTestCtx::new(
        MockOnes::default()
            .handler(GET, "openapi/v2/project/issues/{id}", |_| {
                Response::json(json!({"data": {"project": {"id": "P1"}}}))
            })
            .handler(POST, "openapi/v2/project/issues/{id}/watchers", |_| {
                Response::new().status(500)
            }),
    );
    ctx.install().await;
    save_rule(&ctx, "P1", &["U1"]).await;

    let outcome = ctx.send_event(issue_created("I1", "T1")).await;
    assert_eq!(
        outcome,
        json!({"status": "failed", "reason": "openapi_error"})
    );
}

#[tokio::test]
async fn null_issue_id_is_acknowledged() {
    let ctx = ServerTestCtx::new(project_p1());
    ctx.install().await;
    save_rule(&ctx, "P1", &["U1"]).await;

    let mut event = issue_created("I1", "T1");
    event["eventData"]["issueID"] = Value::Null;
    let outcome = ctx.send_event(event).await;
    assert_eq!(
        outcome,
        json!({"status": "ignored", "reason": "missing_issue"})
    );

    let mut event = issue_created("I1", "T1");
    event["eventType"] = Value::Null;
    let outcome = ctx.send_event(event).await;
    assert_eq!(
        outcome,
        json!({"status": "ignored", "reason": "unsupported_event"})
    );
    ctx.events.assert_eq(&[]);
}

#[tokio::test]
async fn malformed_event_is_rejected() {
    let ctx = ServerTestCtx::new(project_p1());
    let request = http::Request::builder()
        .method("POST")
        .uri("/event_cb")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = ctx.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    ctx.events.assert_eq(&[]);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let ctx = ServerTestCtx::new(project_p1());
    let request = http::Request::builder()
        .method("POST")
        .uri("/event_cb")
        .body(Body::from("{}"))
        .unwrap();
    let response = ctx.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn settings_require_a_token() {
    let ctx = ServerTestCtx::new(project_p1());
    let (status, _) = ctx.settings("GET", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.settings("GET", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn settings_round_trip() {
    let ctx = ServerTestCtx::new(project_p1());
    let token = common::token("admin");

    let (status, rule) = ctx.settings("GET", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rule["id"], "");
    assert_eq!(rule["active"], false);
    assert_eq!(rule["watcherUserIds"], json!([]));

    let (status, saved) = ctx
        .settings(
            "PUT",
            Some(&token),
            Some(json!({"projectId": "P1", "teamId": "T1", "watcherUserIds": ["U1", "U1", "U2"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["createdBy"], "admin");
    assert_eq!(saved["watcherUserIds"], json!(["U1", "U2"]));

    let (_, updated) = ctx
        .settings(
            "PUT",
            Some(&common::token("someone-else")),
            Some(json!({"projectId": "P2", "teamId": "T1", "watcherUserIds": []})),
        )
        .await;
    assert_eq!(updated["id"], saved["id"]);
    assert_eq!(updated["createdBy"], "admin");
    assert_eq!(updated["projectId"], "P2");

    let (_, current) = ctx.settings("GET", Some(&token), None).await;
    assert_eq!(current, updated);
}

#[tokio::test]
async fn settings_reject_an_empty_scope() {
    let ctx = ServerTestCtx::new(project_p1());
    let (status, _) = ctx
        .settings(
            "PUT",
            Some(&common::token("admin")),
            Some(json!({"projectId": "", "teamId": "T1", "watcherUserIds": ["U1"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, rule) = ctx
        .settings("GET", Some(&common::token("admin")), None)
        .await;
    assert_eq!(rule["active"], false);
}

#[tokio::test]
async fn install_then_enable() {
    let ctx = ServerTestCtx::new(MockOnes::default().handler(
        GET,
        "openapi/v2/account/teams",
        |_| Response::json(json!({"teams": []})),
    ));
    let (status, body) = ctx
        .send_json(
            "POST",
            "/install_cb",
            json!({
                "installation_id": INSTALLATION_ID,
                "organization_id": "org-1",
                "ones_base_url": ctx.server.base_url(),
                "access_token": "fresh-token",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["installation_id"], INSTALLATION_ID);
    assert!(body["time_stamp"].as_i64().unwrap() > 0);

    let (status, body) = ctx
        .send_json(
            "POST",
            "/enabled_cb",
            json!({"installation_id": INSTALLATION_ID}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success", "message": "ok"}));
    ctx.events.assert_eq(&[(GET, "/openapi/v2/account/teams")]);
    assert_eq!(
        ctx.events.requests()[0].header("authorization"),
        Some("Bearer fresh-token")
    );
}

#[tokio::test]
async fn install_requires_an_id() {
    let ctx = ServerTestCtx::new(MockOnes::default());
    let (status, _) = ctx
        .send_json(
            "POST",
            "/install_cb",
            json!({
                "installation_id": "",
                "ones_base_url": "https://ones.example.com",
                "access_token": "t",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enable_unknown_installation_fails() {
    let ctx = ServerTestCtx::new(MockOnes::default());
    let (status, _) = ctx
        .send_json("POST", "/enabled_cb", json!({"installation_id": "nope"}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    ctx.events.assert_eq(&[]);
}

#[tokio::test]
async fn setting_page_entries() {
    let ctx = ServerTestCtx::new(MockOnes::default());
    let (status, body) = ctx
        .send_json("POST", "/settingPage/entries", json!({"user_id": "U1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"entries": [{"title": "Rule settings", "page_url": "/static/settings-page.html"}]})
    );
}

async fn get_manifest(ctx: &ServerTestCtx) -> (StatusCode, String) {
    let request = http::Request::builder()
        .uri("/")
        .body(Body::empty())
        .unwrap();
    ctx.send(request).await
}

#[tokio::test]
async fn manifest_advertises_the_base_url() {
    let ctx = ServerTestCtx::new(MockOnes::default());
    std::fs::write(
        &ctx.manifest_path,
        r#"{"id": "auto-watcher", "name": "Auto watcher", "base_url": "http://localhost"}"#,
    )
    .unwrap();

    let (status, body) = get_manifest(&ctx).await;
    assert_eq!(status, StatusCode::OK);
    let manifest: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(manifest["id"], "auto-watcher");
    assert_eq!(manifest["base_url"], "https://watcher.example.com");
}

#[tokio::test]
async fn manifest_without_base_url() {
    let ctx = ServerTestCtx::with_base_url(MockOnes::default(), None);
    std::fs::write(
        &ctx.manifest_path,
        r#"{"id": "auto-watcher", "base_url": "http://localhost"}"#,
    )
    .unwrap();

    let (status, body) = get_manifest(&ctx).await;
    assert_eq!(status, StatusCode::OK);
    let manifest: Value = serde_json::from_str(&body).unwrap();
    assert!(manifest.get("base_url").is_none());
}

#[tokio::test]
async fn manifest_requires_an_id() {
    let ctx = ServerTestCtx::new(MockOnes::default());
    std::fs::write(&ctx.manifest_path, r#"{"name": "Auto watcher"}"#).unwrap();
    let (status, _) = get_manifest(&ctx).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    std::fs::remove_file(&ctx.manifest_path).unwrap();
    let (status, _) = get_manifest(&ctx).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
