// SPDX-License-Identifier: EUPL-1.2

//! HTTP-level tests against the in-memory state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

use hosting_portal::{
    auth::{identity_message, IDENTITY_HEADER, ROLE_HEADER, SIGNATURE_HEADER},
    models::{Role, Stage},
    router,
    routing::{EscalationPolicy, Routing},
    AppState,
};

fn server() -> TestServer {
    let routing = Routing::new(
        HashMap::from([(Stage::Hod, "Dr. Sarah Johnson".to_string())]),
        EscalationPolicy::default(),
    );
    let state = Arc::new(AppState::in_memory(routing, None));
    TestServer::new(router(state)).unwrap()
}

fn header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap()
}

fn as_user(request: TestRequest, identity: &str, role: &str) -> TestRequest {
    request
        .add_header(HeaderName::from_static(IDENTITY_HEADER), header(identity))
        .add_header(HeaderName::from_static(ROLE_HEADER), header(role))
}

async fn submit(server: &TestServer, developer: &str) -> Value {
    let response = as_user(server.post("/applications"), developer, "developer")
        .json(&json!({
            "artifact_ref": "blob://uploads/Employee Portal v2.1.war",
            "checklist": { "secure_guidelines": true },
            "internet_facing": "yes",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

async fn act(server: &TestServer, id: &str, action: &str, identity: &str, role: &str) -> Value {
    let response = as_user(
        server.post(&format!("/applications/{id}/{action}")),
        identity,
        role,
    )
    .await;
    response.assert_status_ok();
    response.json::<Value>()
}

#[tokio::test]
async fn health_is_public() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["service"], "hosting-portal");
}

#[tokio::test]
async fn requests_without_identity_are_unauthenticated() {
    let response = server().get("/applications").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["kind"], "unauthenticated");
}

#[tokio::test]
async fn submission_validation_errors() {
    let server = server();
    let response = as_user(server.post("/applications"), "dev@bhel.com", "developer")
        .json(&json!({
            "artifact_ref": "blob://uploads/app.war",
            "checklist": {},
            "internet_facing": "",
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["kind"], "validation");
}

#[tokio::test]
async fn submit_then_walk_the_pipeline() {
    let server = server();
    let app = submit(&server, "devanshi@bhel.com").await;
    let id = app["id"].as_str().unwrap().to_string();

    assert_eq!(app["name"], "Employee Portal v2.1");
    assert_eq!(app["stage"], "reviewer");
    assert_eq!(app["status"], "pending");
    assert_eq!(app["state"], "under_reviewer_review");
    assert_eq!(app["checklist_status"], "partial");
    assert_eq!(app["checklist_completed"], 1);

    // Wrong role at the reviewer stage.
    let response = as_user(
        server.post(&format!("/applications/{id}/approve")),
        "hod@bhel.com",
        "hod",
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["kind"], "invalid_transition");

    let response = as_user(
        server.post(&format!("/applications/{id}/approve")),
        "jane@bhel.com",
        "reviewer",
    )
    .json(&json!({ "remarks": "All checklist items completed" }))
    .await;
    response.assert_status_ok();
    let app = response.json::<Value>();
    assert_eq!(app["stage"], "hod");
    assert_eq!(app["current_approver"], "Dr. Sarah Johnson");

    let app = act(&server, &id, "escalate", "hod@bhel.com", "hod").await;
    assert_eq!(app["status"], "escalated");
    assert_eq!(app["stage"], "dtg");

    act(&server, &id, "approve", "mike@bhel.com", "dtg").await;
    act(&server, &id, "approve", "alex@bhel.com", "cdt").await;
    let app = act(&server, &id, "approve", "sam@bhel.com", "hosting").await;
    assert_eq!(app["status"], "hosted");
    assert_eq!(app["current_approver"], Value::Null);

    let response = as_user(
        server.post(&format!("/applications/{id}/reject")),
        "root",
        "admin",
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);

    let trail = as_user(
        server.get(&format!("/applications/{id}/audit")),
        "devanshi@bhel.com",
        "developer",
    )
    .await;
    trail.assert_status_ok();
    let trail = trail.json::<Value>();
    assert_eq!(trail["count"], 5);
    let actions: Vec<&str> = trail["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        ["approved", "escalated", "approved", "approved", "hosted"]
    );
    assert_eq!(trail["entries"][0]["performed_by"], "Reviewer - jane@bhel.com");
    assert_eq!(trail["entries"][0]["remarks"], "All checklist items completed");
}

#[tokio::test]
async fn developers_only_see_their_own_applications() {
    let server = server();
    let mine = submit(&server, "devanshi@bhel.com").await;
    submit(&server, "ansh@bhel.com").await;

    let listed = as_user(server.get("/applications"), "devanshi@bhel.com", "developer").await;
    listed.assert_status_ok();
    let listed = listed.json::<Value>();
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["applications"][0]["id"], mine["id"]);

    let all = as_user(server.get("/applications"), "root", "admin").await;
    assert_eq!(all.json::<Value>()["count"], 2);

    let id = mine["id"].as_str().unwrap();
    let response = as_user(
        server.get(&format!("/applications/{id}")),
        "ansh@bhel.com",
        "developer",
    )
    .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_and_summary() {
    let server = server();
    let first = submit(&server, "devanshi@bhel.com").await;
    submit(&server, "ansh@bhel.com").await;
    let id = first["id"].as_str().unwrap();
    act(&server, id, "approve", "jane@bhel.com", "reviewer").await;

    let at_hod = as_user(
        server.get("/applications?stage=hod&status=all&search=EMPLOYEE"),
        "root",
        "admin",
    )
    .await;
    at_hod.assert_status_ok();
    let at_hod = at_hod.json::<Value>();
    assert_eq!(at_hod["count"], 1);
    assert_eq!(at_hod["applications"][0]["id"], first["id"]);

    let bad = as_user(server.get("/applications?stage=qa"), "root", "admin").await;
    bad.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let queue = as_user(server.get("/applications/queue"), "hod@bhel.com", "hod").await;
    queue.assert_status_ok();
    assert_eq!(queue.json::<Value>()["count"], 1);

    let summary = as_user(server.get("/applications/summary"), "root", "admin").await;
    summary.assert_status_ok();
    let summary = summary.json::<Value>();
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["by_stage"]["hod"], 1);
    assert_eq!(summary["by_stage"]["reviewer"], 1);
    assert_eq!(summary["by_status"]["pending"], 2);
}

#[tokio::test]
async fn audit_query_is_scoped() {
    let server = server();
    let app = submit(&server, "devanshi@bhel.com").await;
    let id = app["id"].as_str().unwrap();
    act(&server, id, "approve", "jane@bhel.com", "reviewer").await;
    act(&server, id, "approve", "root", "admin").await;

    let all = as_user(server.get("/audit"), "root", "admin").await;
    all.assert_status_ok();
    let all = all.json::<Value>();
    assert_eq!(all["count"], 2);
    assert_eq!(all["entries"][1]["on_behalf_of"], "hod");
    assert_eq!(
        all["entries"][1]["performed_by"],
        "Admin - root on behalf of HOD"
    );

    let own = as_user(server.get("/audit"), "jane@bhel.com", "reviewer").await;
    assert_eq!(own.json::<Value>()["count"], 1);

    let forbidden = as_user(server.get("/audit?actor=root"), "jane@bhel.com", "reviewer").await;
    forbidden.assert_status(StatusCode::FORBIDDEN);

    let approvals = as_user(server.get("/audit?action=approved"), "root", "admin").await;
    assert_eq!(approvals.json::<Value>()["count"], 2);

    let hosted = as_user(server.get("/audit?action=hosted"), "root", "admin").await;
    assert_eq!(hosted.json::<Value>()["count"], 0);
}

#[tokio::test]
async fn stale_expected_version_conflicts() {
    let server = server();
    let app = submit(&server, "devanshi@bhel.com").await;
    let id = app["id"].as_str().unwrap();

    let first = as_user(
        server.post(&format!("/applications/{id}/approve")),
        "root",
        "admin",
    )
    .json(&json!({ "expected_version": 1 }))
    .await;
    first.assert_status_ok();

    let second = as_user(
        server.post(&format!("/applications/{id}/approve")),
        "other-admin",
        "admin",
    )
    .json(&json!({ "expected_version": 1 }))
    .await;
    second.assert_status(StatusCode::CONFLICT);
    assert_eq!(second.json::<Value>()["kind"], "concurrent_modification");
}

#[tokio::test]
async fn signed_identity_is_required_when_key_configured() {
    let signing = SigningKey::from_bytes(&[42u8; 32]);
    let state = Arc::new(AppState::in_memory(
        Routing::default(),
        Some(signing.verifying_key()),
    ));
    let server = TestServer::new(router(state)).unwrap();

    let unsigned = as_user(server.get("/applications"), "root", "admin").await;
    unsigned.assert_status(StatusCode::UNAUTHORIZED);

    let signature = URL_SAFE_NO_PAD.encode(
        signing
            .sign(identity_message("root", Role::Admin).as_bytes())
            .to_bytes(),
    );
    let signed = as_user(server.get("/applications"), "root", "admin")
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            header(&signature),
        )
        .await;
    signed.assert_status_ok();

    let forged = as_user(server.get("/applications"), "root", "admin")
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            header(&URL_SAFE_NO_PAD.encode([0u8; 64])),
        )
        .await;
    forged.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_transition_body_is_rejected() {
    let server = server();
    let app = submit(&server, "devanshi@bhel.com").await;
    let id = app["id"].as_str().unwrap();
    act(&server, id, "approve", "jane@bhel.com", "reviewer").await;

    let response = as_user(
        server.post(&format!("/applications/{id}/approve")),
        "root",
        "admin",
    )
    .json(&json!({ "remarks": "ok", "expected_version": "1" }))
    .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["kind"], "validation");

    let unchanged = as_user(server.get(&format!("/applications/{id}")), "root", "admin").await;
    let unchanged = unchanged.json::<Value>();
    assert_eq!(unchanged["stage"], "hod");
    assert_eq!(unchanged["version"], 2);
}

#[tokio::test]
async fn stage_roles_see_their_own_entries_in_a_trail() {
    let server = server();
    let app = submit(&server, "devanshi@bhel.com").await;
    let id = app["id"].as_str().unwrap();
    act(&server, id, "approve", "jane@bhel.com", "reviewer").await;
    act(&server, id, "approve", "hod@bhel.com", "hod").await;

    let trail = as_user(
        server.get(&format!("/applications/{id}/audit")),
        "hod@bhel.com",
        "hod",
    )
    .await;
    trail.assert_status_ok();
    let trail = trail.json::<Value>();
    assert_eq!(trail["count"], 1);
    assert_eq!(trail["entries"][0]["actor"]["identity"], "hod@bhel.com");

    let full = as_user(server.get(&format!("/applications/{id}/audit")), "root", "admin").await;
    assert_eq!(full.json::<Value>()["count"], 2);
}
