// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use sequent_kernel::duty::IdleConfig;
use sequent_node::api::{CommandRequest, StatusResponse};
use sequent_node::config::NodeConfig;
use sequent_node::node::Node;
use sequent_node::server::{build_router, AppState};
use tempfile::tempdir;
use tower::ServiceExt; // for oneshot

fn open_node(dir: &std::path::Path) -> Node {
    let cfg = NodeConfig {
        data_dir: dir.to_path_buf(),
        idle: IdleConfig::NoOp,
        ..NodeConfig::default()
    };
    Node::open(&cfg).unwrap()
}

fn state(node: &Node) -> AppState {
    AppState {
        sender: node.sender(),
        counter: node.counter(),
        stats: node.stats(),
    }
}

fn post_command(command: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/commands")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&CommandRequest {
                command: command.into(),
            })
            .unwrap(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_submitted_commands_reach_the_counter() {
    let dir = tempdir().unwrap();
    let mut node = open_node(dir.path());
    let app = build_router(state(&node), None);

    let response = app.clone().oneshot(post_command("add 40")).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let response = app.clone().oneshot(post_command("add 2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    node.run_until_idle(100).unwrap();

    let req = Request::builder().uri("/v1/status").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let status: StatusResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(status.counter, 42);
    assert_eq!(status.commands_processed, 2);
    assert_eq!(status.events_applied, 2);
}

#[tokio::test]
async fn test_bad_command_is_rejected() {
    let dir = tempdir().unwrap();
    let node = open_node(dir.path());
    let app = build_router(state(&node), None);

    let response = app.oneshot(post_command("divide 3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_token_is_required() {
    let dir = tempdir().unwrap();
    let node = open_node(dir.path());
    let app = build_router(state(&node), Some("secret".into()));

    let response = app.clone().oneshot(post_command("add 1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut req = post_command("add 1");
    req.headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
