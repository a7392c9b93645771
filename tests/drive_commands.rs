//! Drive command tests against an in-process HTTP server that records the
//! actions it receives.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use rovercam::{DriveCommandClient, Orientation, RoverConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct CarState {
    actions: Arc<Mutex<Vec<String>>>,
    /// Number of requests to reject with a 500 before succeeding
    failures_left: Arc<AtomicUsize>,
}

async fn run_handler(
    State(state): State<CarState>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    if let Some(action) = params.get("action") {
        state.actions.lock().push(action.clone());
    }

    let left = state.failures_left.load(Ordering::SeqCst);
    if left > 0 {
        state.failures_left.store(left - 1, Ordering::SeqCst);
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}

async fn spawn_car(initial_failures: usize) -> (RoverConfig, Arc<Mutex<Vec<String>>>) {
    let state = CarState {
        actions: Arc::new(Mutex::new(Vec::new())),
        failures_left: Arc::new(AtomicUsize::new(initial_failures)),
    };
    let actions = Arc::clone(&state.actions);

    let app = Router::new().route("/run/", get(run_handler)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = RoverConfig {
        command_base: Some(base),
        command_timeout_ms: 2_000,
        ..RoverConfig::for_host("127.0.0.1")
    };
    (config, actions)
}

#[tokio::test]
async fn setup_sends_initialization_sequence_in_order() {
    let (config, actions) = spawn_car(0).await;
    let client = DriveCommandClient::new(&config).unwrap();

    client.setup().await;

    assert_eq!(*actions.lock(), vec!["setup", "bwready", "fwready"]);
}

#[tokio::test]
async fn motion_commands_map_to_actions() {
    let (config, actions) = spawn_car(0).await;
    let client = DriveCommandClient::new(&config).unwrap();

    client.move_forward().await;
    client.move_backward().await;
    client.stop().await;

    assert_eq!(*actions.lock(), vec!["forward", "backward", "stop"]);
}

#[tokio::test]
async fn repeated_left_press_toggles_back_to_straight() {
    let (config, actions) = spawn_car(0).await;
    let client = DriveCommandClient::new(&config).unwrap();

    client.turn_left().await;
    assert_eq!(client.orientation(), Orientation::Left);
    client.turn_left().await;
    assert_eq!(client.orientation(), Orientation::Straight);

    assert_eq!(*actions.lock(), vec!["fwleft", "fwstraight"]);
}

#[tokio::test]
async fn opposite_turn_replaces_current_orientation() {
    let (config, actions) = spawn_car(0).await;
    let client = DriveCommandClient::new(&config).unwrap();

    client.turn_right().await;
    client.turn_left().await;
    assert_eq!(client.orientation(), Orientation::Left);

    assert_eq!(*actions.lock(), vec!["fwright", "fwleft"]);
}

#[tokio::test]
async fn stop_retries_once_after_failure() {
    let (config, actions) = spawn_car(1).await;
    let client = DriveCommandClient::new(&config).unwrap();

    client.stop().await;

    assert_eq!(*actions.lock(), vec!["stop", "stop"]);
}

#[tokio::test]
async fn unreachable_car_does_not_error_the_caller() {
    // No server at all; every command fails silently.
    let config = RoverConfig {
        command_port: 9,
        command_timeout_ms: 500,
        ..RoverConfig::for_host("127.0.0.1")
    };
    let client = DriveCommandClient::new(&config).unwrap();

    client.setup().await;
    client.move_forward().await;
    client.turn_right().await;
    client.stop().await;

    // Orientation still tracks locally even when the wire is down.
    assert_eq!(client.orientation(), Orientation::Right);
}
