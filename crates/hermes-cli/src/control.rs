//! Control server: start, stop and inspect the backend over HTTP.
//!
//! - `POST /start` launches the backend
//! - `POST /stop` kills it
//! - `GET /status` reports both servers
//!
//! Transition responses are `{success, message, pid?}`; a rejected
//! transition answers `409` and a failed one `500`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::supervisor::{ProcessState, Supervisor, SupervisorError};

/// Default control server address.
pub const DEFAULT_CONTROL_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 4000);

#[derive(Debug, Serialize)]
struct TransitionResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    control_server_active: bool,
    main_server_active: bool,
    state: ProcessState,
    pid: Option<u32>,
}

type Reply = (StatusCode, Json<TransitionResponse>);

/// Build the control router over a supervisor.
pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(supervisor)
}

fn reply(status: StatusCode, success: bool, message: String, pid: Option<u32>) -> Reply {
    (
        status,
        Json(TransitionResponse {
            success,
            message,
            pid,
        }),
    )
}

fn failure(err: &SupervisorError) -> Reply {
    let status = match err {
        SupervisorError::AlreadyRunning { .. }
        | SupervisorError::NotRunning
        | SupervisorError::Busy { .. } => StatusCode::CONFLICT,
        SupervisorError::Spawn { .. }
        | SupervisorError::ExitedEarly { .. }
        | SupervisorError::Stop { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let pid = match err {
        SupervisorError::AlreadyRunning { pid } => *pid,
        _ => None,
    };
    reply(status, false, err.to_string(), pid)
}

async fn start(State(supervisor): State<Arc<Supervisor>>) -> Reply {
    match supervisor.start().await {
        Ok(pid) => reply(StatusCode::OK, true, "backend started".to_owned(), pid),
        Err(e) => {
            warn!(error = %e, "start rejected");
            failure(&e)
        }
    }
}

async fn stop(State(supervisor): State<Arc<Supervisor>>) -> Reply {
    match supervisor.stop().await {
        Ok(()) => reply(StatusCode::OK, true, "backend stopped".to_owned(), None),
        Err(e) => {
            warn!(error = %e, "stop rejected");
            failure(&e)
        }
    }
}

async fn status(State(supervisor): State<Arc<Supervisor>>) -> Json<StatusResponse> {
    let status = supervisor.status().await;
    Json(StatusResponse {
        control_server_active: true,
        main_server_active: status.running,
        state: status.state,
        pid: status.pid,
    })
}

/// Serve the control API until SIGINT or SIGTERM, then stop the backend.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_control_server(addr: SocketAddr, supervisor: Supervisor) -> anyhow::Result<()> {
    let supervisor = Arc::new(supervisor);
    let app = router(Arc::clone(&supervisor));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "control server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("control server error")?;

    match supervisor.stop().await {
        Ok(()) | Err(SupervisorError::NotRunning) => {}
        Err(e) => warn!(error = %e, "failed to stop backend on shutdown"),
    }

    info!("control server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::supervisor::ChildCommand;

    fn app(program: &str, args: &[&str]) -> Router {
        let args = args.iter().map(|a| (*a).to_owned()).collect();
        let supervisor = Supervisor::new(ChildCommand::new(program, args))
            .with_startup_grace(Duration::from_millis(100));
        router(Arc::new(supervisor))
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn status_when_idle() {
        let app = app("sleep", &["30"]);
        let (status, body) = call(&app, "GET", "/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["control_server_active"], true);
        assert_eq!(body["main_server_active"], false);
        assert_eq!(body["state"], "stopped");
        assert!(body["pid"].is_null());
    }

    #[tokio::test]
    async fn start_status_stop_cycle() {
        let app = app("sleep", &["30"]);

        let (status, body) = call(&app, "POST", "/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let pid = body["pid"].as_u64().unwrap();

        let (_, body) = call(&app, "GET", "/status").await;
        assert_eq!(body["main_server_active"], true);
        assert_eq!(body["state"], "running");
        assert_eq!(body["pid"].as_u64(), Some(pid));

        let (status, body) = call(&app, "POST", "/start").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["pid"].as_u64(), Some(pid));

        let (status, body) = call(&app, "POST", "/stop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(&app, "POST", "/stop").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "backend is not running");
    }

    #[tokio::test]
    async fn spawn_failure_is_internal_error() {
        let app = app("/nonexistent/hermes-server", &[]);
        let (status, body) = call(&app, "POST", "/start").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body.get("pid").is_none());
    }
}
