//! In-process HTTP server for integration tests
//!
//! Every route records when it was hit so tests can check the spacing the
//! client put between requests.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Seconds the `/limited-once` route tells clients to wait
pub const RESET_SECONDS: u64 = 3;

#[derive(Default)]
struct ServerState {
    hits: Mutex<HashMap<&'static str, Vec<Instant>>>,
}

impl ServerState {
    /// Record a hit and return how many this route has had, this one included
    fn record(&self, route: &'static str) -> usize {
        let mut hits = self.hits.lock();
        let entry = hits.entry(route).or_default();
        entry.push(Instant::now());
        entry.len()
    }
}

pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .route("/ok", get(ok))
            .route("/limited-once", get(limited_once))
            .route("/bad-request", get(bad_request))
            .route("/flaky", get(flaky))
            .route("/unavailable", get(unavailable))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock server stopped: {e}");
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Instants at which `route` was hit, oldest first
    pub fn hits(&self, route: &str) -> Vec<Instant> {
        self.state.hits.lock().get(route).cloned().unwrap_or_default()
    }

    pub fn hit_count(&self, route: &str) -> usize {
        self.hits(route).len()
    }

    /// Poll until `route` has been hit `count` times
    pub async fn wait_for_hits(&self, route: &str, count: usize) {
        while self.hit_count(route) < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn ok(State(state): State<Arc<ServerState>>) -> Response {
    state.record("/ok");
    (StatusCode::OK, "ok").into_response()
}

async fn limited_once(State(state): State<Arc<ServerState>>) -> Response {
    if state.record("/limited-once") == 1 {
        let reset = RESET_SECONDS.to_string();
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("x-ratelimit-reset", reset)],
            "slow down",
        )
            .into_response()
    } else {
        (StatusCode::OK, "recovered").into_response()
    }
}

async fn bad_request(State(state): State<Arc<ServerState>>) -> Response {
    state.record("/bad-request");
    (StatusCode::BAD_REQUEST, "missing field").into_response()
}

async fn flaky(State(state): State<Arc<ServerState>>) -> Response {
    if state.record("/flaky") <= 2 {
        (StatusCode::INTERNAL_SERVER_ERROR, "try again").into_response()
    } else {
        (StatusCode::OK, "finally").into_response()
    }
}

async fn unavailable(State(state): State<Arc<ServerState>>) -> Response {
    state.record("/unavailable");
    (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance").into_response()
}
