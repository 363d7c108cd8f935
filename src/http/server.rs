//! Per-listener HTTP server.
//!
//! # Responsibilities
//! - Accept any method on any path
//! - Run the director, forward allowed requests, answer denied ones
//! - Stream bodies in both directions
//! - Wire up middleware (timeout, request id, tracing)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::http::director::Director;
use crate::http::request::{
    append_forwarded_for, request_id, strip_hop_by_hop, MakeRequestUuid,
};
use crate::http::response::upstream_failure;
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Outbound client shared by every listener.
pub type BackendClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the outbound client. Plain http and https are both accepted;
/// which one a request uses comes from its rewritten URI.
pub fn backend_client(timeouts: &TimeoutConfig) -> BackendClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub director: Arc<Director>,
    pub client: BackendClient,
}

/// HTTP server for one listener.
pub struct HttpServer {
    router: Router,
    listen_addr: String,
}

impl HttpServer {
    pub fn new(director: Director, client: BackendClient, timeouts: &TimeoutConfig) -> Self {
        let listen_addr = director.listen_addr().to_string();
        let state = AppState {
            director: Arc::new(director),
            client,
        };
        let router = Self::build_router(timeouts, state);
        Self { router, listen_addr }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(timeouts: &TimeoutConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve connections until shutdown fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(listen_addr = %self.listen_addr, address = %addr, "Listener starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await?;

        tracing::info!(listen_addr = %self.listen_addr, "Listener stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let listener = state.director.listen_addr();
    let id = request_id(&request).unwrap_or("unknown").to_string();

    let mut outbound = match state.director.direct(request) {
        Ok(outbound) => outbound,
        Err(denial) => {
            metrics::record_request(listener, denial.outcome(), denial.status().as_u16(), start);
            return denial.into_response();
        }
    };

    strip_hop_by_hop(outbound.headers_mut());
    append_forwarded_for(outbound.headers_mut(), peer.ip());
    *outbound.version_mut() = Version::HTTP_11;

    let target = outbound.uri().to_string();
    match state.client.request(outbound).await {
        Ok(response) => {
            metrics::record_request(listener, "forwarded", response.status().as_u16(), start);
            relay(response)
        }
        Err(e) => {
            tracing::error!(request_id = %id, listen_addr = %listener, target = %target, error = %e, "Upstream error");
            let response = upstream_failure();
            metrics::record_request(listener, "upstream_error", response.status().as_u16(), start);
            response
        }
    }
}

/// Hand a backend response to the client, body still streaming.
fn relay(response: hyper::Response<hyper::body::Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
