use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{routing::get, Router};
use error_stack::{Report, ResultExt};
use filigree::{errors::panic_handler, requests::MakeRequestUuidV7};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::{event, Level};

use crate::{
    coordinator::AccountCoordinator,
    error::Error,
    remote::{AuthBridge, PropertyStore},
};

mod health;

/// Shared state used by the server
pub struct ServerStateInner {
    /// If the app is running in production mode. This should be used sparingly as there should be
    /// a minimum of difference between production and development to prevent bugs.
    pub production: bool,
    /// The SQLite connection pool
    pub db: SqlitePool,
    /// Free-form account properties
    pub storage: Arc<dyn PropertyStore>,
    /// Account create, delete and verify flows
    pub accounts: AccountCoordinator,
}

impl std::fmt::Debug for ServerStateInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerStateInner")
            .field("production", &self.production)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct ServerState(Arc<ServerStateInner>);

impl ServerState {
    pub fn new(
        production: bool,
        db: SqlitePool,
        bridge: Arc<dyn AuthBridge>,
        storage: Arc<dyn PropertyStore>,
    ) -> Self {
        let accounts = AccountCoordinator::new(db.clone(), bridge, storage.clone());
        ServerState(Arc::new(ServerStateInner {
            production,
            db,
            storage,
            accounts,
        }))
    }
}

impl std::ops::Deref for ServerState {
    type Target = ServerStateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The server and related information
pub struct Server {
    /// The host the server is bound to
    pub host: String,
    /// The port the server is bound to
    pub port: u16,
    /// The server itself.
    pub app: Router<()>,
    /// The server state.
    pub state: ServerState,
    /// The server's TCP listener
    pub listener: tokio::net::TcpListener,
}

impl Server {
    /// Run the server, and perform a graceful shutdown when receiving a ctrl+c (SIGINT or
    /// equivalent).
    pub async fn run(self) -> Result<(), Report<Error>> {
        let shutdown = filigree::server::shutdown_signal();
        self.run_with_shutdown_signal(shutdown).await
    }

    /// Run the server, and shut it down when `shutdown` resolves.
    pub async fn run_with_shutdown_signal(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Report<Error>> {
        axum::serve(
            self.listener,
            self.app
                .into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .change_context(Error::ServerStart)?;

        self.state.db.close().await;

        Ok(())
    }
}

/// Create a TCP listener.
pub async fn create_tcp_listener(
    host: &str,
    port: u16,
) -> Result<tokio::net::TcpListener, Report<Error>> {
    let bind_ip = host.parse::<IpAddr>().change_context(Error::ServerStart)?;
    let bind_addr = SocketAddr::from((bind_ip, port));
    tokio::net::TcpListener::bind(bind_addr)
        .await
        .change_context(Error::ServerStart)
}

pub enum ServerBind {
    /// A host and port to bind to
    HostPort(String, u16),
    /// An existing TCP listener to use
    Listener(tokio::net::TcpListener),
}

/// Configuration for the server
pub struct Config {
    /// The environment we're running in. Currently this just distinguishes between
    /// "development" and any other value.
    pub env: String,
    /// The host and port to bind to, or an existing TCP listener
    pub bind: ServerBind,
    /// How long to wait before timing out a request
    pub request_timeout: std::time::Duration,
    pub db: SqlitePool,
    pub bridge: Arc<dyn AuthBridge>,
    pub storage: Arc<dyn PropertyStore>,
}

/// Create the server and return it, ready to run.
pub async fn create_server(config: Config) -> Result<Server, Report<Error>> {
    let production = config.env != "development" && !cfg!(debug_assertions);

    let state = ServerState::new(production, config.db, config.bridge, config.storage);

    let app = Router::new()
        .route("/healthz", get(health::healthz))
        .merge(crate::models::create_routes())
        .fallback(|| async { Error::NotFound("Route") })
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(panic_handler(production))
                .set_x_request_id(MakeRequestUuidV7)
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::extract::Request| {
                            let method = req.method();
                            let uri = req.uri();

                            // Add the matched route to the span
                            let route = req
                                .extensions()
                                .get::<axum::extract::MatchedPath>()
                                .map(|matched_path| matched_path.as_str());

                            let request_id = req
                                .headers()
                                .get("X-Request-Id")
                                .and_then(|s| s.to_str().ok())
                                .unwrap_or("");

                            tracing::info_span!("request", ?request_id, %method, %uri, route)
                        })
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        )
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
                )
                .layer(TimeoutLayer::new(config.request_timeout))
                .propagate_x_request_id()
                .layer(CompressionLayer::new())
                .into_inner(),
        );

    let listener = match config.bind {
        ServerBind::Listener(l) => l,
        ServerBind::HostPort(host, port) => create_tcp_listener(&host, port).await?,
    };

    let actual_addr = listener.local_addr().change_context(Error::ServerStart)?;
    let port = actual_addr.port();
    let host = actual_addr.ip().to_string();
    event!(Level::INFO, "Listening on {host}:{port}");

    Ok(Server {
        host,
        port,
        app,
        state,
        listener,
    })
}
