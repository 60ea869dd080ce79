//! NalaBranch web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Health endpoint
//! - Branch token resolution (single, batch, legacy id)
//! - Request branch context resolution (payload, then session claim)
//! - Legacy branch register backfill listing and reload

pub mod api;

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use nalabranch_core::branch::{BranchRegister, BranchResolver, RegisteredBranch};
use nalabranch_core::config::AppConfig;
use nalabranch_core::errors::RegisterError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub resolver: BranchResolver,
    /// Legacy branch register, replaced wholesale on reload.
    pub register: RwLock<BTreeMap<i32, RegisteredBranch>>,
}

impl AppState {
    /// Build state from configuration, loading the register if one is
    /// configured.
    pub fn from_config(config: AppConfig) -> Result<Self, RegisterError> {
        let register = match &config.branch.register_file {
            Some(path) => BranchRegister::load(path)?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            resolver: config.branch.resolver(),
            register: RwLock::new(register),
            config,
        })
    }
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server from configuration.
    pub fn new(config: AppConfig) -> Result<Self, RegisterError> {
        let state = Arc::new(AppState::from_config(config)?);
        Ok(Self { state })
    }

    /// The application router with all routes and middleware attached.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start the web server, listening on the given address until
    /// `shutdown` resolves.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = self.router();

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("web server stopped");
        Ok(())
    }
}

/// Assemble routes and middleware around shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(api::status::routes())
        .merge(api::branches::routes())
        .merge(api::register::routes())
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(256 * 1024))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
