//! # imgup: member image upload service
//!
//! Accepts multipart uploads of member images, validates each file against an allow-list of
//! image types and a per-file size limit, and stores accepted files on local disk under unique
//! generated names. Stored files are served back over HTTP from the same directory.
//!
//! ## Request flow
//!
//! ```text
//! POST /api/uploads (multipart/form-data)
//!   -> request body limit
//!   -> per part: field name check, type check (extension + MIME), streamed write with size check
//!   -> 201 {"files": [...], "fields": {...}}   or   4xx {"message": ...} with nothing kept on disk
//! ```
//!
//! ## Module organization
//!
//! - [`upload`]: Validation policy, filename generation, disk storage and the multipart handler
//! - [`api`]: HTTP handlers and response models
//! - [`config`]: YAML + environment configuration
//! - [`errors`]: Error type and HTTP mapping
//! - [`telemetry`]: Tracing setup
//!
//! ## Quick start
//!
//! ```no_run
//! use imgup::{Application, Config};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! Application::new(config)?.serve(std::future::pending()).await
//! # }
//! ```

pub mod api;
pub mod config;
pub mod errors;
mod openapi;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod upload;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    routing::{get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use config::CorsOrigin;
use openapi::ApiDoc;
use upload::UploadHandler;

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub uploads: Arc<UploadHandler>,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origin headers carry no path, so compare against scheme://host[:port]
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![http::header::CONTENT_LENGTH]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `POST /api/uploads`: member image upload, capped at `upload.max_request_size`
/// - `GET {upload.public_path}/{filename}`: stored files, served from the upload directory
/// - `GET /healthz`: liveness probe
/// - `GET /api-docs/openapi.json` and `GET /docs`: API documentation
///
/// CORS and request tracing wrap every route.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = usize::try_from(state.config.upload.max_request_size).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route(
            "/uploads",
            post(api::handlers::uploads::upload_member_images).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .nest_service(&state.config.upload.public_path, ServeDir::new(state.uploads.dir().path()))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let router = router.layer(create_cors_layer(&state.config)?);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled service: router plus the configuration it was built from.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance.
    ///
    /// Prepares the upload directory (creating it if missing); failure to do so is fatal.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let uploads = UploadHandler::new(&config.upload)?;

        let state = AppState::builder()
            .config(config.clone())
            .uploads(Arc::new(uploads))
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "imgup listening on http://{}, uploads stored in {}",
            bind_addr,
            self.config.upload.dir.display()
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
