// HTTP transport: axum router over the transform engine and the upload store.

mod handlers;
mod response;

use crate::adapters::storage::LocalUploadStore;
use crate::config::ServiceConfig;
use crate::core::TransformEngine;
use crate::domain::ports::UploadStore;
use crate::utils::error::{Result, ServiceError};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared by every handler. Both members are stateless between requests.
pub struct AppState {
    pub engine: Arc<TransformEngine>,
    pub uploads: Arc<dyn UploadStore>,
}

impl AppState {
    pub fn new(engine: TransformEngine, uploads: impl UploadStore + 'static) -> Self {
        Self {
            engine: Arc::new(engine),
            uploads: Arc::new(uploads),
        }
    }
}

/// Router with the built-in engine and a local upload store, as configured.
pub fn app(config: &ServiceConfig) -> Result<Router> {
    let engine = TransformEngine::builtin(config.format_options())?;
    let uploads = LocalUploadStore::new(config.upload_dir.clone());
    router(Arc::new(AppState::new(engine, uploads)), config)
}

pub fn router(state: Arc<AppState>, config: &ServiceConfig) -> Result<Router> {
    let app = Router::new()
        .route("/", get(handlers::health))
        .route("/convert/csv-to-json", post(handlers::convert_csv_upload))
        .route("/convert/:pair", post(handlers::convert))
        .route("/upload", post(handlers::upload))
        .route("/format/:format", post(handlers::format))
        .route("/validate/:format", post(handlers::validate))
        .route("/transform", post(handlers::transform))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    Ok(app)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            let origin = origin.trim_end_matches('/');
            HeaderValue::from_str(origin).map_err(|e| ServiceError::InvalidConfigValueError {
                field: "server.allowed_origins".to_string(),
                value: origin.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Binds the configured address and serves until ctrl-c or SIGTERM.
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let app = app(&config)?;
    let addr = config.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    tracing::info!("Staging uploads in {}", config.upload_dir.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;

    tracing::info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_rejects_unprintable_origin() {
        let err = cors_layer(&["http://a.test\n".to_string()]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_app_builds_from_defaults() {
        assert!(app(&ServiceConfig::default()).is_ok());
    }
}
