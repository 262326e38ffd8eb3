//! HTTPS listener serving the static directory and `/update-time`.

mod update_time;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::any;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use log::{error, info};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;

pub use update_time::TimeTracker;

/// Build the application router.
pub fn router(tracker: Arc<TimeTracker>, static_dir: &Path, timeout: Duration) -> Router {
    Router::new()
        .route("/update-time", any(update_time::update_time))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(middleware::from_fn(log_request))
        .with_state(tracker)
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let resp = next.run(req).await;
    info!(
        "{method} {path} -> {} ({:?})",
        resp.status().as_u16(),
        started.elapsed()
    );
    resp
}

/// Bind the TLS listener and serve until Ctrl-C.
///
/// The certificate and key named in `cfg.tls` must already exist.
pub async fn serve(cfg: &Config) -> Result<()> {
    let addr: SocketAddr = cfg
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", cfg.server.bind))?;

    let tls = RustlsConfig::from_pem_file(&cfg.tls.cert_path, &cfg.tls.key_path)
        .await
        .context("Failed to load TLS certificate")?;

    if !cfg.server.static_dir.is_dir() {
        log::warn!(
            "Static directory {} does not exist, only /update-time will respond",
            cfg.server.static_dir.display()
        );
    }

    let app = router(
        Arc::new(TimeTracker::default()),
        &cfg.server.static_dir,
        Duration::from_secs(cfg.server.request_timeout_secs),
    );

    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    info!("HTTPS server starting on https://localhost:{}", addr.port());
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .with_context(|| format!("HTTPS server failed on {addr}"))?;

    info!("HTTPS server stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        return;
    }
    info!("Shutdown requested, draining connections");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
