//! Server mode
//!
//! Configures and starts the HTTP server with all routes, then waits for
//! either the server to exit or a shutdown signal.

use actix_cors::Cors;
use actix_web::http::{Method, header};
use actix_web::{App, HttpServer, middleware::Compress};
use anyhow::{Context, Result};
use tracing::warn;

use crate::runtime::lifetime;

/// 允许跨域携带的请求头
const CORS_ALLOWED_HEADERS: [header::HeaderName; 3] =
    [header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT];
const SESSION_HEADER: &str = "x-session-id";

/// Build CORS middleware from `server.cors_allowed_origins`
///
/// Empty list keeps the browser's same-origin policy; `*` allows any origin.
fn build_cors_middleware(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() {
        return Cors::default();
    }

    let mut cors = if allowed_origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors = cors
        .allowed_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allowed_headers(CORS_ALLOWED_HEADERS)
        .allowed_header(SESSION_HEADER)
        .max_age(3600);
    cors
}

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let startup = lifetime::startup::prepare_server_startup()
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    let services = startup.services;
    let analytics_for_shutdown = services.analytics.clone();

    let config = crate::config::get_config();
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let allowed_origins = config.server.cors_allowed_origins.clone();
    if allowed_origins.iter().any(|o| o == "*") {
        warn!("CORS allows any origin");
    }

    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        let cors = build_cors_middleware(&allowed_origins);
        let services = services.clone();

        App::new()
            .wrap(cors)
            .wrap(Compress::default())
            .configure(move |cfg| services.configure(cfg))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .workers(cpu_count)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?;

    warn!("Starting server at http://{}", bind_address);
    let server = server.run();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(analytics_for_shutdown) => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}
