//! HTTP server facade with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{routing::get, Router};

use bookstore_kernel::settings::Settings;
use bookstore_kernel::ModuleRegistry;

pub mod error;
pub mod router;

use router::RouterBuilder;

/// Start the HTTP server and serve until a shutdown signal arrives
pub async fn start_server(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let app = build_router(registry, settings);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {}", address))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let base_path = settings.server.base_path.as_str();
    let mut router_builder = RouterBuilder::new().route("/healthz", get(health_check));

    for module in registry.modules() {
        let module_name = module.name();
        tracing::info!(
            module = module_name,
            "mounting module routes under {}",
            router::module_path(base_path, module_name)
        );
        router_builder = router_builder.mount_module(base_path, module_name, module.routes());
    }

    router_builder
        .with_openapi(registry, base_path)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms)
        .build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "unable to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
