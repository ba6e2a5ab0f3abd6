//! Application bootstrap: database, module registry, migrations, server.

use anyhow::Context;
use bookstore_db::Database;
use bookstore_kernel::settings::Settings;
use bookstore_kernel::{InitCtx, ModuleRegistry};

use crate::modules;

/// Registry holding every module of the application, wired to `db`.
pub fn build_registry(db: &Database) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, db);
    registry
}

/// Apply pending module migrations and return how many ran.
pub async fn migrate(db: &Database, registry: &ModuleRegistry) -> anyhow::Result<usize> {
    let migrations = registry.collect_migrations();
    let applied = db
        .migrate(&migrations)
        .await
        .context("failed to apply module migrations")?;
    tracing::info!(applied, total = migrations.len(), "migrations complete");
    Ok(applied)
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore-app bootstrap starting"
    );

    let db = Database::connect(&settings.database).await?;
    let registry = build_registry(&db);
    migrate(&db, &registry).await?;

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;
    tracing::info!(modules = registry.module_count(), "bookstore-app bootstrap complete");

    let served = bookstore_http::start_server(&registry, &settings).await;

    let stopped = registry.stop_modules().await;
    db.close().await;

    served?;
    stopped
}
