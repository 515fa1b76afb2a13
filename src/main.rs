use anyhow::Context;
use biblio_db::Db;
use biblio_kernel::{settings::Settings, InitCtx, ModuleRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load biblio settings")?;
    biblio_telemetry::init(&settings.telemetry);

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "biblio-app bootstrap starting"
    );

    let db = Db::connect(&settings.database.url)
        .await
        .with_context(|| "failed to open database")?;

    let mut registry = ModuleRegistry::new();
    biblio_app::modules::register_all(&mut registry);

    db.run_migrations(&registry.collect_migrations())
        .await
        .with_context(|| "failed to run migrations")?;

    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!("biblio-app bootstrap complete");

    biblio_http::start_server(&registry, &settings).await?;

    // Reached after the graceful-shutdown signal drains the server.
    registry.stop_modules().await?;
    db.close().await;
    tracing::info!("database connection closed");

    Ok(())
}
