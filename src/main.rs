//! crm-server: standalone host for the CRM routes.

use crm_pack::{apply_migrations, ensure_database_exists, load_model, routes, seed_pipeline_stages, AppState, Settings};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crm_pack=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let model = load_model(&settings.schema)?;
    apply_migrations(&pool, &model).await?;
    seed_pipeline_stages(&pool, &model).await?;

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(pool, model, settings);
    let app = routes::app(state);

    let listener = TcpListener::bind(bind_addr.as_str()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
