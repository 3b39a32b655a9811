use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lessons_admin::{
    config::{Config, StoreKind},
    db,
    memory::MemoryStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "lessons_admin=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;

    let state = match cfg.store {
        StoreKind::Postgres => {
            let url = cfg.database_url.as_deref().unwrap_or_default();
            let pool = db::connect(url).await?;
            // crate-relative path for sqlx migrations
            sqlx::migrate!("./migrations").run(&pool).await?;
            AppState::new(Arc::new(db::PgStore::new(pool)))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory lesson store; data is lost on exit");
            AppState::new(MemoryStore::new_shared())
        }
    }
    .with_batch_concurrency(cfg.batch_concurrency);

    let app = lessons_admin::app(state, cfg.max_body_bytes);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
