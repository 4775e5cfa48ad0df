use config::get_env;
use server::{ServerState, cache::PageCache};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatube_common::util::NonPositiveDurationError;
use yatube_db::{DbError, client::DbClient, memory::MemoryStore, store::Store};

mod config;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid duration in environment: {0}")]
    Duration(#[from] NonPositiveDurationError),
    #[error("TOKEN_LIFETIME_DAYS is {0}, at most {max} days are allowed", max = config::MAX_TOKEN_LIFETIME_DAYS)]
    TokenLifetimeTooLong(i64),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yatube_api=debug,\
                yatube_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn open_store(env: &config::Env) -> Result<Arc<dyn Store>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping everything in memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let db = DbClient::connect(database_url, env.database_max_connections).await?;
    db.migrate().await?;

    Ok(Arc::new(db))
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(err) => warn!(%err, "Could not listen for Ctrl-C, shutting down"),
        }
        cancel.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let page_cache_ttl = env.page_cache_ttl()?;
    let state = ServerState {
        store: open_store(&env).await?,
        page_cache: Arc::new(PageCache::new(page_cache_ttl.to_std())),
        auth_settings: server::AuthSettings {
            token_lifetime: env.token_lifetime()?,
        },
    };

    let app = server::routes(state).layer(TraceLayer::new_for_http());

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;

    info!(
        %server_address,
        page_cache_ttl_seconds = page_cache_ttl.whole_seconds(),
        "Serving"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_on_ctrl_c().cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
