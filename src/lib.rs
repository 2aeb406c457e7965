//! Multi-user todo list served over HTTP.
//!
//! Users register on `/`, log in on `/login` and then manage their own todos
//! under `/todo`. Sessions are signed cookies backed by the same SQLite
//! database that holds users and todos.

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use axum_login::AuthManagerLayerBuilder;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::Key, ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

pub mod authentication;
pub mod config;
pub mod crud_ops;
pub mod entities;
pub mod error;
pub mod forms;
pub mod store;
pub mod todos;
pub mod views;

use authentication::{login_form, logout, register_form, require_login, sign_in, sign_up};
use config::Config;
use crud_ops::{create_todo, delete_todo, get_todos, update_todo};
use error::StartupError;
use store::Database;

pub struct SessionSettings {
    pub key: Key,
    pub inactivity: time::Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            key: config.session_key(),
            inactivity: config.session_inactivity,
        }
    }
}

/// Builds the full application. The returned store is the session table,
/// handed back so the caller can prune expired sessions.
pub async fn app(
    db: Database,
    settings: SessionSettings,
) -> Result<(Router, SqliteStore), sqlx::Error> {
    let session_store = SqliteStore::new(db.pool().clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store.clone())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(settings.inactivity))
        .with_signed(settings.key);

    let backend = authentication::SqliteAuthBackend::new(db.clone());
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let router = Router::new()
        .route("/todo", get(get_todos).post(create_todo))
        .route("/update/{todo_id}", get(update_todo))
        .route("/delete/{todo_id}", get(delete_todo))
        .route("/logout", get(logout))
        .route_layer(middleware::from_fn(require_login))
        .route("/", get(register_form).post(sign_up))
        .route("/login", get(login_form).post(sign_in))
        .with_state(db)
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http());

    Ok((router, session_store))
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "todo_web=debug,tower_http=info".into());

    fmt().with_env_filter(filter).init();
}

pub async fn run_server() -> Result<(), StartupError> {
    let config = Config::load()?;

    info!("Connecting to {}", config.database_url);
    let db = Database::connect(&config.database_url, config.max_connections).await?;

    let (app, session_store) = app(db, SessionSettings::from(&config)).await?;

    let deletion_task = tokio::task::spawn(async move {
        if let Err(e) = session_store
            .continuously_delete_expired(Duration::from_secs(60))
            .await
        {
            error!(error = %e, "expired session pruning stopped");
        }
    });

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    deletion_task.abort();
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
