// Framework bootstrap for the arena server runtime.

use crate::domain::ports::{IdentityProvider, StatsRepository};
use crate::frameworks::{config, db};
use crate::interface_adapters::clients::auth::AuthClient;
use crate::interface_adapters::clients::stats::{InMemoryStatsRepository, PostgresStatsRepository};
use crate::interface_adapters::http::health_handler;
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use crate::use_cases::lobby::{RoomRegistry, RoomSettings};

use axum::{Router, routing::get};
use std::future::Future;
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

/// External collaborators and room settings the server is wired with.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub stats: Arc<dyn StatsRepository>,
    pub default_room: String,
    pub room_settings: RoomSettings,
}

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves with services built from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let services = services_from_env().await?;
    run_with_services(listener, services, std::future::pending()).await
}

/// Serves until `shutdown` resolves, then stops every room task.
pub async fn run_with_services(
    listener: tokio::net::TcpListener,
    services: Services,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let address = listener.local_addr()?;

    let room_registry = Arc::new(RoomRegistry::new(
        services.room_settings,
        Arc::clone(&services.stats),
    ));
    let state = Arc::new(AppState {
        room_registry: Arc::clone(&room_registry),
        default_room: Arc::from(services.default_room.as_str()),
        identity: services.identity,
        stats: services.stats,
    });

    tracing::info!(%address, default_room = %services.default_room, "listening");

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });
    room_registry.shutdown_all().await;
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([0, 0, 0, 0], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    let services = services_from_env().await?;
    run_with_services(listener, services, shutdown_signal()).await
}

async fn services_from_env() -> Result<Services> {
    let auth_base_url = config::auth_service_url();
    let auth_verify_timeout = config::auth_verify_timeout();
    let auth_client = AuthClient::new(auth_base_url.clone(), auth_verify_timeout)
        .map_err(|e| std::io::Error::other(format!("failed to initialize auth client: {e}")))?;
    tracing::debug!(
        auth_base_url = %auth_base_url,
        auth_verify_timeout_ms = auth_verify_timeout.as_millis(),
        "auth client configured"
    );

    let stats: Arc<dyn StatsRepository> = match config::database_url() {
        Some(url) => {
            let pool = db::connect_pool(&url)
                .await
                .map_err(|e| std::io::Error::other(format!("failed to connect database: {e}")))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| std::io::Error::other(format!("failed to run migrations: {e}")))?;
            tracing::info!("account storage: postgres");
            Arc::new(PostgresStatsRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; account flags and stats are kept in memory");
            Arc::new(InMemoryStatsRepository::new())
        }
    };

    Ok(Services {
        identity: Arc::new(auth_client),
        stats,
        default_room: config::default_room(),
        room_settings: RoomSettings {
            input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
            update_broadcast_capacity: config::UPDATE_BROADCAST_CAPACITY,
            tick_interval: config::BOT_TICK_INTERVAL,
        },
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    tracing::info!("shutdown signal received");
}
