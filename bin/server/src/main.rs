use querydeck_server::{
    auth::{AppState, PgSessionRepository, Stores},
    config::ServerConfig,
    error::StartupError,
    router,
};
use querydeck_platform_access::SessionStore;
use rootcause::Report;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> querydeck_core::Result<(), StartupError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| {
        startup(StartupError::Config {
            details: e.to_string(),
        })
        .attach("settings come from DATABASE_URL and AUTH__* / SESSION__* variables")
    })?;
    tracing::info!(environment = ?config.environment, "Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            startup(StartupError::Database {
                details: e.to_string(),
            })
            .attach(format!("environment: {:?}", config.environment))
        })?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            startup(StartupError::Migration {
                details: e.to_string(),
            })
            .attach("migrations are embedded from bin/server/migrations")
        })?;

    // Cleanup expired sessions on startup, then periodically
    let sessions = PgSessionRepository::new(db_pool.clone());
    sweep_expired_sessions(&sessions).await;

    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        // The first tick completes immediately; startup already swept.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_expired_sessions(&sessions).await;
        }
    });

    if config.auth.gateway_key.is_none() {
        tracing::warn!("AUTH__GATEWAY_KEY is unset; OAuth callback is disabled");
    }

    let app_state = Arc::new(AppState::new(&config, Stores::postgres(db_pool)));
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| {
            startup(StartupError::Bind {
                address: config.bind_address.clone(),
                details: e.to_string(),
            })
        })?;

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            startup(StartupError::Serve {
                details: e.to_string(),
            })
        })?;

    Ok(())
}

fn startup(error: StartupError) -> Report<StartupError> {
    Report::new(error)
}

async fn sweep_expired_sessions(sessions: &PgSessionRepository) {
    match sessions.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(deleted_sessions = count, "Cleaned up expired sessions");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions");
        }
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_report_keeps_its_context() {
        let report = startup(StartupError::Config {
            details: "missing field `database_url`".to_string(),
        })
        .attach("settings come from the environment");

        assert!(matches!(
            report.current_context(),
            StartupError::Config { details } if details.contains("database_url")
        ));
    }
}
