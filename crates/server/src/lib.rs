#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod state;

use anyhow::{Context, bail};
use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use course_core::Clock;
use course_core::model::CourseId;
use services::{CatalogService, ProgressTracker};
use std::sync::Arc;
use storage::repository::Storage;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::AuthKeys;
use crate::config::{SeedArgs, ServeConfig};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let progress = Router::new()
        .route("/start", post(routes::start_course))
        .route("/lessons/{lesson_id}/complete", post(routes::complete_lesson))
        .route("/courses/{course_id}", get(routes::course_progress));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/progress", progress)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Install the global subscriber; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Open the store and serve the progress API until ctrl-c or SIGTERM.
///
/// # Errors
///
/// Fails if the secret is empty, the database cannot be opened, or the address cannot be bound.
pub async fn serve(db_url: &str, config: &ServeConfig) -> anyhow::Result<()> {
    if config.jwt_secret.trim().is_empty() {
        bail!("COURSE_JWT_SECRET must not be empty");
    }

    let storage = Storage::sqlite(db_url)
        .await
        .with_context(|| format!("failed to open database {db_url}"))?;
    let tracker = ProgressTracker::from_storage(Clock::default(), &storage);
    let state = AppState::new(tracker, AuthKeys::from_secret(config.jwt_secret.as_bytes()));

    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "course progress API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

/// Insert a demo course with `args.modules` modules of `args.lessons` lessons each.
///
/// # Errors
///
/// Fails if the database cannot be opened or any catalog insert fails.
pub async fn seed(db_url: &str, args: &SeedArgs) -> anyhow::Result<CourseId> {
    let storage = Storage::sqlite(db_url)
        .await
        .with_context(|| format!("failed to open database {db_url}"))?;
    let catalog = CatalogService::new(Clock::default(), Arc::clone(&storage.catalog));

    let course_id = catalog.create_course(args.title.clone(), None).await?;
    for m in 0..args.modules {
        let module_id = catalog
            .add_module(course_id, format!("Module {}", m + 1), m)
            .await?;
        for l in 0..args.lessons {
            catalog
                .add_lesson(module_id, format!("Lesson {}.{}", m + 1, l + 1), l)
                .await?;
        }
    }

    info!(%course_id, modules = args.modules, lessons = args.lessons, "seeded course");
    Ok(course_id)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
