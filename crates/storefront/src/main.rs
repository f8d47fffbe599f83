//! Tradedesk Storefront - local B2B storefront server.
//!
//! This binary serves the JSON storefront on port 3000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, JSON handlers only
//! - ERP whitelisted-method RPC for catalog, pricing and quotations
//! - Optimistic cart store reconciled against the ERP's draft quotation
//! - File-backed session shared with `td-cli login`
//!
//! The server never logs in by itself; run `td-cli login` first.

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secrecy::ExposeSecret;
use tradedesk_storefront::config::StorefrontConfig;
use tradedesk_storefront::error::set_sentry_user;
use tradedesk_storefront::routes;
use tradedesk_storefront::session::{FileStorage, SessionStore};
use tradedesk_storefront::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.expose_secret(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.sentry.environment.clone().into()),
            sample_rate: config.sentry.sample_rate,
            traces_sample_rate: config.sentry.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Persist the active quotation name whenever it changes.
///
/// Runs until the cart store is dropped.
fn spawn_cart_persistence(state: &AppState) {
    let session = state.session().clone();
    let mut snapshots = state.cart().subscribe();

    tokio::spawn(async move {
        let mut remembered = snapshots.borrow_and_update().cart.name.clone();
        while snapshots.changed().await.is_ok() {
            let name = snapshots.borrow_and_update().cart.name.clone();
            if name == remembered {
                continue;
            }
            if let Err(e) = session.remember_cart(name.as_ref()) {
                tracing::warn!(error = %e, "Failed to persist active cart");
                continue;
            }
            remembered = name;
        }
    });
}

/// Pick up the cart remembered from the previous run.
async fn resume_cart(state: &AppState) {
    let remembered = match state.session().remembered_cart() {
        Ok(Some(name)) => name,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read remembered cart");
            return;
        }
    };

    match state.cart().resume(remembered.clone()).await {
        Ok(cart) => tracing::info!(
            quotation = %remembered,
            lines = cart.line_count(),
            "Resumed cart"
        ),
        Err(e) => tracing::warn!(quotation = %remembered, error = %e, "Could not resume cart"),
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tradedesk_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let storage = FileStorage::new(&config.state_dir);
    let session = SessionStore::open(storage).expect("Failed to restore session");
    match session.current() {
        Some(user) => {
            set_sentry_user(user.email.as_str(), &user.full_name);
            tracing::info!(email = %user.email, "Session restored");
        }
        None => tracing::warn!("No session found, run `td-cli login` first"),
    }

    let state = AppState::new(config.clone(), session);
    resume_cart(&state).await;
    spawn_cart_persistence(&state);

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the ERP.
async fn health() -> &'static str {
    "ok"
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
