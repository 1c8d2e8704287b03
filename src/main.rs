//! Guru Chat - guided lead-capture chat for study-abroad enquiries
//!
//! Serves the widget's dialogue over HTTP: a scripted state machine walks
//! the visitor through the intake questions and hands the finished lead
//! to a submission endpoint.

mod api;
mod config;
mod engine;
mod lead;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::ChatConfig;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guru_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = ChatConfig::from_env()?;

    let lead_submitter = lead::build_submitter(
        config.lead_submission_url.as_deref(),
        config.lead_submission_timeout,
    )?;
    match &config.lead_submission_url {
        Some(url) => tracing::info!(url = %url, "Leads will be submitted over HTTP"),
        None => tracing::warn!("LEAD_SUBMISSION_URL not set. Leads will only be logged."),
    }

    tracing::info!(
        reply_delay_ms = %config.reply_delay.as_millis(),
        "Dialogue configured"
    );

    // Create application state
    let state = AppState::new(config.dialogue_context(), lead_submitter);
    let _idle_sweeper = state.runtime.spawn_idle_sweeper(config.session_idle_ttl);
    tracing::info!(
        idle_ttl_secs = config.session_idle_ttl.as_secs(),
        "Idle chat sessions will be closed"
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Guru Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
