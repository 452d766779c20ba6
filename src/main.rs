use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use faultline::alert::emitter::AlertEmitter;
use faultline::capture::{feed, handler as capture_handler};
use faultline::config::AppConfig;
use faultline::engine::AnalyticsEngine;
use faultline::pipeline::worker;
use faultline::query::handler as query_handler;
use faultline::storage;
use faultline::storage::gateway::SqliteGateway;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Parser)]
#[command(name = "faultline", about = "In-process error-pattern analytics service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faultline=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        db = %config.database.path.display(),
        "starting faultline"
    );

    // Setup SQLite pool
    let pool = storage::sqlite::create_pool(&config.database)?;
    storage::sqlite::init_pool(&pool).await?;
    tracing::info!("database initialized");

    let gateway = SqliteGateway::new(pool);

    // Setup alert emitter
    let slack_url = std::env::var("FAULTLINE_SLACK_WEBHOOK_URL").ok();
    let generic_url = std::env::var("FAULTLINE_WEBHOOK_URL").ok();
    let emitter = Arc::new(AlertEmitter::new(
        slack_url,
        generic_url,
        config.alerting.cooldown_secs,
    ));

    let (engine, drain_rx) = AnalyticsEngine::new(config.clone(), gateway, emitter);

    // Spawn pipeline loops
    let drain_engine = engine.clone();
    tokio::spawn(async move {
        worker::run_drain_loop(drain_engine, drain_rx).await;
    });

    let analysis_engine = engine.clone();
    tokio::spawn(async move {
        worker::run_analysis_loop(analysis_engine).await;
    });

    let retention_engine = engine.clone();
    tokio::spawn(async move {
        worker::run_retention_loop(retention_engine).await;
    });

    // Spawn external alert feed subscriber
    if config.feed.enabled {
        let feed_engine = engine.clone();
        let feed_config = config.feed.clone();
        tokio::spawn(async move {
            feed::run_feed_loop(feed_engine, feed_config).await;
        });
        tracing::info!(url = %config.feed.url, "alert feed subscriber enabled");
    }

    // Rate limiter for capture routes
    let governor_conf = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(config.rate_limit.per_second)
        .burst_size(config.rate_limit.burst_size)
        .finish()
        .expect("failed to build rate limiter config");

    // ── Capture routes (rate-limited, permissive CORS for reporting SDKs) ──
    let capture_cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([axum::http::Method::POST, axum::http::Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let max_body = config.capture.max_stack_bytes + config.capture.max_metadata_bytes + 64 * 1024;
    let capture_routes = Router::new()
        .route("/v1/events", post(capture_handler::capture_event))
        .route("/v1/events/batch", post(capture_handler::capture_batch))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(GovernorLayer::new(governor_conf))
        .layer(capture_cors)
        .with_state(engine.clone());

    // ── Query routes ──
    let query_routes = Router::new()
        .route("/health", get(query_handler::health))
        .route("/v1/patterns", get(query_handler::list_patterns))
        .route("/v1/patterns/{id}", get(query_handler::get_pattern))
        .route(
            "/v1/patterns/{id}/resolve",
            post(query_handler::resolve_pattern),
        )
        .route("/v1/analysis", get(query_handler::get_analysis))
        .route(
            "/v1/errors/{id}/root-cause",
            get(query_handler::get_root_cause),
        )
        .with_state(engine.clone());

    let app = query_routes.merge(capture_routes);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(engine))
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal(engine: Arc<AnalyticsEngine>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down...");

    // Final drain so buffered events are not lost
    engine.drain(chrono::Utc::now().timestamp_millis()).await;
}
