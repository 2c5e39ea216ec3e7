// NERVE API v0.1
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod cache;
mod catalog;
mod config;
mod errors;
mod events;
mod helpers;
mod models;
mod routes;
mod services;

use cache::LiveCache;
use config::AppConfig;
use events::EventBus;
use routes::AppState;
use services::scraper::Scraper;
use services::stats::StatsStore;

/// NERVE API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "NERVE API",
        version = "0.1.0",
        description = "GPU spot-market optimization engine. Continuously scrapes Azure \
            spot/on-demand prices, Open-Meteo weather and grid carbon intensity across \
            the monitored regions, scores every (region, AZ, SKU) candidate, and \
            recommends the cheapest, greenest and most reliable placement with \
            time-shifting and checkpoint-and-migrate simulation.",
        license(name = "MIT"),
    ),
    tags(
        (name = "System", description = "Health and scraper status"),
        (name = "Region & AZ", description = "Live region and availability-zone views"),
        (name = "Simulation", description = "Job placement simulation"),
        (name = "Checkpointing", description = "Spot interruption simulation"),
        (name = "Time-Shifting", description = "Optimal start-window planning"),
        (name = "Dashboard", description = "Aggregated FinOps/GreenOps stats"),
        (name = "Events", description = "Live event feed"),
    ),
    paths(
        routes::health::health_check,
        routes::status::scraper_status,
        routes::region::get_region,
        routes::region::get_azs,
        routes::simulate::simulate_job,
        routes::checkpoint::checkpoint_simulate,
        routes::timeshift::plan_timeshift,
        routes::dashboard::dashboard_stats,
        routes::events::event_feed,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            cache::ScraperStatus,
            models::RegionInfo,
            models::AzInfo,
            models::GpuInstance,
            models::SimulateRequest,
            models::SimulateResponse,
            models::Decision,
            models::Fallback,
            models::CheckpointConfig,
            models::Savings,
            models::GreenImpact,
            models::ServerStep,
            models::RiskAssessment,
            models::CheckpointSimulateRequest,
            models::CheckpointEvent,
            models::TimelineStep,
            models::TimeShiftRequest,
            models::TimeShiftPlan,
            models::DashboardStats,
            models::SpotObservation,
            models::WeatherObservation,
            models::HourlyWeather,
            models::CarbonObservation,
            models::PriceHistoryEntry,
            events::EventEnvelope,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nerve_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::from_env());

    // Shared state: live cache, persistent stats, event bus.
    let cache = LiveCache::new();
    let stats = Arc::new(StatsStore::load(config.stats_path()));
    let bus = EventBus::new();

    let app_state = AppState {
        cache: cache.clone(),
        stats: stats.clone(),
        bus: bus.clone(),
        config: config.clone(),
    };

    // Spawn the background scraper (immediate first cycle, then every
    // SCRAPE_INTERVAL_SECS).
    let scraper_task = Scraper::new(cache, bus, &config).spawn();

    // CORS: read/simulate API consumed by browser dashboards.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/scraper/status", get(routes::status::scraper_status))
        .route("/api/region", get(routes::region::get_region))
        .route("/api/azs", get(routes::region::get_azs))
        .route("/api/simulate", post(routes::simulate::simulate_job))
        .route(
            "/api/checkpoint/simulate",
            post(routes::checkpoint::checkpoint_simulate),
        )
        .route(
            "/api/timeshifting/plan",
            post(routes::timeshift::plan_timeshift),
        )
        .route(
            "/api/dashboard/stats",
            get(routes::dashboard::dashboard_stats),
        )
        .route("/api/events/feed", get(routes::events::event_feed))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(app_state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");

    scraper_task.shutdown();
}
