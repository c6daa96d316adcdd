use axum::{Router, http::header, routing::get};
use paysplit::api::handlers::api_routes;
use paysplit::api::openapi::ApiDoc;
use paysplit::config::CONFIG;
use paysplit::core::clock::SystemClock;
use paysplit::core::services::{PayService, PayServiceParts};
use paysplit::infrastructure::{
    gateway::sandbox::SandboxGateway, logging::in_memory::InMemoryLogging, notifier::LogNotifier,
    qr::DataUriRenderer, storage::in_memory::InMemoryStorage,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&CONFIG.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!(config = ?*CONFIG, "starting paysplit");

    let service = Arc::new(PayService::new(PayServiceParts {
        storage: InMemoryStorage::new(),
        gateway: SandboxGateway::new(),
        notifier: LogNotifier::new(),
        logging: InMemoryLogging::new(),
        clock: Arc::new(SystemClock),
        renderer: Arc::new(DataUriRenderer),
        jwt_secret: CONFIG.jwt_secret.clone(),
        settings: CONFIG.service_settings(),
    }));

    let app = Router::new()
        .route("/", get(|| async { "OK" }))
        .nest("/api", api_routes(service))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(CONFIG.request_timeout_secs)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], CONFIG.port));
    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
