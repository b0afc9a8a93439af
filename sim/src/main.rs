use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{Level, info};

mod device;
mod routes;
mod vu;

use device::Registry;

/// App state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let addr = std::env::var("KPRO_SIM_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
    let state = AppState {
        registry: Arc::new(RwLock::new(Registry::seeded())),
    };

    let app = Router::new()
        .route("/api/v1/devices", get(routes::list_devices))
        .route("/api/v1/devices/{id}/status", get(routes::device_status))
        .route("/api/v1/devices/{id}/power", post(routes::set_power))
        .route("/api/v1/devices/{id}/ch/{ch}/audio", post(routes::set_audio))
        .route(
            "/api/v1/devices/{id}/ch/{ch}/delay",
            get(routes::get_delay).post(routes::set_delay),
        )
        .route("/ws", get(vu::ws_handler))
        .route("/health", get(routes::health_check))
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("mock K Pro registry listening on {addr}");
    info!("vu stream: ws://{addr}/ws?deviceId=SMX-KPRO-001&ch=1");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
