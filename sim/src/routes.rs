//! REST surface of the mock registry: device listing, status, and the
//! power/audio/delay command endpoints. JSON in, JSON out, camelCase.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::AppState;
use crate::device::{
    AudioCommand, AudioResponse, DelayCommand, DelayResponse, DeviceList, DeviceStatus,
    PowerCommand, PowerResponse, RegistryError,
};

pub struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn list_devices(State(state): State<AppState>) -> Json<DeviceList> {
    Json(state.registry.read().await.list())
}

pub async fn device_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceStatus>, ApiError> {
    let registry = state.registry.read().await;
    let dev = registry.get(&id).ok_or(RegistryError::DeviceNotFound)?;
    Ok(Json(dev.clone()))
}

pub async fn set_power(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(cmd): Json<PowerCommand>,
) -> Result<Json<PowerResponse>, ApiError> {
    let resp = state.registry.write().await.set_power(&id, cmd)?;
    Ok(Json(resp))
}

pub async fn set_audio(
    State(state): State<AppState>,
    Path((id, ch)): Path<(String, usize)>,
    Json(cmd): Json<AudioCommand>,
) -> Result<Json<AudioResponse>, ApiError> {
    let resp = state.registry.write().await.update_audio(&id, ch, cmd)?;
    Ok(Json(resp))
}

pub async fn get_delay(
    State(state): State<AppState>,
    Path((id, ch)): Path<(String, usize)>,
) -> Result<Json<DelayResponse>, ApiError> {
    let resp = state.registry.read().await.delay_state(&id, ch)?;
    Ok(Json(resp))
}

pub async fn set_delay(
    State(state): State<AppState>,
    Path((id, ch)): Path<(String, usize)>,
    Json(cmd): Json<DelayCommand>,
) -> Result<Json<DelayResponse>, ApiError> {
    let resp = state.registry.write().await.update_delay(&id, ch, cmd)?;
    Ok(Json(resp))
}

pub async fn health_check() -> impl IntoResponse {
    "kpro-sim ok"
}
