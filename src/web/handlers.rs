use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::buttons::{ButtonModel, ButtonStatus, FormFactor};
use crate::bus::names::*;
use crate::error::{AppError, Result};
use crate::state::AppState;

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub open_lines: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        open_lines: state.buttons.registry().open_count(),
    })
}

// ============================================================================
// Buttons
// ============================================================================

pub async fn list_buttons(State(state): State<Arc<AppState>>) -> Json<Vec<ButtonStatus>> {
    Json(state.buttons.models().iter().map(|m| m.status()).collect())
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    /// `None` until a mapped position has been seen
    pub position: Option<u32>,
    pub max_position: Option<u64>,
}

pub async fn host_selector_position(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PositionResponse>> {
    let selector = configured(&state, FormFactor::HostSelector)?;
    let max_position = state
        .bus
        .property(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE, PROP_MAX_POSITION)
        .and_then(|v| v.as_u64());

    Ok(Json(PositionResponse {
        position: selector.status().position,
        max_position,
    }))
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

/// Emit a simulated `Pressed` signal
pub async fn button_press(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>> {
    let model = lookup(&state, &name)?;
    model.simulate_press()?;
    info!("Simulated press on {}", name);
    Ok(Json(ActionResponse {
        success: true,
        message: format!("{} pressed", name),
    }))
}

/// Emit a simulated `PressedLong` signal (power button only)
pub async fn button_long_press(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>> {
    let model = lookup(&state, &name)?;
    model.simulate_long_press()?;
    info!("Simulated long press on {}", name);
    Ok(Json(ActionResponse {
        success: true,
        message: format!("{} long pressed", name),
    }))
}

fn lookup<'a>(state: &'a AppState, name: &str) -> Result<&'a Arc<ButtonModel>> {
    let form_factor = FormFactor::from_slug(name)
        .ok_or_else(|| AppError::NotFound(format!("unknown button '{}'", name)))?;
    configured(state, form_factor)
}

fn configured(state: &AppState, form_factor: FormFactor) -> Result<&Arc<ButtonModel>> {
    state.buttons.model(form_factor).ok_or_else(|| {
        AppError::NotFound(format!("{} is not configured", form_factor.config_name()))
    })
}
