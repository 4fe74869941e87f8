use axum::extract::{Json, State};

use super::model::{HealthAdviceRequest, HealthAdviceResponse};
use crate::{AppState, error::AppError};

pub const HEALTH_ADVICE_SYSTEM_PROMPT: &str = "You give general travel health guidance: vaccinations, \
food and water safety, insect protection, altitude and climate risks. \
You are not a doctor; always recommend consulting a medical professional before travel.";

const HEALTH_ADVICE_MAX_TOKENS: u32 = 800;

#[axum::debug_handler]
pub async fn health_advice(
    State(state): State<AppState>,
    Json(req): Json<HealthAdviceRequest>,
) -> Result<Json<HealthAdviceResponse>, AppError> {
    req.validate()?;

    let advice = state
        .generator
        .generate(
            &req.to_prompt(),
            HEALTH_ADVICE_SYSTEM_PROMPT,
            HEALTH_ADVICE_MAX_TOKENS,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to generate health advice: {}", e);
            AppError::GenerationFailed
        })?;

    Ok(Json(HealthAdviceResponse { advice }))
}
