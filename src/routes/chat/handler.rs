use axum::extract::{Json, State};

use super::model::{ChatRequest, ChatResponse};
use crate::{AppState, error::AppError};

pub const CHAT_SYSTEM_PROMPT: &str = "You are a friendly travel assistant for a site of country guides. \
Answer questions about destinations, visas, costs, culture and practical travel tips concisely. \
If you are unsure, say so and suggest checking official sources.";

const CHAT_MAX_TOKENS: u32 = 1024;

#[axum::debug_handler]
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    req.validate()?;

    let reply = state
        .generator
        .generate(&req.to_prompt(), CHAT_SYSTEM_PROMPT, CHAT_MAX_TOKENS)
        .await
        .map_err(|e| {
            tracing::error!("Failed to generate chat reply: {}", e);
            AppError::GenerationFailed
        })?;

    Ok(Json(ChatResponse { reply }))
}
