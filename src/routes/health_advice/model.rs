use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_FIELD_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct HealthAdviceRequest {
    pub destination: String,
    #[serde(default)]
    pub concerns: Option<String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthAdviceResponse {
    pub advice: String,
}

impl HealthAdviceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.destination.trim().is_empty() {
            return Err(AppError::InvalidRequest("Destination must not be empty".into()));
        }
        let too_long = self.destination.chars().count() > MAX_FIELD_CHARS
            || self
                .concerns
                .as_deref()
                .is_some_and(|c| c.chars().count() > MAX_FIELD_CHARS);
        if too_long {
            return Err(AppError::InvalidRequest(format!(
                "Fields must be at most {} characters",
                MAX_FIELD_CHARS
            )));
        }
        Ok(())
    }

    pub fn to_prompt(&self) -> String {
        let mut prompt = format!("I am travelling to {}.", self.destination.trim());
        if let Some(days) = self.duration_days {
            prompt.push_str(&format!(" The trip lasts {} days.", days));
        }
        if let Some(concerns) = self.concerns.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str(&format!(" My health concerns: {}.", concerns));
        }
        prompt.push_str(" What health precautions should I take?");
        prompt
    }
}
