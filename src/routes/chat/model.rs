use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 单条消息最大长度（字符）
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// 拼入提示词的历史消息条数上限
const MAX_HISTORY_TURNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(AppError::InvalidRequest("Message must not be empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::InvalidRequest(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(())
    }

    /// 只保留最近的历史记录
    pub fn to_prompt(&self) -> String {
        let skip = self.history.len().saturating_sub(MAX_HISTORY_TURNS);
        let mut prompt = String::new();
        for turn in self.history.iter().skip(skip) {
            let speaker = match turn.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.content.trim()));
        }
        prompt.push_str(&format!("User: {}", self.message.trim()));
        prompt
    }
}
