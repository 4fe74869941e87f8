mod handler;
mod model;

pub use handler::chat;
pub use model::{ChatRequest, ChatResponse, ChatRole, ChatTurn};
