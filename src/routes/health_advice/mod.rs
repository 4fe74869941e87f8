mod handler;
mod model;

pub use handler::health_advice;
pub use model::{HealthAdviceRequest, HealthAdviceResponse};
