mod error_handler;
pub mod rate_limit;

pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, RouteGuard, enforce};
