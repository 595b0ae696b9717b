mod auth;
mod availability;
mod error_handler;
mod rate_limit;

pub use auth::auth_middleware;
pub use availability::require_datastore;
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, rate_limit};
