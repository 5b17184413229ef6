//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, one hub per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Rate limiting (governor, installed by the binary)
//!
//! Identity is resolved per handler by the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{OptionalUser, RequireAdmin, RequireUser};
pub use rate_limit::{api_rate_limiter, webhook_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
