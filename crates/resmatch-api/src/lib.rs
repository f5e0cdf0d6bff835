//! resmatch API crate - axum HTTP server and route handlers.
//!
//! Exposes the matching service over REST: health, text embedding, matching
//! by precomputed embedding or by job description text, and resume upload.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
