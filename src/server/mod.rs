//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       HTTP Layer                         │
//! │        GET /health   POST /upload   GET /render          │
//! │                                                          │
//! │  ┌──────────────────────┐   ┌─────────────────────────┐  │
//! │  │       handlers       │   │         routes          │  │
//! │  │ (requests, errors)   │   │ (router, CORS, tracing) │  │
//! │  └──────────────────────┘   └─────────────────────────┘  │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//!                        ImageService
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, render_handler, upload_handler, AppState, ErrorResponse, HealthResponse,
    RenderResponse, IMAGE_FIELD,
};
pub use routes::{create_router, RouterConfig};
