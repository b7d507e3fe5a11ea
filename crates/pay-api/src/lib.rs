//! # pay-api
//!
//! HTTP API layer for mpesa-relay.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - STK push submission endpoint and collaborator pay form
//! - Callback endpoint for payment results
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/pay` | HTML pay form |
//! | POST | `/api/pay` | Submit STK push |
//! | POST | `/callback` | Payment-result callback |

pub mod handlers;
pub mod logging;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
