//! HTTP handlers.
//!
//! - [`add`]: `POST /add`
//! - [`health`]: `GET /health` and `GET /ready`

pub mod add;
pub mod health;
