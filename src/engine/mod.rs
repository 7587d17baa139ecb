//! # engine
//!
//! The live market-data pipeline.
//!
//! ```text
//!  /api/live ──▶ connector ──┐                      ┌──▶ analytics (charts)
//!                            ├─▶ controller ──▶ buffer
//!  generator ──▶ polling ────┘                      ▲
//!                                                   │
//!  /api/stocks ──────────────────────▶ loader ──────┘
//! ```
//!
//! Every inbound payload passes through the `validator` before it becomes a
//! [`Tick`](crate::models::Tick).

pub mod analytics;
pub mod buffer;
pub mod connector;
pub mod controller;
pub mod loader;
pub mod machine;
pub mod polling;
pub mod sse;
pub mod synthetic;
pub mod validator;
