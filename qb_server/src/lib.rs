//! QuizBanner HTTP server.
//!
//! Exposes the [`quiz_banner`] services as a JSON REST API and runs the daily
//! subscription sweep next to it.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
