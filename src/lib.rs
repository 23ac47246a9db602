//! License Panel
//!
//! User accounts with per-user service flags, a dashboard gated by those
//! flags, and management plus verification of license keys.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod licensing;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod services;

pub use context::AppContext;
pub use error::{PanelError, PanelResult};
