/// API routes and handlers
pub mod admin;
pub mod dashboard;
pub mod health;
pub mod licensing;
pub mod login;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(login::routes())
        .merge(dashboard::routes())
        .merge(licensing::routes())
        .merge(admin::routes())
}
