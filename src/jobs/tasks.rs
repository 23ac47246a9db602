/// Background task implementations
use crate::{context::AppContext, db, error::PanelResult};

/// Cleanup expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> PanelResult<u64> {
    ctx.account_manager.cleanup_expired_sessions().await
}

/// Health check - verify the database answers; returns the live session count
pub async fn health_check(ctx: &AppContext) -> PanelResult<i64> {
    db::test_connection(&ctx.db).await?;
    ctx.account_manager.count_active_sessions().await
}
