/// Dashboard views
///
/// Each view returns the data a dashboard page is built from.
use crate::{
    account::UserInfo,
    auth::{AuthContext, ServiceAuth},
    context::AppContext,
    db::license::{License, LicenseWithOwner},
    error::PanelResult,
    licensing::{LicenseFilter, StatusFilter},
    services::{LicenseService, ServiceFlags, WhatsappService},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/dashboard/", get(index))
        .route("/dashboard/licensing/", get(licensing))
        .route("/dashboard/assistant/", get(assistant))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardView {
    pub user: UserInfo,
    pub services: ServiceFlags,
    pub licenses: Vec<License>,
    pub active_licenses: Vec<License>,
}

async fn index(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PanelResult<Json<DashboardView>> {
    let licenses = ctx.license_manager.list_for_owner(auth.user.id, false).await?;
    let active_licenses = licenses.iter().filter(|l| l.is_active).cloned().collect();

    Ok(Json(DashboardView {
        user: UserInfo::from(&auth.user),
        services: ServiceFlags::from(&auth.user),
        licenses,
        active_licenses,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LicensingQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LicensingView {
    pub licenses: Vec<LicenseWithOwner>,
    pub total_licenses_count: i64,
    pub active_licenses_count: i64,
    pub inactive_licenses_count: i64,
    pub assigned_licenses_count: i64,
    pub users: Vec<UserInfo>,
    pub search_query: String,
    pub status_filter: String,
}

/// Every license in the system, filtered; counts always cover everything
async fn licensing(
    State(ctx): State<AppContext>,
    _auth: ServiceAuth<LicenseService>,
    Query(query): Query<LicensingQuery>,
) -> PanelResult<Json<LicensingView>> {
    let filter = LicenseFilter {
        search: Some(query.search.clone()).filter(|s| !s.trim().is_empty()),
        status: StatusFilter::parse(&query.status),
    };

    let licenses = ctx.license_manager.list(&filter).await?;
    let stats = ctx.license_manager.stats().await?;
    let users = ctx
        .account_manager
        .list_users(true)
        .await?
        .iter()
        .map(UserInfo::from)
        .collect();

    Ok(Json(LicensingView {
        licenses,
        total_licenses_count: stats.total,
        active_licenses_count: stats.active,
        inactive_licenses_count: stats.inactive,
        assigned_licenses_count: stats.assigned,
        users,
        search_query: query.search,
        status_filter: query.status,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantView {
    pub user: UserInfo,
}

async fn assistant(auth: ServiceAuth<WhatsappService>) -> Json<AssistantView> {
    Json(AssistantView {
        user: UserInfo::from(&auth.user),
    })
}
