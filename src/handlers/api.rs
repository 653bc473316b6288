use axum::extract::{Query, State};
use axum::response::Json;
use axum::Extension;
use serde::Serialize;

use crate::handlers::dashboard::{
    dashboard_series, DashboardQuery, DASHBOARD_BUDGETS, DASHBOARD_TRANSACTIONS,
};
use crate::handlers::today;
use crate::models::Identity;
use crate::services::aggregation::{chart_domain, Highlights, SeriesPoint, Summary, Window};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: Summary,
    pub highlights: Highlights,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub period: Window,
    pub points: Vec<SeriesPoint>,
    pub domain_min_cents: i64,
    pub domain_max_cents: i64,
}

/// Stat card figures over the same slice the dashboard shows.
pub async fn summary(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Json<SummaryResponse> {
    let ledger = state
        .cache
        .load_or_fetch(state.data.as_ref(), &identity)
        .await;
    let transactions = ledger.recent_transactions(DASHBOARD_TRANSACTIONS);
    let budgets = ledger.recent_budgets(DASHBOARD_BUDGETS);
    let owner = &identity.user_id;

    let summary = state.cache.memoize(owner, &ledger, "dashboard:summary", || {
        Summary::from_transactions(transactions)
    });
    let highlights = state.cache.memoize(owner, &ledger, "dashboard:highlights", || {
        Highlights::derive(budgets, transactions)
    });

    Json(SummaryResponse {
        summary,
        highlights,
    })
}

pub async fn dashboard_series_json(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<DashboardQuery>,
) -> Json<SeriesResponse> {
    let window = query.window();
    let ledger = state
        .cache
        .load_or_fetch(state.data.as_ref(), &identity)
        .await;
    let points = dashboard_series(&state, &identity.user_id, &ledger, window, today());
    let (domain_min_cents, domain_max_cents) = chart_domain(&points);

    Json(SeriesResponse {
        period: window,
        points,
        domain_min_cents,
        domain_max_cents,
    })
}
