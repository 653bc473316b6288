use askama::Template;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::Extension;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::cache::Ledger;
use crate::error::{AppResult, RenderHtml};
use crate::handlers::{today, PageLayout};
use crate::models::{Identity, Theme, Transaction};
use crate::services::aggregation::{
    budget_progress, chart_domain, format_money, net_flow_series, BudgetProgress, SeriesPoint,
    Summary, Window,
};
use crate::state::AppState;

pub const DASHBOARD_TRANSACTIONS: usize = 500;
pub const DASHBOARD_BUDGETS: usize = 6;
const RECENT_ROWS: usize = 5;

const CHART_WIDTH: f64 = 600.0;
const CHART_HEIGHT: f64 = 200.0;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

impl DashboardQuery {
    /// Unknown or missing periods fall back to the 30 day window.
    pub fn window(&self) -> Window {
        self.period
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }
}

pub struct WindowOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Net-flow line chart, pre-scaled into SVG coordinates.
pub struct ChartView {
    pub width: f64,
    pub height: f64,
    pub polyline: String,
    pub zero_y: String,
    pub max_label: String,
    pub min_label: String,
    pub first_label: String,
    pub last_label: String,
}

impl ChartView {
    pub fn from_points(points: &[SeriesPoint]) -> Self {
        let (min, max) = chart_domain(points);
        let span = (max as f64 - min as f64).max(1.0);
        let step = if points.len() > 1 {
            CHART_WIDTH / (points.len() - 1) as f64
        } else {
            0.0
        };
        let y_for = |value: i64| CHART_HEIGHT - ((value as f64 - min as f64) / span) * CHART_HEIGHT;

        let polyline = points
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:.1},{:.1}", i as f64 * step, y_for(p.value_cents)))
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
            polyline,
            zero_y: format!("{:.1}", y_for(0)),
            max_label: format_money(max),
            min_label: format_money(min),
            first_label: points.first().map(|p| p.label.clone()).unwrap_or_default(),
            last_label: points.last().map(|p| p.label.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
pub struct DashboardTemplate {
    pub layout: PageLayout,
    pub summary: Summary,
    pub window_label: &'static str,
    pub windows: Vec<WindowOption>,
    pub chart: ChartView,
    pub budgets: Vec<BudgetProgress>,
    pub recent: Vec<Transaction>,
}

/// Net-flow points for the dashboard slice of `ledger`, memoized per window and day.
pub fn dashboard_series(
    state: &AppState,
    owner: &str,
    ledger: &Ledger,
    window: Window,
    today: NaiveDate,
) -> Vec<SeriesPoint> {
    let key = format!("dashboard:series:{}:{}", window.as_str(), today);
    state.cache.memoize(owner, ledger, &key, || {
        net_flow_series(
            ledger.recent_transactions(DASHBOARD_TRANSACTIONS),
            window,
            today,
        )
    })
}

pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    theme: Theme,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Html<String>> {
    let window = query.window();
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
    let progress = state.cache.memoize(owner, &ledger, "dashboard:budgets", || {
        budget_progress(budgets, transactions)
    });
    let points = dashboard_series(&state, owner, &ledger, window, today());

    let windows = Window::all()
        .iter()
        .map(|w| WindowOption {
            value: w.as_str(),
            label: w.label(),
            selected: *w == window,
        })
        .collect();

    DashboardTemplate {
        layout: PageLayout::new("Dashboard", "/dashboard", theme, &identity),
        summary,
        window_label: window.label(),
        windows,
        chart: ChartView::from_points(&points),
        budgets: progress,
        recent: transactions.iter().take(RECENT_ROWS).cloned().collect(),
    }
    .render_html()
}
