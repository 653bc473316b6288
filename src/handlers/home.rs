use askama::Template;
use axum::extract::State;
use axum::response::Html;
use axum::Extension;

use crate::error::{AppResult, RenderHtml};
use crate::handlers::PageLayout;
use crate::models::{Identity, Theme, Transaction};
use crate::services::aggregation::{Highlights, Summary};
use crate::state::AppState;

const RECENT_TRANSACTIONS: usize = 12;
const RECENT_BUDGETS: usize = 6;
const RECENT_ROWS: usize = 4;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub layout: PageLayout,
    pub summary: Summary,
    pub highlights: Highlights,
    pub recent: Vec<Transaction>,
}

pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    theme: Theme,
) -> AppResult<Html<String>> {
    let ledger = state
        .cache
        .load_or_fetch(state.data.as_ref(), &identity)
        .await;
    let transactions = ledger.recent_transactions(RECENT_TRANSACTIONS);
    let budgets = ledger.recent_budgets(RECENT_BUDGETS);
    let owner = &identity.user_id;

    let summary = state.cache.memoize(owner, &ledger, "home:summary", || {
        Summary::from_transactions(transactions)
    });
    let highlights = state.cache.memoize(owner, &ledger, "home:highlights", || {
        Highlights::derive(budgets, transactions)
    });

    HomeTemplate {
        layout: PageLayout::new("Home", "/", theme, &identity),
        summary,
        highlights,
        recent: transactions.iter().take(RECENT_ROWS).cloned().collect(),
    }
    .render_html()
}
