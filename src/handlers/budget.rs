use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Redirect};
use axum::{Extension, Form};
use serde::Deserialize;
use tracing::error;

use crate::categories;
use crate::error::{AppError, AppResult, RenderHtml};
use crate::forms::{BudgetAmountForm, BudgetForm};
use crate::handlers::transactions::SelectOption;
use crate::handlers::PageLayout;
use crate::models::{Budget, Identity, Theme};
use crate::services::aggregation::BudgetOverview;
use crate::services::entry;
use crate::state::AppState;

const BUDGET_PATH: &str = "/budget";

#[derive(Debug, Default, Deserialize)]
pub struct BudgetQuery {
    pub error: Option<String>,
}

/// The row currently being edited and the text in its amount field.
pub struct EditState {
    pub id: String,
    pub amount: String,
}

pub struct BudgetRow {
    pub budget: Budget,
    pub editing: bool,
}

#[derive(Template)]
#[template(path = "pages/budget.html")]
pub struct BudgetTemplate {
    pub layout: PageLayout,
    pub budgets: Vec<BudgetRow>,
    pub overview: BudgetOverview,
    pub categories: Vec<SelectOption>,
    pub edit_amount: String,
    pub error: Option<String>,
}

/// `/budget?error=...`, or plain `/budget` if the message cannot be encoded.
fn back_with_error(err: &AppError) -> Redirect {
    match serde_urlencoded::to_string([("error", err.user_message())]) {
        Ok(query) => Redirect::to(&format!("{}?{}", BUDGET_PATH, query)),
        Err(e) => {
            error!("Could not encode budget error message: {}", e);
            Redirect::to(BUDGET_PATH)
        }
    }
}

async fn render(
    state: &AppState,
    identity: &Identity,
    theme: Theme,
    editing: Option<EditState>,
    error: Option<String>,
) -> AppResult<Html<String>> {
    let ledger = state
        .cache
        .load_or_fetch(state.data.as_ref(), identity)
        .await;
    let overview = state
        .cache
        .memoize(&identity.user_id, &ledger, "budget:overview", || {
            BudgetOverview::from_budgets(&ledger.budgets)
        });

    let budgets = ledger
        .budgets
        .iter()
        .map(|b| BudgetRow {
            editing: editing.as_ref().is_some_and(|e| e.id == b.id),
            budget: b.clone(),
        })
        .collect();

    BudgetTemplate {
        layout: PageLayout::new("Budget", BUDGET_PATH, theme, identity),
        budgets,
        overview,
        categories: categories::all()
            .iter()
            .enumerate()
            .map(|(i, &c)| SelectOption {
                value: c.to_string(),
                label: c.to_string(),
                selected: i == 0,
            })
            .collect(),
        edit_amount: editing.map(|e| e.amount).unwrap_or_default(),
        error,
    }
    .render_html()
}

pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    theme: Theme,
    Query(query): Query<BudgetQuery>,
) -> AppResult<Html<String>> {
    render(&state, &identity, theme, None, query.error).await
}

/// The budget page with one row's amount field open for editing,
/// prefilled with its current limit.
pub async fn edit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    theme: Theme,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let ledger = state
        .cache
        .load_or_fetch(state.data.as_ref(), &identity)
        .await;
    let budget = ledger
        .budgets
        .iter()
        .find(|b| b.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Budget {} not found", id)))?;

    let editing = EditState {
        id: budget.id.clone(),
        amount: budget.limit_edit_text(),
    };
    render(&state, &identity, theme, Some(editing), None).await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<BudgetForm>,
) -> Redirect {
    match entry::submit_budget(state.data.as_ref(), &state.cache, &identity, &form).await {
        Ok(_) => Redirect::to(BUDGET_PATH),
        Err(e) => back_with_error(&e),
    }
}

pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Form(form): Form<BudgetAmountForm>,
) -> Redirect {
    match entry::save_budget_amount(state.data.as_ref(), &state.cache, &identity, &id, &form)
        .await
    {
        Ok(_) => Redirect::to(BUDGET_PATH),
        Err(e) => back_with_error(&e),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Redirect {
    match entry::remove_budget(state.data.as_ref(), &state.cache, &identity, &id).await {
        Ok(()) => Redirect::to(BUDGET_PATH),
        Err(e) => back_with_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn error_redirect_encodes_message() {
        let response =
            back_with_error(&AppError::Validation("Amount must be a number".into())).into_response();
        assert_eq!(
            response.headers()["location"],
            "/budget?error=Amount+must+be+a+number"
        );
    }
}
