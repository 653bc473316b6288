use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Form};

use crate::categories;
use crate::error::{AppResult, RenderHtml};
use crate::forms::TransactionForm;
use crate::handlers::{today, PageLayout};
use crate::models::{Identity, Theme, Transaction, TransactionKind};
use crate::services::entry;
use crate::state::AppState;

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

fn category_options(selected: &str) -> Vec<SelectOption> {
    categories::all()
        .iter()
        .map(|&c| SelectOption {
            value: c.to_string(),
            label: c.to_string(),
            selected: c == selected,
        })
        .collect()
}

fn kind_options(selected: &str) -> Vec<SelectOption> {
    [TransactionKind::Expense, TransactionKind::Income]
        .iter()
        .map(|k| SelectOption {
            value: k.as_str().to_string(),
            label: k.label().to_string(),
            selected: k.as_str() == selected,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "pages/transactions.html")]
pub struct TransactionsTemplate {
    pub layout: PageLayout,
    pub transactions: Vec<Transaction>,
    pub form: TransactionForm,
    pub categories: Vec<SelectOption>,
    pub kinds: Vec<SelectOption>,
    pub error: Option<String>,
}

async fn render(
    state: &AppState,
    identity: &Identity,
    theme: Theme,
    form: TransactionForm,
    error: Option<String>,
) -> AppResult<Html<String>> {
    let ledger = state
        .cache
        .load_or_fetch(state.data.as_ref(), identity)
        .await;

    TransactionsTemplate {
        layout: PageLayout::new("Transactions", "/transactions", theme, identity),
        transactions: ledger.transactions.clone(),
        categories: category_options(&form.category),
        kinds: kind_options(&form.kind),
        form,
        error,
    }
    .render_html()
}

pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    theme: Theme,
) -> AppResult<Html<String>> {
    render(&state, &identity, theme, TransactionForm::blank(today()), None).await
}

/// Saves the transaction and returns to the list, or re-renders the form
/// with the entered values and the error.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    theme: Theme,
    Form(form): Form<TransactionForm>,
) -> AppResult<Response> {
    match entry::submit_transaction(state.data.as_ref(), &state.cache, &identity, &form).await {
        Ok(_) => Ok(Redirect::to("/transactions").into_response()),
        Err(e) => {
            let html = render(&state, &identity, theme, form, Some(e.user_message())).await?;
            Ok(html.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_mark_selection() {
        let options = category_options("Housing");
        assert_eq!(options.len(), categories::all().len());
        assert_eq!(
            options.iter().filter(|o| o.selected).map(|o| o.value.as_str()).collect::<Vec<_>>(),
            vec!["Housing"]
        );

        let kinds = kind_options("income");
        assert!(!kinds[0].selected);
        assert!(kinds[1].selected);
    }
}
