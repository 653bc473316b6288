//! Submission of the entry forms.
//!
//! Each operation validates first, then makes exactly one backend call, and
//! only after that call succeeds mirrors the change into the view cache. A
//! rejected form or a failed call leaves cached state untouched.

use tracing::{error, info, warn};

use crate::cache::ViewCache;
use crate::error::{AppError, AppResult};
use crate::forms::{BudgetAmountForm, BudgetForm, TransactionForm};
use crate::gateway::DataGateway;
use crate::models::{Budget, Identity, Transaction};

fn log_rejected(what: &str, err: &AppError) {
    match err {
        AppError::Validation(msg) => warn!("Rejected {}: {}", what, msg),
        other => error!("Failed to save {}: {}", what, other),
    }
}

pub async fn submit_transaction(
    data: &dyn DataGateway,
    cache: &ViewCache,
    identity: &Identity,
    form: &TransactionForm,
) -> AppResult<Transaction> {
    let new = form
        .validate(&identity.user_id)
        .inspect_err(|e| log_rejected("transaction", e))?;
    let row = data
        .insert_transaction(identity, &new)
        .await
        .inspect_err(|e| log_rejected("transaction", e))?;
    info!(id = %row.id, kind = %row.kind, "Transaction added");
    cache.insert_transaction(&identity.user_id, row.clone());
    Ok(row)
}

pub async fn submit_budget(
    data: &dyn DataGateway,
    cache: &ViewCache,
    identity: &Identity,
    form: &BudgetForm,
) -> AppResult<Budget> {
    let new = form
        .validate(&identity.user_id)
        .inspect_err(|e| log_rejected("budget", e))?;
    let row = data
        .insert_budget(identity, &new)
        .await
        .inspect_err(|e| log_rejected("budget", e))?;
    info!(id = %row.id, category = %row.category, "Budget added");
    cache.prepend_budget(&identity.user_id, row.clone());
    Ok(row)
}

/// Returns the saved limit in cents.
pub async fn save_budget_amount(
    data: &dyn DataGateway,
    cache: &ViewCache,
    identity: &Identity,
    id: &str,
    form: &BudgetAmountForm,
) -> AppResult<i64> {
    let limit_cents = form
        .validate()
        .inspect_err(|e| log_rejected("budget amount", e))?;
    data.update_budget_amount(identity, id, limit_cents)
        .await
        .inspect_err(|e| log_rejected("budget amount", e))?;
    info!(id, limit_cents, "Budget amount updated");
    cache.set_budget_amount(&identity.user_id, id, limit_cents);
    Ok(limit_cents)
}

pub async fn remove_budget(
    data: &dyn DataGateway,
    cache: &ViewCache,
    identity: &Identity,
    id: &str,
) -> AppResult<()> {
    data.delete_budget(identity, id)
        .await
        .inspect_err(|e| log_rejected("budget deletion", e))?;
    info!(id, "Budget deleted");
    cache.remove_budget(&identity.user_id, id);
    Ok(())
}
