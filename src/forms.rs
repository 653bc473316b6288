//! Form payloads posted by the entry pages, and their validation.
//!
//! Validation runs before any backend call; a rejected form never reaches
//! the gateway.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::categories;
use crate::error::{AppError, AppResult};
use crate::models::{NewBudget, NewTransaction, TransactionKind};
use crate::serde_utils::cents_from_decimal;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const AMOUNT_TOO_LARGE: &str = "Amount is too large";

/// Parse a user-entered amount into cents. The value must be a finite
/// number no larger in magnitude than
/// [`MAX_AMOUNT_CENTS`](crate::serde_utils::MAX_AMOUNT_CENTS).
pub fn parse_amount(raw: &str) -> AppResult<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Amount is required".into()));
    }
    let value = trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::Validation("Amount must be a number".into()))?;
    cents_from_decimal(value).ok_or_else(|| AppError::Validation(AMOUNT_TOO_LARGE.into()))
}

fn require_category(raw: &str) -> AppResult<String> {
    if categories::is_registered(raw) {
        Ok(raw.to_string())
    } else {
        Err(AppError::Validation("Choose a category from the list".into()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub notes: String,
}

impl TransactionForm {
    /// A blank form with the first category and `today` preselected.
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            category: categories::first().to_string(),
            date: today.format(DATE_FORMAT).to_string(),
            kind: TransactionKind::Expense.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self, user_id: &str) -> AppResult<NewTransaction> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".into()));
        }

        let amount_cents = parse_amount(&self.amount)?;
        if amount_cents < 0 {
            return Err(AppError::Validation("Amount must not be negative".into()));
        }

        let category = require_category(&self.category)?;

        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).map_err(|_| {
            AppError::Validation("Date must be a valid calendar date (YYYY-MM-DD)".into())
        })?;

        let kind = match self.kind.trim() {
            "" => TransactionKind::default(),
            raw => raw.parse().map_err(AppError::Validation)?,
        };

        Ok(NewTransaction {
            user_id: user_id.to_string(),
            title: title.to_string(),
            category,
            amount_cents,
            kind,
            notes: self.notes.trim().to_string(),
            date,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetForm {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount: String,
}

impl BudgetForm {
    pub fn validate(&self, user_id: &str) -> AppResult<NewBudget> {
        let budget_number = parse_amount(&self.amount)?;
        let budget_name = require_category(&self.category)?;
        Ok(NewBudget {
            budget_name,
            budget_number,
            user_id: user_id.to_string(),
        })
    }
}

/// The inline edit field on a budget row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetAmountForm {
    #[serde(default)]
    pub amount: String,
}

impl BudgetAmountForm {
    pub fn validate(&self) -> AppResult<i64> {
        parse_amount(&self.amount)
    }
}
