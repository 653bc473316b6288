use serde::{Deserialize, Serialize};

use crate::serde_utils::{deserialize_cents, deserialize_opaque_id, serialize_cents};
use crate::services::aggregation::format_cents;

/// A row of the `Budgets` table: a spending limit for one category label.
///
/// Nothing enforces one budget per category; duplicates are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(deserialize_with = "deserialize_opaque_id")]
    pub id: String,
    #[serde(rename = "budget_name")]
    pub category: String,
    #[serde(
        rename = "budget_number",
        deserialize_with = "deserialize_cents",
        serialize_with = "serialize_cents"
    )]
    pub limit_cents: i64,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Budget {
    pub fn limit_display(&self) -> String {
        format_cents(self.limit_cents)
    }

    /// The limit as editable text, e.g. `500` or `12.5`.
    pub fn limit_edit_text(&self) -> String {
        let sign = if self.limit_cents < 0 { "-" } else { "" };
        let abs = self.limit_cents.unsigned_abs();
        let (whole, frac) = (abs / 100, abs % 100);
        match frac {
            0 => format!("{}{}", sign, whole),
            f if f % 10 == 0 => format!("{}{}.{}", sign, whole, f / 10),
            f => format!("{}{}.{:02}", sign, whole, f),
        }
    }
}

/// Insert payload for the `Budgets` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBudget {
    pub budget_name: String,
    #[serde(serialize_with = "serialize_cents")]
    pub budget_number: i64,
    pub user_id: String,
}

/// The single-field patch applied by the budget edit flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAmountPatch {
    #[serde(serialize_with = "serialize_cents")]
    pub budget_number: i64,
}
