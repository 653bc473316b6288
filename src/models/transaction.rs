use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::serde_utils::{
    deserialize_cents, deserialize_opaque_id, deserialize_text_or_empty, serialize_cents,
};
use crate::services::aggregation::format_cents;

/// Direction of a transaction. The stored amount is always a magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Expense => "Expense",
            Self::Income => "Income",
        }
    }

    /// +1 for income, -1 for expense.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Expense => -1,
            Self::Income => 1,
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(format!("Unknown transaction type: {other}")),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `Transactions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(deserialize_with = "deserialize_opaque_id")]
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(
        rename = "amount",
        deserialize_with = "deserialize_cents",
        serialize_with = "serialize_cents"
    )]
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_text_or_empty")]
    pub notes: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }

    /// Amount with the direction applied: positive for income, negative for expenses.
    pub fn signed_cents(&self) -> i64 {
        self.kind.sign().saturating_mul(self.amount_cents)
    }

    pub fn amount_display(&self) -> String {
        format_cents(self.amount_cents)
    }

    /// `+$12.00` / `-$12.00`
    pub fn signed_display(&self) -> String {
        let sign = if self.is_income() { "+" } else { "-" };
        format!("{}${}", sign, format_cents(self.amount_cents))
    }

    pub fn date_display(&self) -> String {
        self.date.format("%b %-d, %Y").to_string()
    }

    pub fn category_initial(&self) -> char {
        self.category.chars().next().unwrap_or('?')
    }
}

/// Insert payload for the `Transactions` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub title: String,
    pub category: String,
    #[serde(rename = "amount", serialize_with = "serialize_cents")]
    pub amount_cents: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub notes: String,
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_row() {
        let json = r#"{
            "id": 17,
            "title": "Weekly shop",
            "category": "Groceries",
            "amount": 54.2,
            "type": "expense",
            "date": "2024-01-01",
            "notes": null,
            "user_id": "u-1",
            "created_at": "2024-01-01T10:00:00+00:00"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.id, "17");
        assert_eq!(tx.amount_cents, 5420);
        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.notes, "");
        assert_eq!(tx.signed_cents(), -5420);
        assert_eq!(tx.signed_display(), "-$54.20");
    }

    #[test]
    fn partial_select_is_accepted() {
        let json = r#"{"id":"a","title":"Pay","category":"Salary","amount":2000,"type":"income","date":"2024-01-02"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.is_income());
        assert_eq!(tx.user_id, "");
        assert_eq!(tx.created_at, None);
    }

    #[test]
    fn insert_payload_uses_column_names() {
        let new = NewTransaction {
            user_id: "u-1".into(),
            title: "Coffee".into(),
            category: "Dining Out".into(),
            amount_cents: 350,
            kind: TransactionKind::Expense,
            notes: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let json = serde_json::to_value(&new).unwrap();
        assert_eq!(json["amount"], serde_json::json!(3.5));
        assert_eq!(json["type"], "expense");
        assert_eq!(json["date"], "2024-03-01");
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Income".parse::<TransactionKind>(), Ok(TransactionKind::Income));
        assert!("transfer".parse::<TransactionKind>().is_err());
    }
}
