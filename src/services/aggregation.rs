//! Figures derived from the raw transaction and budget lists.
//!
//! Everything here is a pure function of its inputs: no I/O, no clock reads
//! (callers pass `today`), and inputs are only borrowed. The view cache
//! memoizes the results per list version.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::{Budget, Transaction};

/// Totals shown on the stat cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub income_cents: i64,
    pub expenses_cents: i64,
    pub balance_cents: i64,
    pub savings_cents: i64,
}

impl Summary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let income_cents = sum_cents(
            transactions
                .iter()
                .filter(|tx| tx.is_income())
                .map(|tx| tx.amount_cents),
        );
        let expenses_cents = total_expenses(transactions);
        let balance_cents = income_cents.saturating_sub(expenses_cents);

        Self {
            income_cents,
            expenses_cents,
            balance_cents,
            savings_cents: balance_cents.max(0),
        }
    }

    pub fn balance_is_positive(&self) -> bool {
        self.balance_cents >= 0
    }

    pub fn income_display(&self) -> String {
        format_money(self.income_cents)
    }

    pub fn expenses_display(&self) -> String {
        format_money(self.expenses_cents)
    }

    pub fn balance_display(&self) -> String {
        format_money(self.balance_cents)
    }

    pub fn savings_display(&self) -> String {
        format_money(self.savings_cents)
    }
}

/// Sum that pins at the `i64` bounds instead of overflowing.
pub fn sum_cents(amounts: impl IntoIterator<Item = i64>) -> i64 {
    amounts.into_iter().fold(0, i64::saturating_add)
}

pub fn total_expenses(transactions: &[Transaction]) -> i64 {
    sum_cents(
        transactions
            .iter()
            .filter(|tx| tx.is_expense())
            .map(|tx| tx.amount_cents),
    )
}

/// Sum of expense amounts recorded under `category` (exact label match).
pub fn category_spend(transactions: &[Transaction], category: &str) -> i64 {
    sum_cents(
        transactions
            .iter()
            .filter(|tx| tx.is_expense() && tx.category == category)
            .map(|tx| tx.amount_cents),
    )
}

/// `spent / limit * 100`, or 0 when the limit is not positive.
pub fn percentage_consumed(spent_cents: i64, limit_cents: i64) -> f64 {
    if limit_cents > 0 {
        (spent_cents as f64 / limit_cents as f64) * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetProgress {
    pub id: String,
    pub category: String,
    pub limit_cents: i64,
    pub spent_cents: i64,
    /// Negative when the category is over budget.
    pub remaining_cents: i64,
    pub percentage: f64,
}

impl BudgetProgress {
    pub fn for_budget(budget: &Budget, transactions: &[Transaction]) -> Self {
        let spent_cents = category_spend(transactions, &budget.category);
        Self {
            id: budget.id.clone(),
            category: budget.category.clone(),
            limit_cents: budget.limit_cents,
            spent_cents,
            remaining_cents: budget.limit_cents.saturating_sub(spent_cents),
            percentage: percentage_consumed(spent_cents, budget.limit_cents),
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.percentage > 100.0
    }

    /// Progress bar fill, capped at 100%.
    pub fn bar_width(&self) -> String {
        format!("{:.1}", self.percentage.min(100.0))
    }

    pub fn percentage_display(&self) -> String {
        format!("{:.0}", self.percentage)
    }

    pub fn remaining_display(&self) -> String {
        format_cents(self.remaining_cents.abs())
    }

    pub fn spent_display(&self) -> String {
        format_money(self.spent_cents)
    }

    pub fn limit_display(&self) -> String {
        format_money(self.limit_cents)
    }
}

pub fn budget_progress(budgets: &[Budget], transactions: &[Transaction]) -> Vec<BudgetProgress> {
    budgets
        .iter()
        .map(|budget| BudgetProgress::for_budget(budget, transactions))
        .collect()
}

/// Trailing period covered by the dashboard chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl Window {
    pub fn days(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Week => "Last 7 days",
            Self::Month => "Last 30 days",
            Self::Quarter => "Last 3 months",
        }
    }

    pub fn all() -> &'static [Window] {
        &[Self::Week, Self::Month, Self::Quarter]
    }

    /// First day of the window ending at `today` (inclusive).
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days() - 1)
    }
}

impl FromStr for Window {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            "90d" => Ok(Self::Quarter),
            _ => Err(()),
        }
    }
}

/// One day of net flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value_cents: i64,
    pub label: String,
}

/// Per-day net flow over a window, bucketed by calendar date.
///
/// The buckets are computed once; `points()` can be called any number of
/// times and always yields one point per day, in ascending date order.
#[derive(Debug, Clone)]
pub struct NetFlowSeries {
    start: NaiveDate,
    days: i64,
    by_date: HashMap<NaiveDate, i64>,
}

impl NetFlowSeries {
    pub fn new(transactions: &[Transaction], window: Window, today: NaiveDate) -> Self {
        let start = window.start(today);
        let mut by_date: HashMap<NaiveDate, i64> = HashMap::new();

        for tx in transactions {
            if tx.date < start || tx.date > today {
                continue;
            }
            let bucket = by_date.entry(tx.date).or_insert(0);
            *bucket = bucket.saturating_add(tx.signed_cents());
        }

        Self {
            start,
            days: window.days(),
            by_date,
        }
    }

    pub fn len(&self) -> usize {
        self.days as usize
    }

    pub fn is_empty(&self) -> bool {
        self.days == 0
    }

    pub fn points(&self) -> impl Iterator<Item = SeriesPoint> + '_ {
        (0..self.days).map(move |offset| {
            let date = self.start + Duration::days(offset);
            SeriesPoint {
                date,
                value_cents: self.by_date.get(&date).copied().unwrap_or(0),
                label: date.format("%b %-d").to_string(),
            }
        })
    }
}

pub fn net_flow_series(
    transactions: &[Transaction],
    window: Window,
    today: NaiveDate,
) -> Vec<SeriesPoint> {
    NetFlowSeries::new(transactions, window, today)
        .points()
        .collect()
}

/// Vertical chart range, always including zero.
pub fn chart_domain(points: &[SeriesPoint]) -> (i64, i64) {
    points.iter().fold((0, 0), |(min, max), p| {
        (min.min(p.value_cents), max.max(p.value_cents))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_cents: i64,
}

/// Expense totals per category, in the order categories are first encountered.
pub fn expenses_by_category(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<CategoryTotal> = Vec::new();

    for tx in transactions.iter().filter(|tx| tx.is_expense()) {
        match index.get(tx.category.as_str()) {
            Some(&i) => {
                totals[i].total_cents = totals[i].total_cents.saturating_add(tx.amount_cents)
            }
            None => {
                index.insert(tx.category.as_str(), totals.len());
                totals.push(CategoryTotal {
                    category: tx.category.clone(),
                    total_cents: tx.amount_cents,
                });
            }
        }
    }

    totals
}

/// The category with the largest expense total. On a tie the category seen
/// first in `transactions` wins.
pub fn top_category(transactions: &[Transaction]) -> Option<CategoryTotal> {
    expenses_by_category(transactions)
        .into_iter()
        .fold(None, |best: Option<CategoryTotal>, candidate| match best {
            Some(b) if b.total_cents >= candidate.total_cents => Some(b),
            _ => Some(candidate),
        })
}

pub fn total_budgeted(budgets: &[Budget]) -> i64 {
    sum_cents(budgets.iter().map(|b| b.limit_cents))
}

/// Total budget limits minus total expense spend.
pub fn safe_to_spend(budgets: &[Budget], transactions: &[Transaction]) -> i64 {
    total_budgeted(budgets).saturating_sub(total_expenses(transactions))
}

/// Cards shown on the home page next to the stats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlights {
    pub safe_to_spend_cents: i64,
    pub top_category: Option<CategoryTotal>,
    pub total_budget_cents: i64,
}

impl Highlights {
    pub fn derive(budgets: &[Budget], transactions: &[Transaction]) -> Self {
        Self {
            safe_to_spend_cents: safe_to_spend(budgets, transactions),
            top_category: top_category(transactions),
            total_budget_cents: total_budgeted(budgets),
        }
    }

    pub fn safe_to_spend_display(&self) -> String {
        format_money(self.safe_to_spend_cents)
    }

    pub fn total_budget_display(&self) -> String {
        format_money(self.total_budget_cents)
    }

    pub fn top_category_label(&self) -> &str {
        self.top_category
            .as_ref()
            .map(|c| c.category.as_str())
            .unwrap_or("No data yet")
    }

    pub fn top_category_value(&self) -> String {
        self.top_category
            .as_ref()
            .map(|c| format_money(c.total_cents))
            .unwrap_or_default()
    }
}

/// Overview cards on the budget page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetOverview {
    pub total_cents: i64,
    pub count: usize,
    /// The first budget holding the maximum limit.
    pub largest: Option<(String, i64)>,
}

impl BudgetOverview {
    pub fn from_budgets(budgets: &[Budget]) -> Self {
        let largest = budgets
            .iter()
            .fold(None::<&Budget>, |best, b| match best {
                Some(prev) if b.limit_cents <= prev.limit_cents => Some(prev),
                _ => Some(b),
            })
            .map(|b| (b.category.clone(), b.limit_cents));

        Self {
            total_cents: total_budgeted(budgets),
            count: budgets.len(),
            largest,
        }
    }

    pub fn total_display(&self) -> String {
        format_money(self.total_cents)
    }

    pub fn largest_value(&self) -> String {
        format_money(self.largest.as_ref().map(|(_, c)| *c).unwrap_or(0))
    }

    pub fn largest_label(&self) -> &str {
        self.largest
            .as_ref()
            .map(|(name, _)| name.as_str())
            .unwrap_or("No budgets yet")
    }
}

pub fn format_cents(cents: i64) -> String {
    let is_negative = cents < 0;
    let abs_cents = cents.unsigned_abs();
    let dollars = abs_cents / 100;
    let remainder = abs_cents % 100;

    if is_negative {
        format!("-{}.{:02}", dollars, remainder)
    } else {
        format!("{}.{:02}", dollars, remainder)
    }
}

/// `$12.00`, `-$12.00`
pub fn format_money(cents: i64) -> String {
    if cents < 0 {
        format!("-${}", format_cents(cents).trim_start_matches('-'))
    } else {
        format!("${}", format_cents(cents))
    }
}
