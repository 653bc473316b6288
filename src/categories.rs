//! The fixed list of spending categories offered by the entry forms.

/// Registered category labels, in the order they are offered for selection.
pub const CATEGORIES: &[&str] = &[
    "Groceries",
    "Transportation",
    "Entertainment",
    "Utilities",
    "Healthcare",
    "Shopping",
    "Dining Out",
    "Savings",
    "Housing",
    "Salary",
    "Other",
];

pub fn all() -> &'static [&'static str] {
    CATEGORIES
}

/// Whether `label` is one of the registered categories (exact match).
pub fn is_registered(label: &str) -> bool {
    CATEGORIES.contains(&label)
}

/// Default selection for the budget form.
pub fn first() -> &'static str {
    CATEGORIES[0]
}
