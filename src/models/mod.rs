pub mod budget;
pub mod session;
pub mod theme;
pub mod transaction;

pub use budget::{Budget, BudgetAmountPatch, NewBudget};
pub use session::{resolve_display_name, Identity, Profile, Session, User, UserMetadata};
pub use theme::Theme;
pub use transaction::{NewTransaction, Transaction, TransactionKind};
