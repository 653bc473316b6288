//! Access to the hosted backend: authentication and the two owner-scoped
//! tables. Every data call takes the caller's [`Identity`] explicitly.

pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Budget, Identity, NewBudget, NewTransaction, Profile, Session, Transaction, User,
    UserMetadata,
};

pub type AuthGatewayRef = Arc<dyn AuthGateway>;
pub type DataGatewayRef = Arc<dyn DataGateway>;

/// Read options for the transactions table. Rows always come back filtered
/// to the caller and ordered by date, newest first, then by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub limit: Option<usize>,
}

/// Read options for the budgets table. Rows come back newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetQuery {
    pub limit: Option<usize>,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// The user owning `access_token`, or `None` when the token is unknown or expired.
    async fn get_user(&self, access_token: &str) -> AppResult<Option<User>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session>;

    async fn sign_up(&self, email: &str, password: &str, metadata: UserMetadata)
        -> AppResult<User>;

    async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session>;

    async fn sign_out(&self, access_token: &str) -> AppResult<()>;
}

#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn list_transactions(
        &self,
        identity: &Identity,
        query: TransactionQuery,
    ) -> AppResult<Vec<Transaction>>;

    /// Inserts one row and returns it as stored, with the server-assigned id.
    async fn insert_transaction(
        &self,
        identity: &Identity,
        new: &NewTransaction,
    ) -> AppResult<Transaction>;

    async fn list_budgets(&self, identity: &Identity, query: BudgetQuery)
        -> AppResult<Vec<Budget>>;

    async fn insert_budget(&self, identity: &Identity, new: &NewBudget) -> AppResult<Budget>;

    async fn update_budget_amount(
        &self,
        identity: &Identity,
        id: &str,
        limit_cents: i64,
    ) -> AppResult<()>;

    async fn delete_budget(&self, identity: &Identity, id: &str) -> AppResult<()>;

    async fn get_profile(&self, identity: &Identity) -> AppResult<Option<Profile>>;

    async fn upsert_profile(&self, identity: &Identity, profile: &Profile) -> AppResult<()>;
}
