//! Process-local stand-in for the hosted backend.
//!
//! Used with `MONEYMIND_BACKEND=memory` for local development and by the
//! test suite. It keeps the same contract as the hosted service: opaque
//! tokens, owner-scoped rows, the same ordering, and provider-style error
//! messages. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{AuthGateway, BudgetQuery, DataGateway, TransactionQuery};
use crate::error::{AppError, AppResult};
use crate::models::{
    Budget, Identity, NewBudget, NewTransaction, Profile, Session, Transaction, User,
    UserMetadata,
};

const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_LIFETIME_SECS: i64 = 3600;

struct Account {
    user: User,
    password_hash: String,
}

struct Stored<T> {
    seq: u64,
    row: T,
}

#[derive(Default)]
struct State {
    /// Keyed by lowercased email.
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    transactions: Vec<Stored<Transaction>>,
    budgets: Vec<Stored<Budget>>,
    profiles: HashMap<String, Profile>,
    next_seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn user_by_id(&self, user_id: &str) -> Option<&User> {
        self.accounts
            .values()
            .map(|a| &a.user)
            .find(|u| u.id == user_id)
    }

    fn issue_session(&mut self, user: User) -> Session {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens
            .insert(access_token.clone(), user.id.clone());
        self.refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());
        Session {
            access_token,
            refresh_token,
            expires_at: Some(Utc::now().timestamp() + TOKEN_LIFETIME_SECS),
            user,
        }
    }

    /// PostgREST rejects requests whose bearer token does not belong to a live session.
    fn authorize(&self, identity: &Identity) -> AppResult<()> {
        match self.access_tokens.get(&identity.access_token) {
            Some(user_id) if *user_id == identity.user_id => Ok(()),
            _ => Err(AppError::Backend {
                status: 401,
                message: "JWT expired".into(),
            }),
        }
    }
}

pub struct InMemoryBackend {
    state: Mutex<State>,
    hasher: Argon2<'static>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    data_calls: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        // Cheap parameters: this backend never holds real credentials.
        let params = Params::new(4096, 1, 1, None).unwrap_or_default();
        Self {
            state: Mutex::new(State::default()),
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            data_calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every table read fail with a backend error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every table write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of table operations received so far.
    pub fn data_call_count(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    /// Invalidate an access token while keeping its refresh token usable.
    pub fn expire_access_token(&self, access_token: &str) {
        self.lock().access_tokens.remove(access_token);
    }

    fn begin_read(&self) -> AppResult<()> {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Backend {
                status: 503,
                message: "Service unavailable".into(),
            });
        }
        Ok(())
    }

    fn begin_write(&self) -> AppResult<()> {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Backend {
                status: 503,
                message: "Service unavailable".into(),
            });
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|e| AppError::Internal(format!("Salt error: {}", e)))?;
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            tracing::error!("Invalid password hash format in memory backend");
            return false;
        };
        self.hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn get_user(&self, access_token: &str) -> AppResult<Option<User>> {
        let state = self.lock();
        Ok(state
            .access_tokens
            .get(access_token)
            .and_then(|user_id| state.user_by_id(user_id))
            .cloned())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        let key = email.trim().to_lowercase();
        let user = {
            let state = self.lock();
            match state.accounts.get(&key) {
                Some(account) if self.verify_password(password, &account.password_hash) => {
                    account.user.clone()
                }
                _ => return Err(AppError::Auth("Invalid login credentials".into())),
            }
        };
        Ok(self.lock().issue_session(user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User> {
        let key = email.trim().to_lowercase();
        if key.is_empty() || !key.contains('@') {
            return Err(AppError::Auth(
                "Unable to validate email address: invalid format".into(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth(format!(
                "Password should be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }
        if self.lock().accounts.contains_key(&key) {
            return Err(AppError::Auth("User already registered".into()));
        }

        let password_hash = self.hash_password(password)?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(key.clone()),
            user_metadata: metadata,
        };

        let mut state = self.lock();
        if state.accounts.contains_key(&key) {
            return Err(AppError::Auth("User already registered".into()));
        }
        state.accounts.insert(
            key,
            Account {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session> {
        let mut state = self.lock();
        let user = state
            .refresh_tokens
            .remove(refresh_token)
            .and_then(|user_id| state.user_by_id(&user_id).cloned())
            .ok_or_else(|| AppError::Auth("Invalid Refresh Token: Refresh Token Not Found".into()))?;
        Ok(state.issue_session(user))
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let mut state = self.lock();
        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.access_tokens.retain(|_, owner| *owner != user_id);
            state.refresh_tokens.retain(|_, owner| *owner != user_id);
        }
        Ok(())
    }
}

#[async_trait]
impl DataGateway for InMemoryBackend {
    async fn list_transactions(
        &self,
        identity: &Identity,
        query: TransactionQuery,
    ) -> AppResult<Vec<Transaction>> {
        self.begin_read()?;
        let state = self.lock();
        state.authorize(identity)?;

        let mut rows: Vec<&Stored<Transaction>> = state
            .transactions
            .iter()
            .filter(|s| s.row.user_id == identity.user_id)
            .collect();
        rows.sort_by(|a, b| b.row.date.cmp(&a.row.date).then(b.seq.cmp(&a.seq)));

        Ok(rows
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|s| s.row.clone())
            .collect())
    }

    async fn insert_transaction(
        &self,
        identity: &Identity,
        new: &NewTransaction,
    ) -> AppResult<Transaction> {
        self.begin_write()?;
        let mut state = self.lock();
        state.authorize(identity)?;
        if new.user_id != identity.user_id {
            return Err(AppError::Backend {
                status: 403,
                message: "new row violates row-level security policy for table \"Transactions\""
                    .into(),
            });
        }

        let row = Transaction {
            id: Uuid::new_v4().to_string(),
            title: new.title.clone(),
            category: new.category.clone(),
            amount_cents: new.amount_cents,
            kind: new.kind,
            date: new.date,
            notes: new.notes.clone(),
            user_id: new.user_id.clone(),
            created_at: Some(Utc::now().to_rfc3339()),
        };
        let seq = state.next_seq();
        state.transactions.push(Stored {
            seq,
            row: row.clone(),
        });
        Ok(row)
    }

    async fn list_budgets(
        &self,
        identity: &Identity,
        query: BudgetQuery,
    ) -> AppResult<Vec<Budget>> {
        self.begin_read()?;
        let state = self.lock();
        state.authorize(identity)?;

        let mut rows: Vec<&Stored<Budget>> = state
            .budgets
            .iter()
            .filter(|s| s.row.user_id == identity.user_id)
            .collect();
        rows.sort_by(|a, b| b.seq.cmp(&a.seq));

        Ok(rows
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|s| s.row.clone())
            .collect())
    }

    async fn insert_budget(&self, identity: &Identity, new: &NewBudget) -> AppResult<Budget> {
        self.begin_write()?;
        let mut state = self.lock();
        state.authorize(identity)?;
        if new.user_id != identity.user_id {
            return Err(AppError::Backend {
                status: 403,
                message: "new row violates row-level security policy for table \"Budgets\""
                    .into(),
            });
        }

        let row = Budget {
            id: Uuid::new_v4().to_string(),
            category: new.budget_name.clone(),
            limit_cents: new.budget_number,
            user_id: new.user_id.clone(),
            created_at: Some(Utc::now().to_rfc3339()),
        };
        let seq = state.next_seq();
        state.budgets.push(Stored {
            seq,
            row: row.clone(),
        });
        Ok(row)
    }

    async fn update_budget_amount(
        &self,
        identity: &Identity,
        id: &str,
        limit_cents: i64,
    ) -> AppResult<()> {
        self.begin_write()?;
        let mut state = self.lock();
        state.authorize(identity)?;
        state
            .budgets
            .iter_mut()
            .filter(|s| s.row.id == id && s.row.user_id == identity.user_id)
            .for_each(|s| s.row.limit_cents = limit_cents);
        Ok(())
    }

    async fn delete_budget(&self, identity: &Identity, id: &str) -> AppResult<()> {
        self.begin_write()?;
        let mut state = self.lock();
        state.authorize(identity)?;
        state
            .budgets
            .retain(|s| !(s.row.id == id && s.row.user_id == identity.user_id));
        Ok(())
    }

    async fn get_profile(&self, identity: &Identity) -> AppResult<Option<Profile>> {
        self.begin_read()?;
        let state = self.lock();
        state.authorize(identity)?;
        Ok(state.profiles.get(&identity.user_id).cloned())
    }

    async fn upsert_profile(&self, identity: &Identity, profile: &Profile) -> AppResult<()> {
        self.begin_write()?;
        let mut state = self.lock();
        state.authorize(identity)?;
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}
