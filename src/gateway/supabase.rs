//! Gateway backed by a hosted Supabase project: GoTrue for authentication
//! and PostgREST for the `Transactions`, `Budgets` and `profiles` tables.
//!
//! Row-level security on the project restricts every table to the owner of
//! the bearer token; the owner filters sent here mirror that policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AuthGateway, BudgetQuery, DataGateway, TransactionQuery};
use crate::error::{AppError, AppResult};
use crate::models::{
    Budget, BudgetAmountPatch, Identity, NewBudget, NewTransaction, Profile, Session,
    Transaction, User, UserMetadata,
};

const TRANSACTIONS_TABLE: &str = "Transactions";
const BUDGETS_TABLE: &str = "Budgets";
const PROFILES_TABLE: &str = "profiles";

const TRANSACTION_COLUMNS: &str = "id,title,category,amount,type,date,notes,user_id,created_at";
const BUDGET_COLUMNS: &str = "id,budget_name,budget_number,user_id,created_at";
const PROFILE_COLUMNS: &str = "id,username";

pub struct SupabaseGateway {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseGateway {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    fn table(&self, method: Method, table: &str, identity: &Identity) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(&identity.access_token)
    }

    async fn token(&self, grant_type: &str, body: Value) -> AppResult<Session> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json::<Session>().await?);
        }

        match error_from_response(response).await {
            AppError::Backend { status, message } if is_client_error(status) => {
                Err(AppError::Auth(message))
            }
            other => Err(other),
        }
    }
}

fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

fn owner_filter(identity: &Identity) -> String {
    format!("eq.{}", identity.user_id)
}

/// Pulls the human-readable message out of a GoTrue or PostgREST error body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

async fn error_from_response(response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| format!("Backend returned status {}", status));
    AppError::Backend {
        status: status.as_u16(),
        message,
    }
}

async fn expect_success(response: Response) -> AppResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

async fn single_row<T: DeserializeOwned>(response: Response, table: &str) -> AppResult<T> {
    let rows: Vec<T> = expect_success(response).await?.json().await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::Internal(format!("Insert into {} returned no row", table)))
}

/// `/signup` answers with the user itself, or with `{user, session}` when
/// email confirmation is disabled on the project.
fn user_from_signup(value: Value) -> AppResult<User> {
    let user_value = if value.get("user").is_some_and(Value::is_object) {
        value["user"].clone()
    } else {
        value
    };
    serde_json::from_value(user_value)
        .map_err(|e| AppError::Internal(format!("Unexpected sign-up response: {}", e)))
}

#[async_trait]
impl AuthGateway for SupabaseGateway {
    async fn get_user(&self, access_token: &str) -> AppResult<Option<User>> {
        let response = self
            .auth(Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Access token rejected by auth provider");
                Ok(None)
            }
            s if s.is_success() => Ok(Some(response.json::<User>().await?)),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        self.token(
            "password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User> {
        let response = self
            .auth(Method::POST, "signup")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            return user_from_signup(response.json::<Value>().await?);
        }

        match error_from_response(response).await {
            AppError::Backend { status, message } if is_client_error(status) => {
                Err(AppError::Auth(message))
            }
            other => Err(other),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session> {
        self.token(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let response = self
            .auth(Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;

        // An already-expired token is as signed out as it gets.
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Sign-out with an expired token");
            return Ok(());
        }
        expect_success(response).await.map(|_| ())
    }
}

#[async_trait]
impl DataGateway for SupabaseGateway {
    async fn list_transactions(
        &self,
        identity: &Identity,
        query: TransactionQuery,
    ) -> AppResult<Vec<Transaction>> {
        let mut params = vec![
            ("select", TRANSACTION_COLUMNS.to_string()),
            ("user_id", owner_filter(identity)),
            ("order", "date.desc,created_at.desc".to_string()),
        ];
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let response = self
            .table(Method::GET, TRANSACTIONS_TABLE, identity)
            .query(&params)
            .send()
            .await?;

        Ok(expect_success(response).await?.json().await?)
    }

    async fn insert_transaction(
        &self,
        identity: &Identity,
        new: &NewTransaction,
    ) -> AppResult<Transaction> {
        let response = self
            .table(Method::POST, TRANSACTIONS_TABLE, identity)
            .query(&[("select", TRANSACTION_COLUMNS)])
            .header("Prefer", "return=representation")
            .json(new)
            .send()
            .await?;

        single_row(response, TRANSACTIONS_TABLE).await
    }

    async fn list_budgets(
        &self,
        identity: &Identity,
        query: BudgetQuery,
    ) -> AppResult<Vec<Budget>> {
        let mut params = vec![
            ("select", BUDGET_COLUMNS.to_string()),
            ("user_id", owner_filter(identity)),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let response = self
            .table(Method::GET, BUDGETS_TABLE, identity)
            .query(&params)
            .send()
            .await?;

        Ok(expect_success(response).await?.json().await?)
    }

    async fn insert_budget(&self, identity: &Identity, new: &NewBudget) -> AppResult<Budget> {
        let response = self
            .table(Method::POST, BUDGETS_TABLE, identity)
            .query(&[("select", BUDGET_COLUMNS)])
            .header("Prefer", "return=representation")
            .json(new)
            .send()
            .await?;

        single_row(response, BUDGETS_TABLE).await
    }

    async fn update_budget_amount(
        &self,
        identity: &Identity,
        id: &str,
        limit_cents: i64,
    ) -> AppResult<()> {
        let response = self
            .table(Method::PATCH, BUDGETS_TABLE, identity)
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", owner_filter(identity)),
            ])
            .header("Prefer", "return=minimal")
            .json(&BudgetAmountPatch {
                budget_number: limit_cents,
            })
            .send()
            .await?;

        expect_success(response).await.map(|_| ())
    }

    async fn delete_budget(&self, identity: &Identity, id: &str) -> AppResult<()> {
        let response = self
            .table(Method::DELETE, BUDGETS_TABLE, identity)
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", owner_filter(identity)),
            ])
            .send()
            .await?;

        expect_success(response).await.map(|_| ())
    }

    async fn get_profile(&self, identity: &Identity) -> AppResult<Option<Profile>> {
        let response = self
            .table(Method::GET, PROFILES_TABLE, identity)
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", owner_filter(identity)),
            ])
            .send()
            .await?;

        let rows: Vec<Profile> = expect_success(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, identity: &Identity, profile: &Profile) -> AppResult<()> {
        let response = self
            .table(Method::POST, PROFILES_TABLE, identity)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(profile)
            .send()
            .await?;

        expect_success(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_keys_in_priority_order() {
        assert_eq!(
            extract_error_message(r#"{"code":400,"msg":"Invalid login credentials"}"#).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(
            extract_error_message(
                r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#
            )
            .as_deref(),
            Some("Email not confirmed")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"permission denied for table Budgets"}"#)
                .as_deref(),
            Some("permission denied for table Budgets")
        );
        assert_eq!(extract_error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn signup_response_shapes() {
        let bare = serde_json::json!({"id": "u-1", "email": "a@b.c"});
        assert_eq!(user_from_signup(bare).unwrap().id, "u-1");

        let wrapped = serde_json::json!({
            "user": {"id": "u-2", "email": "a@b.c", "user_metadata": {"full_name": "Ann"}},
            "session": null
        });
        let user = user_from_signup(wrapped).unwrap();
        assert_eq!(user.id, "u-2");
        assert_eq!(user.user_metadata.full_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn base_url_is_normalised() {
        let gateway =
            SupabaseGateway::new("https://demo.supabase.co/", "anon", Duration::from_secs(5))
                .unwrap();
        assert_eq!(gateway.base_url, "https://demo.supabase.co");
    }
}
