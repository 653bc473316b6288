//! Sign-in, sign-up and sign-out.

use askama::Template;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::{info, warn};

use crate::error::{AppResult, RenderHtml};
use crate::handlers::PageLayout;
use crate::models::{Identity, Profile, Session, Theme, UserMetadata};
use crate::session::{
    clear_session_cookies, landing_target, write_session_cookies, SessionTokens, LOGIN_PATH,
};
use crate::state::AppState;

pub const NAME_REQUIRED: &str = "Enter your name to create an account.";
pub const CREDENTIALS_REQUIRED: &str = "Enter an email and password to create an account.";
pub const ACCOUNT_CREATED: &str = "Account created. Check your email to confirm.";

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: PageLayout,
    pub signup: bool,
    pub redirect: String,
    /// `redirect`, percent-encoded for the links between the two modes.
    pub redirect_query: String,
    pub email: String,
    pub full_name: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl LoginTemplate {
    fn new(theme: Theme, signup: bool, redirect: Option<String>) -> Self {
        let redirect = redirect.unwrap_or_default();
        Self {
            layout: PageLayout::anonymous(if signup { "Sign up" } else { "Sign in" }, theme),
            signup,
            redirect_query: urlencoding::encode(&redirect).into_owned(),
            redirect,
            email: String::new(),
            full_name: String::new(),
            error: None,
            notice: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginFormData {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupFormData {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub redirect: Option<String>,
}

pub async fn login_page(theme: Theme, Query(query): Query<LoginQuery>) -> AppResult<Html<String>> {
    let signup = query.mode.as_deref() == Some("signup");
    LoginTemplate::new(theme, signup, query.redirect).render_html()
}

/// Records the display name for the new session. Failures are logged only.
async fn upsert_profile(state: &AppState, session: &Session) {
    let identity = Identity::from_session(session, String::new());
    let username = session
        .user
        .user_metadata
        .full_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| session.user.email.clone());
    let profile = Profile {
        id: session.user.id.clone(),
        username,
    };
    if let Err(e) = state.data.upsert_profile(&identity, &profile).await {
        warn!("Failed to save profile: {}", e);
    }
}

pub async fn login_submit(
    State(state): State<AppState>,
    cookies: Cookies,
    theme: Theme,
    Form(form): Form<LoginFormData>,
) -> AppResult<Response> {
    let email = form.email.trim();

    match state.auth.sign_in_with_password(email, &form.password).await {
        Ok(session) => {
            write_session_cookies(&cookies, &session, state.config.secure_cookies);
            upsert_profile(&state, &session).await;
            let target = landing_target(form.redirect.as_deref());
            Ok(Redirect::to(&target).into_response())
        }
        Err(e) => {
            warn!("Sign-in failed: {}", e);
            let mut template = LoginTemplate::new(theme, false, form.redirect);
            template.email = email.to_string();
            template.error = Some(e.user_message());
            Ok(template.render_html()?.into_response())
        }
    }
}

pub async fn signup_submit(
    State(state): State<AppState>,
    theme: Theme,
    Form(form): Form<SignupFormData>,
) -> AppResult<Html<String>> {
    let full_name = form.full_name.trim().to_string();
    let email = form.email.trim().to_string();

    let mut template = LoginTemplate::new(theme, true, form.redirect);
    template.email = email.clone();
    template.full_name = full_name.clone();

    if full_name.is_empty() {
        template.error = Some(NAME_REQUIRED.into());
        return template.render_html();
    }
    if email.is_empty() || form.password.is_empty() {
        template.error = Some(CREDENTIALS_REQUIRED.into());
        return template.render_html();
    }

    let metadata = UserMetadata {
        full_name: Some(full_name),
    };
    match state.auth.sign_up(&email, &form.password, metadata).await {
        Ok(_) => {
            template.signup = false;
            template.layout.title = "Sign in".into();
            template.notice = Some(ACCOUNT_CREATED.into());
        }
        Err(e) => {
            warn!("Sign-up failed: {}", e);
            template.error = Some(e.user_message());
        }
    }
    template.render_html()
}

pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Redirect {
    let tokens = SessionTokens::from_cookies(&cookies);
    if !tokens.is_empty() {
        if let Some(session) = state.auth.get_session(&tokens).await.session() {
            if let Err(e) = state
                .auth
                .sign_out(&session.access_token, &session.user.id)
                .await
            {
                warn!("Sign-out failed at the provider: {}", e);
            }
            info!(user_id = %session.user.id, "Signed out");
        }
    }
    clear_session_cookies(&cookies);
    Redirect::to(LOGIN_PATH)
}
