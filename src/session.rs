//! Session guard: who is signed in, and what happens to requests from
//! people who are not.
//!
//! The access and refresh tokens issued by the auth provider live in two
//! HTTP-only cookies. Every protected request asks the provider for the
//! token's owner, refreshes the session when the access token has expired,
//! and otherwise redirects to `/login?redirect=<original path>`.
//!
//! Sign-in, sign-out and token refresh are published as [`AuthEvent`]s so
//! that per-user state elsewhere can be dropped.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::gateway::AuthGatewayRef;
use crate::models::{resolve_display_name, Identity, Session, User, UserMetadata};
use crate::state::AppState;

pub const ACCESS_COOKIE: &str = "mm_access_token";
pub const REFRESH_COOKIE: &str = "mm_refresh_token";

pub const LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING: &str = "/dashboard";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub user_id: String,
    /// The new session, absent for sign-out.
    pub session: Option<Session>,
}

/// Handle returned by [`AuthClient::on_auth_state_change`]. The callback
/// stops receiving events when this is dropped or unsubscribed.
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Result of checking the session cookies against the auth provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCheck {
    Active(Session),
    /// The access token had expired and was exchanged for a new pair.
    Refreshed(Session),
    Missing,
}

impl SessionCheck {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionCheck::Active(s) | SessionCheck::Refreshed(s) => Some(s),
            SessionCheck::Missing => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session().map(|s| s.user.id.as_str())
    }
}

/// Tokens read from the request cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn from_cookies(cookies: &Cookies) -> Self {
        let read = |name| {
            cookies
                .get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            access_token: read(ACCESS_COOKIE),
            refresh_token: read(REFRESH_COOKIE),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Wraps the auth gateway and publishes state changes.
pub struct AuthClient {
    gateway: AuthGatewayRef,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    pub fn new(gateway: AuthGatewayRef) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { gateway, events }
    }

    fn publish(&self, kind: AuthEventKind, user_id: &str, session: Option<Session>) {
        debug!(?kind, user_id, "Auth state change");
        // No subscribers is fine.
        let _ = self.events.send(AuthEvent {
            kind,
            user_id: user_id.to_string(),
            session,
        });
    }

    /// Run `callback` for every auth event until the returned handle is dropped.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(AuthEvent) + Send + 'static,
    {
        let mut receiver = self.events.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event listener fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { task: Some(task) }
    }

    /// Resolve the session behind `tokens`, refreshing it when the access
    /// token is no longer accepted. Provider errors count as no session.
    pub async fn get_session(&self, tokens: &SessionTokens) -> SessionCheck {
        if let Some(access_token) = &tokens.access_token {
            match self.gateway.get_user(access_token).await {
                Ok(Some(user)) => {
                    return SessionCheck::Active(Session {
                        access_token: access_token.clone(),
                        refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
                        expires_at: None,
                        user,
                    });
                }
                Ok(None) => debug!("Access token no longer valid"),
                Err(e) => warn!("Could not verify access token: {}", e),
            }
        }

        let Some(refresh_token) = &tokens.refresh_token else {
            return SessionCheck::Missing;
        };

        match self.gateway.refresh_session(refresh_token).await {
            Ok(session) => {
                self.publish(
                    AuthEventKind::TokenRefreshed,
                    &session.user.id,
                    Some(session.clone()),
                );
                SessionCheck::Refreshed(session)
            }
            Err(e) => {
                debug!("Session refresh failed: {}", e);
                SessionCheck::Missing
            }
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        let session = self.gateway.sign_in_with_password(email, password).await?;
        info!(user_id = %session.user.id, "Signed in");
        self.publish(AuthEventKind::SignedIn, &session.user.id, Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User> {
        let user = self.gateway.sign_up(email, password, metadata).await?;
        info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// Ends the session with the provider. The event is published even when
    /// the provider call fails, since the cookies are gone either way.
    pub async fn sign_out(&self, access_token: &str, user_id: &str) -> AppResult<()> {
        let result = self.gateway.sign_out(access_token).await;
        self.publish(AuthEventKind::SignedOut, user_id, None);
        result
    }
}

/// What the guard decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Unknown,
    Authenticated(String),
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    /// Render the page from whatever is cached.
    Load,
    /// Drop cached lists for the user, then render.
    Reload,
    RedirectToLogin,
    Nothing,
}

impl GuardState {
    /// Advance on a new observation of the signed-in user.
    pub fn observe(&self, user_id: Option<&str>) -> (GuardState, GuardAction) {
        match (self, user_id) {
            (GuardState::Unknown | GuardState::Anonymous, Some(id)) => {
                (GuardState::Authenticated(id.to_string()), GuardAction::Load)
            }
            (GuardState::Authenticated(_), Some(id)) => {
                (GuardState::Authenticated(id.to_string()), GuardAction::Reload)
            }
            (GuardState::Unknown | GuardState::Authenticated(_), None) => {
                (GuardState::Anonymous, GuardAction::RedirectToLogin)
            }
            (GuardState::Anonymous, None) => (GuardState::Anonymous, GuardAction::Nothing),
        }
    }
}

/// Paths reachable without a session.
pub fn is_public_path(path: &str) -> bool {
    matches!(
        path,
        LOGIN_PATH | "/signup" | "/logout" | "/health" | "/theme/toggle"
    ) || path.starts_with("/static/")
}

fn is_safe_redirect(target: &str) -> bool {
    if !target.starts_with('/') || target.starts_with("//") {
        return false;
    }
    let path = target.split_once('?').map(|(p, _)| p).unwrap_or(target);
    path != LOGIN_PATH
}

/// Accept only same-site relative targets for the post-login redirect.
pub fn normalize_redirect(raw: &str) -> Option<String> {
    let uri = raw.parse::<Uri>().ok()?;
    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }
    let target = uri.path_and_query()?.as_str();
    is_safe_redirect(target).then(|| target.to_string())
}

/// Where to send the user after signing in.
pub fn landing_target(raw: Option<&str>) -> String {
    raw.and_then(normalize_redirect)
        .unwrap_or_else(|| DEFAULT_LANDING.to_string())
}

/// `/login?redirect=<encoded path and query>` for the request being refused.
pub fn login_redirect_url(uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    match normalize_redirect(target) {
        Some(target) => format!("{}?redirect={}", LOGIN_PATH, urlencoding::encode(&target)),
        None => LOGIN_PATH.to_string(),
    }
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

pub fn write_session_cookies(cookies: &Cookies, session: &Session, secure: bool) {
    cookies.add(session_cookie(
        ACCESS_COOKIE,
        session.access_token.clone(),
        secure,
    ));
    cookies.add(session_cookie(
        REFRESH_COOKIE,
        session.refresh_token.clone(),
        secure,
    ));
}

pub fn clear_session_cookies(cookies: &Cookies) {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        cookies.remove(Cookie::build((name, "")).path("/").build());
    }
}

/// Build the caller's [`Identity`], resolving the display name once per
/// sign-in. A failed profile read falls back to metadata and is retried on
/// the next request.
pub async fn resolve_identity(state: &AppState, session: &Session) -> Identity {
    if let Some(name) = state.cache.display_name(&session.user.id) {
        return Identity::from_session(session, name);
    }

    let mut identity = Identity::from_session(session, String::new());
    identity.display_name = match state.data.get_profile(&identity).await {
        Ok(profile) => {
            let name = resolve_display_name(profile.as_ref(), &session.user);
            state.cache.set_display_name(&session.user.id, name.clone());
            name
        }
        Err(e) => {
            warn!("Failed to load profile: {}", e);
            resolve_display_name(None, &session.user)
        }
    };
    identity
}

/// Middleware guarding every non-public route.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_public_path(path) {
        return next.run(request).await;
    }

    let tokens = SessionTokens::from_cookies(&cookies);
    let check = state.auth.get_session(&tokens).await;

    let (guard, mut action) = GuardState::Unknown.observe(check.user_id());
    if let SessionCheck::Refreshed(session) = &check {
        write_session_cookies(&cookies, session, state.config.secure_cookies);
        // A refresh is a re-authentication: anything cached was loaded under
        // the old token.
        action = guard.observe(Some(&session.user.id)).1;
    }

    let Some(session) = check.session() else {
        if !tokens.is_empty() {
            clear_session_cookies(&cookies);
        }
        let path = request.uri().path();
        let is_htmx = request.headers().contains_key("HX-Request");
        if is_htmx || path.starts_with("/api/") {
            return (StatusCode::UNAUTHORIZED, "Authentication required").into_response();
        }
        return Redirect::to(&login_redirect_url(request.uri())).into_response();
    };

    if action == GuardAction::Reload {
        state.cache.evict(&session.user.id);
    }

    let identity = resolve_identity(&state, session).await;
    request.extensions_mut().insert(identity);
    next.run(request).await
}
