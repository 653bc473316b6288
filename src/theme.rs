//! Theme preference, kept in a long-lived browser cookie.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::models::Theme;

pub const THEME_COOKIE: &str = "theme";
const CLIENT_HINT: &str = "sec-ch-prefers-color-scheme";

/// The saved preference, else the OS preference sent as a client hint.
pub fn current_theme(cookies: &Cookies, headers: &HeaderMap) -> Theme {
    if let Some(theme) = cookies
        .get(THEME_COOKIE)
        .and_then(|c| c.value().parse::<Theme>().ok())
    {
        return theme;
    }
    system_theme(headers)
}

pub fn system_theme(headers: &HeaderMap) -> Theme {
    headers
        .get(CLIENT_HINT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"'))
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

pub fn save_theme(cookies: &Cookies, theme: Theme) {
    let cookie = Cookie::build((THEME_COOKIE, theme.as_str()))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(Duration::days(365))
        .build();
    cookies.add(cookie);
}

#[async_trait]
impl<S> FromRequestParts<S> for Theme
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state).await?;
        Ok(current_theme(&cookies, &parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_hint_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(system_theme(&headers), Theme::Light);

        headers.insert(CLIENT_HINT, HeaderValue::from_static("dark"));
        assert_eq!(system_theme(&headers), Theme::Dark);

        headers.insert(CLIENT_HINT, HeaderValue::from_static("\"dark\""));
        assert_eq!(system_theme(&headers), Theme::Dark);

        headers.insert(CLIENT_HINT, HeaderValue::from_static("sepia"));
        assert_eq!(system_theme(&headers), Theme::Light);
    }
}
