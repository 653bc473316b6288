use axum::response::Redirect;
use axum::Form;
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::debug;

use crate::models::Theme;
use crate::session::normalize_redirect;
use crate::theme::save_theme;

#[derive(Debug, Default, Deserialize)]
pub struct ThemeFormData {
    pub return_to: Option<String>,
}

/// Flip the theme and go back to the page the toggle was clicked on.
pub async fn toggle_theme(
    cookies: Cookies,
    theme: Theme,
    Form(form): Form<ThemeFormData>,
) -> Redirect {
    let next = theme.toggled();
    save_theme(&cookies, next);
    debug!(theme = next.as_str(), "Theme toggled");

    let target = form
        .return_to
        .as_deref()
        .and_then(normalize_redirect)
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&target)
}
