pub mod advisor;
pub mod api;
pub mod budget;
pub mod dashboard;
pub mod home;
pub mod login;
pub mod settings;
pub mod transactions;

use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, NaiveDate};

use crate::models::{Identity, Theme};
use crate::state::AppState;
use crate::VERSION;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Pages
        .route("/", get(home::index))
        .route("/dashboard", get(dashboard::index))
        .route("/transactions", get(transactions::index))
        .route("/budget", get(budget::index))
        .route("/advisor", get(advisor::index))
        // Entry flows
        .route("/transactions/create", post(transactions::create))
        .route("/budget/create", post(budget::create))
        .route("/budget/:id/edit", get(budget::edit))
        .route("/budget/:id/update", post(budget::update))
        .route("/budget/:id/delete", post(budget::delete))
        // Session
        .route("/login", get(login::login_page).post(login::login_submit))
        .route("/signup", post(login::signup_submit))
        .route("/logout", post(login::logout))
        .route("/theme/toggle", post(settings::toggle_theme))
        // API (JSON)
        .route("/api/summary", get(api::summary))
        .route("/api/dashboard/series", get(api::dashboard_series_json))
        .route("/health", get(|| async { "OK" }))
}

/// Today's date on the server's local clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct NavItem {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

const NAVIGATION: [(&str, &str); 5] = [
    ("/", "Home"),
    ("/dashboard", "Dashboard"),
    ("/transactions", "Transactions"),
    ("/budget", "Budget"),
    ("/advisor", "AI Advisor"),
];

/// Shared page chrome: title, theme and the sidebar.
pub struct PageLayout {
    pub title: String,
    pub theme: Theme,
    pub active: &'static str,
    pub display_name: String,
    pub email: String,
    pub signed_in: bool,
    pub version: &'static str,
}

impl PageLayout {
    pub fn new(title: &str, active: &'static str, theme: Theme, identity: &Identity) -> Self {
        Self {
            title: title.to_string(),
            theme,
            active,
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            signed_in: true,
            version: VERSION,
        }
    }

    /// Chrome for pages shown without a session: no sidebar.
    pub fn anonymous(title: &str, theme: Theme) -> Self {
        Self {
            title: title.to_string(),
            theme,
            active: "",
            display_name: String::new(),
            email: String::new(),
            signed_in: false,
            version: VERSION,
        }
    }

    pub fn nav(&self) -> Vec<NavItem> {
        NAVIGATION
            .iter()
            .map(|&(href, label)| NavItem {
                href,
                label,
                active: href == self.active,
            })
            .collect()
    }

    pub fn initial(&self) -> char {
        self.display_name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('G')
    }
}
