use askama::Template;
use axum::response::Html;
use axum::Extension;

use crate::error::{AppResult, RenderHtml};
use crate::handlers::PageLayout;
use crate::models::{Identity, Theme};

#[derive(Template)]
#[template(path = "pages/advisor.html")]
pub struct AdvisorTemplate {
    pub layout: PageLayout,
}

pub async fn index(
    Extension(identity): Extension<Identity>,
    theme: Theme,
) -> AppResult<Html<String>> {
    AdvisorTemplate {
        layout: PageLayout::new("AI Advisor", "/advisor", theme, &identity),
    }
    .render_html()
}
