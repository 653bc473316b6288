use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_cookies::CookieManagerLayer;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppResult;
use crate::error_pages::{error_page_middleware, fallback_handler};
use crate::handlers;
use crate::session;
use crate::state::AppState;

/// Assemble the full middleware stack around the routes for `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::routes())
        .fallback(fallback_handler)
        .nest_service("/static", ServeDir::new(&state.config.static_path))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ))
        .layer(middleware::from_fn(error_page_middleware))
        .layer(CookieManagerLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the application state and Axum router from a [`Config`].
///
/// Connects the gateways named by the config and subscribes the view cache
/// to auth events. Must run inside a tokio runtime.
pub fn build_app(config: Config) -> AppResult<(AppState, Router)> {
    let state = AppState::from_config(config)?;
    let app = build_router(state.clone());
    Ok((state, app))
}

/// Bind the router to `host:port` and spawn the server as a tokio task.
///
/// Returns the actual port the server bound to (useful when `port` is 0 for
/// OS-assigned ports) and a [`JoinHandle`] for the server task.
pub async fn serve(app: Router, host: &str, port: u16) -> AppResult<(u16, JoinHandle<()>)> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    let actual_port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_port, handle))
}
