//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the preference endpoints, the cookie-seeded document shell and the
//! health check under a single Axum router. Handlers are stateless; all
//! durable state lives in the client's cookies.

pub mod preferences;
pub mod shell;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::preference::{Direction, ThemeMode};

pub const THEME_PATH: &str = "/api/theme";
pub const DIRECTION_PATH: &str = "/api/theme/direction";
pub const PREFERENCES_PATH: &str = "/api/preferences";

/// Full application router.
pub fn app() -> Router {
    Router::new()
        .route(
            THEME_PATH,
            post(preferences::set_preference::<ThemeMode>).fallback(preferences::method_not_allowed),
        )
        .route(
            DIRECTION_PATH,
            post(preferences::set_preference::<Direction>).fallback(preferences::method_not_allowed),
        )
        .route(PREFERENCES_PATH, get(preferences::current_preferences))
        .route("/", get(shell::document))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    /// Serve `router` on an ephemeral loopback port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    /// Serve the full application router.
    pub async fn spawn_app() -> String {
        serve(app()).await
    }
}
