use axum::Router;

use crate::state::AppState;

pub mod auth_login;
pub mod dashboard;
pub mod settings;

/// Build the application router (auth + dashboard + settings endpoints).
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_login::router(state.clone()))
        .merge(dashboard::router(state.clone()))
        .merge(settings::router(state))
}
