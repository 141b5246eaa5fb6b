use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod password;
pub mod reset;
pub mod token;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
