use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::{ensure_correct_user, ensure_logged_in};
use crate::{messages, users};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/reset", post(auth::reset))
        .route("/auth/update", post(auth::update_password));

    let logged_in_routes = Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .route("/users", get(users::list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), ensure_logged_in));

    let correct_user_routes = Router::new()
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/to", get(users::messages_to))
        .route("/users/{username}/from", get(users::messages_from))
        .route_layer(middleware::from_fn_with_state(state.clone(), ensure_correct_user));

    Router::new()
        .merge(public_routes)
        .merge(logged_in_routes)
        .merge(correct_user_routes)
        .with_state(state)
}
