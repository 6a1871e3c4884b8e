pub mod auth;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod users;
pub mod version;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All routes of the service. Message routes sit behind `require_auth`; the
/// single-message routes additionally behind `authorize_message`.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/version", get(version::version))
        .route("/version/", get(version::version));

    let owned_message_routes = Router::new()
        .route(
            "/{id}",
            post(messages::update_message).delete(messages::delete_message),
        )
        .route(
            "/{id}/",
            post(messages::update_message).delete(messages::delete_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize_message,
        ));

    let protected_routes = Router::new()
        .route("/me", get(users::me))
        .route(
            "/",
            get(messages::list_messages).post(messages::create_message),
        )
        .merge(owned_message_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
