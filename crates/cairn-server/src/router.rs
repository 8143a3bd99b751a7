use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use cairn_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Cairn endpoints.
///
/// Blob endpoints sit behind the auth middleware; `/` and `/health` do not.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_size).unwrap_or(usize::MAX);

    let blob_routes: Router<AppState> = Router::new()
        .route(endpoints::PUT, post(handler::put_handler))
        .route(endpoints::GET, get(handler::get_handler))
        .route(endpoints::CHECK, get(handler::check_handler))
        .route(endpoints::LIST, get(handler::list_handler))
        .route(endpoints::PREUPLOAD, post(handler::preupload_handler))
        .route(endpoints::UPLOAD, post(handler::upload_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route(endpoints::ROOT, get(handler::root_handler))
        .route(endpoints::HEALTH, get(handler::health_handler))
        .merge(blob_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
