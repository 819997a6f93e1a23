//! JSON API under `/api/v1`.

mod error;
pub mod handlers;
mod messages;
mod middleware;
mod params;
pub mod resources;
mod state;

pub use error::{ApiError, Envelope};
pub use messages::Action;
pub use middleware::RequestContext;
pub use params::ApiQuery;
pub use state::ApiState;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, put},
};

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/preferences",
            get(handlers::show_preferences).post(handlers::create_preferences),
        )
        .route("/api/v1/preferences/{id}", put(handlers::update_preferences))
        .route(
            "/api/v1/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/v1/projects/{id}",
            get(handlers::show_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/api/v1/time-frames",
            get(handlers::list_time_frames).post(handlers::create_time_frame),
        )
        .route(
            "/api/v1/time-frames/{id}",
            get(handlers::show_time_frame)
                .put(handlers::update_time_frame)
                .delete(handlers::delete_time_frame),
        )
        .route(
            "/api/v1/time-entries",
            get(handlers::list_time_entries).post(handlers::create_time_entry),
        )
        .route(
            "/api/v1/time-entries/{id}",
            get(handlers::show_time_entry)
                .put(handlers::update_time_entry)
                .delete(handlers::delete_time_entry),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
