// Library crate for the taskdeck todo API server
// This file exposes the public API for integration tests

pub mod auth;
pub mod config;
pub mod health;
pub mod shared;
pub mod todo;
pub mod user;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Re-export commonly used types for easier access in tests
pub use auth::{Claims, TokenType};
pub use config::Config;
pub use shared::{AppError, AppState};
pub use todo::{TodoModel, TodoPriority, TodoStatus};
pub use user::{User, UserResponse};

/// Builds the full application router over the given state
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/auth/me", get(auth::handlers::me))
        .route(
            "/api/v1/todos",
            post(todo::handlers::create_todo).get(todo::handlers::list_todos),
        )
        .route(
            "/api/v1/todos/:id",
            get(todo::handlers::get_todo)
                .put(todo::handlers::update_todo)
                .delete(todo::handlers::delete_todo),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/auth/register", post(auth::handlers::register))
        .route("/api/v1/auth/login", post(auth::handlers::login))
        .route(
            "/api/v1/auth/login/email",
            post(auth::handlers::login_by_email),
        )
        .route("/api/v1/auth/refresh", post(auth::handlers::refresh_token))
        .route("/api/v1/auth/logout", post(auth::handlers::logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
