pub mod extract;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::ws_handler;

use crate::error::ApiError;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router: every REST route and the
/// WebSocket endpoint behind `require_auth`, plus the public Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid FRONTEND_URL: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let protected_routes = Router::new()
        .route(
            "/lectures",
            get(rest::list_lectures_handler).post(rest::create_lecture_handler),
        )
        .route(
            "/lectures/{id}",
            patch(rest::update_lecture_handler).delete(rest::delete_lecture_handler),
        )
        .route(
            "/lectures/{id}/status",
            patch(rest::change_lecture_status_handler),
        )
        .route(
            "/questions",
            get(rest::list_questions_handler).post(rest::create_question_handler),
        )
        .route("/questions/{id}", patch(rest::patch_question_handler))
        .route(
            "/questions/{id}/status",
            patch(rest::set_question_status_handler),
        )
        .route(
            "/questions/{id}/invalidate",
            patch(rest::invalidate_question_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state);

    Ok(Router::new()
        .merge(protected_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors))
}
