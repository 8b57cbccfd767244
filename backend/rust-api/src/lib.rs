use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; connect-src 'self'"),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoint (no auth required)
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", viva_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(TraceLayer::new_for_http())
}

fn viva_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Session details stay outside the auth layer: result links are shareable.
    let public_routes =
        Router::new().route("/viva/{id}", get(handlers::viva::get_session_details));

    let protected_routes = Router::new()
        .route("/viva/", post(handlers::viva::start_viva))
        .route("/viva/history", get(handlers::viva::get_history))
        .route("/viva/{id}", delete(handlers::viva::delete_session))
        .route("/viva/{id}/conclude", post(handlers::viva::conclude_viva))
        .route("/viva/{id}/rename", patch(handlers::viva::rename_session))
        // Tool-call relay endpoints (multi-tool protocol)
        .route("/viva/{id}/questions/next", post(handlers::viva::next_question))
        .route("/viva/{id}/turns", post(handlers::viva::record_turn))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
