pub mod auth;
pub mod business;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod n8n;
pub mod resumable;
pub mod state;
pub mod store;
pub mod ui_stream;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use state::AppState;

// ═══════════════════════════════════════════════════════════════════════
//  Request correlation
// ═══════════════════════════════════════════════════════════════════════

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags every request with an id: the caller's `X-Request-Id` when it is a
/// usable header value, a fresh UUID v4 otherwise. The id is written back onto
/// the request for handlers, filled into the `request_id` field of the
/// `TraceLayer` span, and echoed on the response.
async fn request_id_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::http::HeaderValue;

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.to_str().is_ok())
        .cloned()
        .or_else(|| HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok());

    let Some(request_id) = request_id else {
        return next.run(req).await;
    };

    tracing::Span::current().record("request_id", request_id.to_str().unwrap_or_default());
    req.headers_mut().insert(REQUEST_ID_HEADER, request_id.clone());

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

// ── OpenAPI documentation ────────────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ChatRelay API",
        version = "1.0.0",
        description = "Chat backend relaying conversations to an n8n workflow",
        license(name = "MIT")
    ),
    paths(
        // Health
        handlers::health_check,
        handlers::readiness,
        // Chat
        handlers::post_chat,
        handlers::delete_chat,
        handlers::resume_stream,
        handlers::chat_messages,
        handlers::update_visibility,
        handlers::delete_trailing_messages,
        handlers::list_business_functions,
        // History
        handlers::list_history,
        // Votes
        handlers::get_votes,
        handlers::vote_message,
    ),
    components(schemas(
        models::HealthResponse,
        models::Chat,
        models::Visibility,
        models::Role,
        models::MessagePart,
        models::DbMessage,
        models::UiMessage,
        models::PostRequestBody,
        models::VisibilityRequest,
        models::Vote,
        models::VoteType,
        models::VoteRequest,
        business::BusinessFunction,
        business::BusinessFunctionInfo,
    )),
    tags(
        (name = "health", description = "Health & readiness endpoints"),
        (name = "chat", description = "Chat submission, resume & management"),
        (name = "history", description = "Chat history"),
        (name = "vote", description = "Message votes"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router with the given shared state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port. Rate limiting is added in `main`.
pub fn create_router(state: AppState) -> Router {
    // ── Public routes (no auth) ──────────────────────────────────────
    let public = Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/health/ready", get(handlers::readiness))
        .route("/api-docs/openapi.json", get(openapi_json));

    // ── Protected routes ─────────────────────────────────────────────
    let protected = Router::new()
        .route(
            "/api/chat",
            post(handlers::post_chat).delete(handlers::delete_chat),
        )
        .route("/api/chat/{id}/stream", get(handlers::resume_stream))
        .route("/api/chat/{id}/messages", get(handlers::chat_messages))
        .route(
            "/api/chat/{id}/visibility",
            patch(handlers::update_visibility),
        )
        .route(
            "/api/messages/{id}/trailing",
            delete(handlers::delete_trailing_messages),
        )
        .route("/api/history", get(handlers::list_history))
        .route(
            "/api/vote",
            get(handlers::get_votes).patch(handlers::vote_message),
        )
        .route(
            "/api/business-functions",
            get(handlers::list_business_functions),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    public
        .merge(protected)
        // 1 MB body limit: messages are capped well below this
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
