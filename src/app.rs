use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::{self, SecurityConfig};
use crate::handlers;
use crate::middleware::authenticate;
use crate::state::AppState;

/// The full HTTP application over `state`.
pub fn build_router(state: AppState) -> Router {
    let config = config::config();

    // Everything under /api resolves the caller's session first.
    let api = Router::new()
        .merge(session_routes())
        .merge(user_routes())
        .merge(message_routes())
        .merge(comic_routes())
        .layer(from_fn_with_state(state.clone(), authenticate));

    let mut app = Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health))
        .merge(api)
        .fallback(handlers::root::fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes));

    if let Some(cors) = cors_layer(&config.security) {
        app = app.layer(cors);
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn session_routes() -> Router<AppState> {
    use handlers::{email_taken, session};

    Router::new()
        .route("/api/session", post(session::session_post).get(session::session_get))
        .route("/api/emailTaken", get(email_taken::email_taken_get))
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/api/users", post(users::user_create))
        .route(
            "/api/users/:userID",
            get(users::user_get).patch(users::user_patch).delete(users::user_delete),
        )
        .route("/api/users/:userID/private", get(users::user_private_get))
        .route("/api/users/:userID/verifyEmail", post(users::user_verify_email))
        .route("/api/users/:userID/perms", put(users::user_perms_put))
        .route("/api/users/:userID/messages", get(users::user_messages_get))
        .route("/api/users/:userID/comics", get(users::user_comics_get))
}

fn message_routes() -> Router<AppState> {
    use handlers::messages;

    Router::new()
        .route("/api/messages", post(messages::message_send))
        .route(
            "/api/messages/:messageID",
            get(messages::message_get)
                .patch(messages::message_patch)
                .delete(messages::message_delete),
        )
        .route("/api/messages/:messageID/read", put(messages::message_read_put))
}

fn comic_routes() -> Router<AppState> {
    use handlers::comics;

    Router::new()
        .route("/api/comics", post(comics::comic_create))
        .route(
            "/api/comics/:comicID",
            get(comics::comic_get)
                .patch(comics::comic_patch)
                .delete(comics::comic_delete),
        )
        .route("/api/comics/:comicID/pages", post(comics::comic_page_post))
        .route("/api/comics/:comicID/drafts", post(comics::comic_draft_post))
        .route("/api/comics/:comicID/drafts/publish", post(comics::comic_drafts_publish))
        .route("/api/comics/:comicID/comments", post(comics::comic_comment_post))
        .route(
            "/api/comics/:comicID/comments/:index",
            axum::routing::delete(comics::comic_comment_delete),
        )
        .route(
            "/api/comics/:comicID/comments/:index/rating",
            put(comics::comic_comment_rating_put),
        )
        .route("/api/comics/:comicID/script/verify", post(comics::comic_script_verify))
}

/// `None` when CORS is disabled. An empty origin list or `*` allows any origin.
fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }

    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|origin| origin == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
