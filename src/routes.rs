use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{error::AppError, handlers, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Store, api_key: Option<String>) -> Self {
        Self {
            store,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// Builds the complete route table. Called once at startup.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/test", get(handlers::health))
        .route(
            "/questions",
            get(handlers::list_questions).post(handlers::create_question),
        )
        .route("/questions/search", get(handlers::search_questions))
        .route(
            "/questions/{id}",
            get(handlers::get_question)
                .put(handlers::update_question)
                .delete(handlers::delete_question),
        )
        .route(
            "/questions/{id}/answers",
            get(handlers::list_answers).post(handlers::create_answer),
        )
        .route("/questions/{id}/vote", post(handlers::vote_question))
        .route("/answers/{id}/vote", post(handlers::vote_answer));

    let routes = if state.api_key.is_some() {
        routes.layer(middleware::from_fn_with_state(state.clone(), authenticate))
    } else {
        routes
    };

    routes.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = match state.api_key.as_deref() {
        Some(expected) => {
            request
                .headers()
                .get("x-api-key")
                .and_then(|value| value.to_str().ok())
                == Some(expected)
        }
        None => true,
    };

    if authorized {
        Ok(next.run(request).await)
    } else {
        warn!(path = %request.uri().path(), "rejected request without a valid api key");
        Err(AppError::Unauthorized)
    }
}
