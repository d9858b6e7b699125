use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    auth::AuthenticatedUser,
    middleware::{expose_error_detail, no_store},
    state::AppState,
};

pub mod applications;
pub mod auth;
pub mod health;
pub mod sla;
pub mod statuses;
pub mod users;

fn cors_layer(state: &AppState) -> CorsLayer {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let applications_routes = Router::new()
        .route(
            "/",
            get(applications::list_applications).post(applications::create_application),
        )
        .route("/mine", get(applications::list_my_applications))
        .route(
            "/:id",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::delete_application),
        )
        .route(
            "/:id/status",
            get(statuses::list_application_statuses).post(statuses::create_status),
        )
        .route("/:id/sla", get(sla::application_sla));

    let statuses_routes = Router::new()
        .route("/", get(statuses::list_statuses))
        .route(
            "/:id",
            put(statuses::update_status).delete(statuses::delete_status),
        );

    let sla_routes = Router::new().route("/", get(sla::list_sla));

    let users_routes = Router::new().route("/", get(users::list_users)).route(
        "/:id",
        get(users::get_user)
            .put(users::update_user)
            .delete(users::delete_user),
    );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/applications", applications_routes)
        .nest("/api/statuses", statuses_routes)
        .nest("/api/sla", sla_routes)
        .nest("/api/users", users_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            expose_error_detail,
        ))
        .layer(middleware::from_fn(no_store))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
