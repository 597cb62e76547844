use axum::{
    Json, Router,
    error_handling::HandleErrorLayer,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
};
use std::any::Any;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::{ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod playlists;
pub mod repository;
pub mod telemetry;
pub mod token;

// Routing split by access level (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use credentials::CredentialStore;
pub use error::{AppError, AppResult};
pub use playlists::PlaylistStore;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json` and rendered by the
/// Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::register, handlers::login, handlers::get_me,
        handlers::list_playlists, handlers::create_playlist, handlers::get_playlist,
        handlers::update_playlist, handlers::delete_playlist, handlers::add_song,
        handlers::remove_song, handlers::liked_songs, handlers::toggle_liked,
        handlers::list_users, handlers::get_user, handlers::update_user,
        handlers::delete_user, handlers::get_admin_stats
    ),
    components(
        schemas(
            models::Role, models::UserView, models::Song, models::SongList, models::Playlist,
            models::RegisterRequest, models::LoginRequest, models::UpdateUserRequest,
            models::CreatePlaylistRequest, models::UpdatePlaylistRequest, models::SongRequest,
            models::AuthResponse, models::UserEnvelope, models::UsersEnvelope,
            models::UpdatedUserResponse, models::DeletedUser, models::DeletedUserResponse,
            models::AdminStats, models::PlaylistEnvelope, models::PlaylistsEnvelope,
            models::SongsEnvelope, models::ToggleLikeResponse, models::MessageResponse,
            models::HealthResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "opensound", description = "OpenSound accounts and playlists API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container handed to every handler. Everything inside is cheap to clone
/// and immutable once built; the stores share the same repository handle.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub credentials: CredentialStore,
    pub playlists: PlaylistStore,
}

impl AppState {
    /// Wires the token service and both stores around one repository handle.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            tokens: TokenService::from_config(&config),
            credentials: CredentialStore::new(repo.clone()),
            playlists: PlaylistStore::new(repo.clone()),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the per-level guards and the global layers, and
/// registers the state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let request_timeout = state.config.request_timeout;

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::auth_middleware,
            )),
        )
        // The last route_layer wraps outermost: authentication runs before the role check.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::admin_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::auth_middleware,
                )),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(HandleErrorLayer::new(error::handle_layer_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(cors)
}

/// cors_layer
///
/// `*` allows any origin; otherwise only the configured origins are echoed back, with credentials.
/// Unparseable origins are skipped with a warning.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if config.allows_any_origin() {
        // Credentials cannot be combined with a wildcard origin.
        cors.allow_origin(AnyOrigin)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

/// A panicking handler still answers with the standard error envelope.
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(error::ErrorBody {
            message: "internal server error".to_string(),
        }),
    )
        .into_response()
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the generated request id, so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
