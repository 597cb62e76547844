use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::{AppError, AppResult, ErrorBody},
    models::{
        AdminStats, AuthResponse, CreatePlaylistRequest, DeletedUser, DeletedUserResponse,
        HealthResponse, LoginRequest, MessageResponse, PlaylistEnvelope, PlaylistsEnvelope,
        RegisterRequest, SongRequest, SongsEnvelope, ToggleLikeResponse, UpdatePlaylistRequest,
        UpdateUserRequest, UpdatedUserResponse, UserEnvelope, UserView, UsersEnvelope,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Extraction Helpers ---

/// Unwraps a JSON body, turning a missing or malformed body into a 400 with the standard envelope.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Parses a path id; anything that is not a UUID is `InvalidId`.
pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidId)
}

/// UserFilter
///
/// Query parameters for GET /admin/users.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Case-insensitive substring matched against name and email.
    pub search: Option<String>,
}

// --- Public Handlers ---

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Alive", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: env!("CARGO_PKG_NAME").to_string(),
        timestamp: Utc::now(),
        env: state.config.env.as_str().to_string(),
    })
}

/// register
///
/// [Public Route] Creates a `user` account plus its liked playlist and returns a token.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let req = body(payload)?;
    let user = state
        .credentials
        .register(req.email, req.password, req.name)
        .await?;
    let token = state.tokens.issue(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserView::from(user),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for a token. Failures carry one generic message.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let req = body(payload)?;
    let user = state.credentials.login(req.email, req.password).await?;
    let token = state.tokens.issue(&user)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(user),
    }))
}

/// fallback
///
/// Unmatched routes answer with the standard 404 envelope.
pub async fn not_found() -> AppError {
    AppError::NotFound("route")
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The current user's profile, read fresh from the store.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Profile", body = UserEnvelope),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserEnvelope>> {
    let user = state.credentials.get_user(id).await?;
    Ok(Json(UserEnvelope {
        user: UserView::from(user),
    }))
}

/// list_playlists
///
/// [Authenticated Route] The requester's playlists, liked playlist first.
#[utoipa::path(
    get,
    path = "/playlists",
    responses((status = 200, description = "My playlists", body = PlaylistsEnvelope))
)]
pub async fn list_playlists(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<PlaylistsEnvelope>> {
    let playlists = state.playlists.list_for_user(id).await?;
    Ok(Json(PlaylistsEnvelope { playlists }))
}

/// create_playlist
///
/// [Authenticated Route] Creates a regular playlist; `isLiked` input is never honoured.
#[utoipa::path(
    post,
    path = "/playlists",
    request_body = CreatePlaylistRequest,
    responses(
        (status = 201, description = "Created", body = PlaylistEnvelope),
        (status = 400, description = "Name missing", body = ErrorBody)
    )
)]
pub async fn create_playlist(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PlaylistEnvelope>)> {
    let req = body(payload)?;
    let playlist = state
        .playlists
        .create(id, req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(PlaylistEnvelope { playlist })))
}

/// liked_songs
///
/// [Authenticated Route] Songs of the requester's liked playlist.
#[utoipa::path(
    get,
    path = "/playlists/liked/songs",
    responses((status = 200, description = "Liked songs", body = SongsEnvelope))
)]
pub async fn liked_songs(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<SongsEnvelope>> {
    let songs = state.playlists.liked_songs(id).await?;
    Ok(Json(SongsEnvelope { songs }))
}

/// toggle_liked
///
/// [Authenticated Route] Likes the track when absent from the liked playlist, unlikes it
/// otherwise. `liked` reports the membership after the call.
#[utoipa::path(
    post,
    path = "/playlists/liked/toggle",
    request_body = SongRequest,
    responses(
        (status = 200, description = "Toggled", body = ToggleLikeResponse),
        (status = 409, description = "Concurrent modification", body = ErrorBody)
    )
)]
pub async fn toggle_liked(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<SongRequest>, JsonRejection>,
) -> AppResult<Json<ToggleLikeResponse>> {
    let song = body(payload)?.into_song()?;
    let (liked, playlist) = state.playlists.toggle_liked(id, song).await?;
    Ok(Json(ToggleLikeResponse { liked, playlist }))
}

/// get_playlist
///
/// [Authenticated Route] A single playlist. Owner-only.
#[utoipa::path(
    get,
    path = "/playlists/{id}",
    params(("id" = String, Path, description = "Playlist ID")),
    responses(
        (status = 200, description = "Found", body = PlaylistEnvelope),
        (status = 403, description = "Not owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_playlist(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PlaylistEnvelope>> {
    let playlist = state.playlists.get(parse_id(&id)?, user_id).await?;
    Ok(Json(PlaylistEnvelope { playlist }))
}

/// update_playlist
///
/// [Authenticated Route] Renames or re-describes an owned playlist.
#[utoipa::path(
    put,
    path = "/playlists/{id}",
    params(("id" = String, Path, description = "Playlist ID")),
    request_body = UpdatePlaylistRequest,
    responses(
        (status = 200, description = "Updated", body = PlaylistEnvelope),
        (status = 403, description = "Not owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn update_playlist(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePlaylistRequest>, JsonRejection>,
) -> AppResult<Json<PlaylistEnvelope>> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    let playlist = state.playlists.update(id, user_id, patch).await?;
    Ok(Json(PlaylistEnvelope { playlist }))
}

/// delete_playlist
///
/// [Authenticated Route] Deletes an owned playlist. The liked playlist is protected.
#[utoipa::path(
    delete,
    path = "/playlists/{id}",
    params(("id" = String, Path, description = "Playlist ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Liked playlist", body = ErrorBody),
        (status = 403, description = "Not owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_playlist(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.playlists.delete(parse_id(&id)?, user_id).await?;
    Ok(Json(MessageResponse {
        message: "playlist deleted".to_string(),
    }))
}

/// add_song
///
/// [Authenticated Route] Appends a song to an owned playlist; duplicates are rejected.
#[utoipa::path(
    post,
    path = "/playlists/{id}/songs",
    params(("id" = String, Path, description = "Playlist ID")),
    request_body = SongRequest,
    responses(
        (status = 200, description = "Added", body = PlaylistEnvelope),
        (status = 409, description = "Duplicate song", body = ErrorBody)
    )
)]
pub async fn add_song(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SongRequest>, JsonRejection>,
) -> AppResult<Json<PlaylistEnvelope>> {
    let id = parse_id(&id)?;
    let song = body(payload)?.into_song()?;
    let playlist = state.playlists.add_song(id, user_id, song).await?;
    Ok(Json(PlaylistEnvelope { playlist }))
}

/// remove_song
///
/// [Authenticated Route] Removes a song, by external track id, from an owned playlist.
#[utoipa::path(
    delete,
    path = "/playlists/{id}/songs/{track_id}",
    params(
        ("id" = String, Path, description = "Playlist ID"),
        ("track_id" = String, Path, description = "External track ID")
    ),
    responses(
        (status = 200, description = "Removed", body = PlaylistEnvelope),
        (status = 404, description = "Playlist or song not found", body = ErrorBody)
    )
)]
pub async fn remove_song(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((id, track_id)): Path<(String, String)>,
) -> AppResult<Json<PlaylistEnvelope>> {
    let playlist = state
        .playlists
        .remove_song(parse_id(&id)?, user_id, &track_id)
        .await?;
    Ok(Json(PlaylistEnvelope { playlist }))
}

// --- Admin Handlers ---

/// list_users
///
/// [Admin Route] All users newest first, optionally filtered.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Users", body = UsersEnvelope),
        (status = 403, description = "Not admin", body = ErrorBody)
    )
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<UsersEnvelope>> {
    let users = state.credentials.list_users(filter.search.as_deref()).await?;
    Ok(Json(UsersEnvelope { users }))
}

/// get_user
///
/// [Admin Route] A single user.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserEnvelope),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserEnvelope>> {
    let user = state.credentials.get_user(parse_id(&id)?).await?;
    Ok(Json(UserEnvelope {
        user: UserView::from(user),
    }))
}

/// update_user
///
/// [Admin Route] Partial update of name, email and role.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UpdatedUserResponse),
        (status = 400, description = "Invalid id or role", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 409, description = "Email in use", body = ErrorBody)
    )
)]
pub async fn update_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<UpdatedUserResponse>> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    let user = state.credentials.update_user(id, patch).await?;
    Ok(Json(UpdatedUserResponse {
        message: "user updated".to_string(),
        user: UserView::from(user),
    }))
}

/// delete_user
///
/// [Admin Route] Deletes a user and their playlists. Self-deletion is refused.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = DeletedUserResponse),
        (status = 400, description = "Invalid id or own account", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedUserResponse>> {
    let user = state
        .credentials
        .delete_user(parse_id(&id)?, admin.id)
        .await?;
    Ok(Json(DeletedUserResponse {
        message: "user deleted".to_string(),
        deleted_user: DeletedUser {
            id: user.id,
            email: user.email,
        },
    }))
}

/// get_admin_stats
///
/// [Admin Route] User counters and the five newest accounts.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminStats))
)]
pub async fn get_admin_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminStats>> {
    Ok(Json(state.credentials.stats().await?))
}
