use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Routes for any holder of a valid bearer token. The router is wrapped in `auth_middleware`,
/// so every handler receives a verified `AuthUser`; ownership of playlists is checked in the
/// playlist store against that identity.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // GET/POST /playlists
        .route(
            "/playlists",
            get(handlers::list_playlists).post(handlers::create_playlist),
        )
        // --- Liked Playlist ---
        // Static segments take priority over `/playlists/{id}` below.
        .route("/playlists/liked/songs", get(handlers::liked_songs))
        .route("/playlists/liked/toggle", post(handlers::toggle_liked))
        // --- Owned Playlists ---
        .route(
            "/playlists/{id}",
            get(handlers::get_playlist)
                .put(handlers::update_playlist)
                .delete(handlers::delete_playlist),
        )
        .route("/playlists/{id}/songs", post(handlers::add_song))
        .route(
            "/playlists/{id}/songs/{track_id}",
            delete(handlers::remove_song),
        )
}
