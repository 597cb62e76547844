use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use opensound_backend::{
    AppConfig, AppError, AppState, MemoryRepository,
    auth::{AdminUser, AuthUser},
    handlers::{self, UserFilter},
    models::{
        CreatePlaylistRequest, RegisterRequest, Role, SongRequest, UpdatePlaylistRequest,
        UpdateUserRequest,
    },
};
use std::sync::Arc;

// --- Test Scaffolding ---

fn test_state() -> AppState {
    AppState::new(Arc::new(MemoryRepository::new()), AppConfig::default())
}

async fn register(state: &AppState, email: &str) -> AuthUser {
    let (status, Json(body)) = handlers::register(
        State(state.clone()),
        Ok(Json(RegisterRequest {
            email: Some(email.to_string()),
            password: Some("secret1".to_string()),
            name: None,
        })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    AuthUser::from(state.tokens.verify(&body.token).unwrap())
}

async fn admin(state: &AppState) -> AdminUser {
    state
        .credentials
        .seed_admin("root@x.com", "rootpass".to_string(), None)
        .await
        .unwrap();
    let user = state
        .credentials
        .login(Some("root@x.com".to_string()), Some("rootpass".to_string()))
        .await
        .unwrap();
    AdminUser(AuthUser::from(
        state.tokens.verify(&state.tokens.issue(&user).unwrap()).unwrap(),
    ))
}

fn song_request(track_id: &str) -> SongRequest {
    SongRequest {
        track_id: Some(track_id.to_string()),
        title: Some("Song".to_string()),
        artist_name: Some("Artist".to_string()),
        ..Default::default()
    }
}

// --- Public Handlers ---

#[tokio::test]
async fn test_health_reports_service_and_env() {
    let Json(health) = handlers::health(State(test_state())).await;

    assert!(health.ok);
    assert_eq!(health.service, "opensound-backend");
    assert_eq!(health.env, "local");
}

#[tokio::test]
async fn test_register_returns_token_for_new_user() {
    let state = test_state();
    let user = register(&state, "alice@x.com").await;

    assert_eq!(user.email, "alice@x.com");
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let state = test_state();
    register(&state, "alice@x.com").await;

    let err = handlers::login(
        State(state),
        Ok(Json(opensound_backend::models::LoginRequest {
            email: Some("alice@x.com".to_string()),
            password: Some("wrong!".to_string()),
        })),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized));
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_not_found_fallback() {
    let response = handlers::not_found().await.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Authenticated Handlers ---

#[tokio::test]
async fn test_get_me_reads_current_profile() {
    let state = test_state();
    let user = register(&state, "alice@x.com").await;

    let Json(envelope) = handlers::get_me(user.clone(), State(state)).await.unwrap();

    assert_eq!(envelope.user.id, user.id);
    assert_eq!(envelope.user.name, "alice");
}

#[tokio::test]
async fn test_playlist_crud_through_handlers() {
    let state = test_state();
    let user = register(&state, "alice@x.com").await;

    let (status, Json(created)) = handlers::create_playlist(
        user.clone(),
        State(state.clone()),
        Ok(Json(CreatePlaylistRequest {
            name: Some("Focus".to_string()),
            description: None,
        })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    let id = created.playlist.id.to_string();

    let Json(updated) = handlers::update_playlist(
        user.clone(),
        State(state.clone()),
        Path(id.clone()),
        Ok(Json(UpdatePlaylistRequest {
            name: Some("Deep Focus".to_string()),
            description: None,
        })),
    )
    .await
    .unwrap();
    assert_eq!(updated.playlist.name, "Deep Focus");

    let Json(with_song) = handlers::add_song(
        user.clone(),
        State(state.clone()),
        Path(id.clone()),
        Ok(Json(song_request("t9"))),
    )
    .await
    .unwrap();
    assert_eq!(with_song.playlist.songs.len(), 1);

    let Json(without_song) = handlers::remove_song(
        user.clone(),
        State(state.clone()),
        Path((id.clone(), "t9".to_string())),
    )
    .await
    .unwrap();
    assert!(without_song.playlist.songs.is_empty());

    let Json(listed) = handlers::list_playlists(user.clone(), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(listed.playlists.len(), 2);
    assert!(listed.playlists[0].is_liked);

    let Json(deleted) =
        handlers::delete_playlist(user.clone(), State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
    assert_eq!(deleted.message, "playlist deleted");
    let err = handlers::get_playlist(user, State(state), Path(id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_malformed_playlist_id_is_400() {
    let state = test_state();
    let user = register(&state, "alice@x.com").await;

    let err = handlers::get_playlist(user, State(state), Path("not-a-uuid".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidId));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_incomplete_song_is_400() {
    let state = test_state();
    let user = register(&state, "alice@x.com").await;

    let err = handlers::toggle_liked(
        user,
        State(state),
        Ok(Json(SongRequest {
            track_id: Some("t1".to_string()),
            ..Default::default()
        })),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_toggle_liked_then_liked_songs() {
    let state = test_state();
    let user = register(&state, "alice@x.com").await;

    let Json(first) = handlers::toggle_liked(
        user.clone(),
        State(state.clone()),
        Ok(Json(song_request("t1"))),
    )
    .await
    .unwrap();
    assert!(first.liked);

    let Json(songs) = handlers::liked_songs(user.clone(), State(state.clone()))
        .await
        .unwrap();
    assert!(songs.songs.contains("t1"));

    let Json(second) = handlers::toggle_liked(user, State(state), Ok(Json(song_request("t1"))))
        .await
        .unwrap();
    assert!(!second.liked);
    assert!(second.playlist.songs.is_empty());
}

// --- Admin Handlers ---

#[tokio::test]
async fn test_admin_user_management() {
    let state = test_state();
    let admin = admin(&state).await;
    let bob = register(&state, "bob@x.com").await;

    let Json(users) = handlers::list_users(
        admin.clone(),
        State(state.clone()),
        Query(UserFilter {
            search: Some("BOB".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(users.users.len(), 1);

    let Json(found) = handlers::get_user(admin.clone(), State(state.clone()), Path(bob.id.to_string()))
        .await
        .unwrap();
    assert_eq!(found.user.email, "bob@x.com");

    let Json(updated) = handlers::update_user(
        admin.clone(),
        State(state.clone()),
        Path(bob.id.to_string()),
        Ok(Json(UpdateUserRequest {
            name: Some("Robert".to_string()),
            ..Default::default()
        })),
    )
    .await
    .unwrap();
    assert_eq!(updated.user.name, "Robert");

    let Json(stats) = handlers::get_admin_stats(admin.clone(), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_admins, 1);

    let Json(deleted) = handlers::delete_user(admin.clone(), State(state.clone()), Path(bob.id.to_string()))
        .await
        .unwrap();
    assert_eq!(deleted.deleted_user.id, bob.id);

    let self_delete = handlers::delete_user(admin.clone(), State(state), Path(admin.0.id.to_string()))
        .await
        .unwrap_err();
    assert!(matches!(self_delete, AppError::SelfDeleteForbidden));
}
