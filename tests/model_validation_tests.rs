use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use opensound_backend::{
    AppError,
    error::handle_layer_error,
    models::{
        LIKED_PLAYLIST_NAME, Playlist, Role, Song, SongList, SongRequest, UserRecord, UserView,
        order_for_listing,
    },
};
use uuid::Uuid;

fn song(track_id: &str) -> Song {
    Song {
        track_id: track_id.to_string(),
        title: format!("Track {track_id}"),
        artist_name: "Artist".to_string(),
        image: None,
        album_image: None,
        audio: Some(format!("https://cdn.example.com/{track_id}.mp3")),
        added_at: Utc::now(),
    }
}

// --- Wire Shapes ---

#[test]
fn test_song_uses_client_field_names() {
    let json = serde_json::to_value(song("123")).unwrap();

    assert_eq!(json["jamendoId"], "123");
    assert_eq!(json["name"], "Track 123");
    assert_eq!(json["artist_name"], "Artist");
    assert!(json.get("addedAt").is_some());
    // None fields are omitted.
    assert!(json.get("image").is_none());
    assert!(json.get("track_id").is_none());
}

#[test]
fn test_playlist_serialization_hides_version() {
    let mut playlist = Playlist::liked_for(Uuid::new_v4());
    playlist.version = 7;
    playlist.songs.add(song("1")).unwrap();

    let json = serde_json::to_value(&playlist).unwrap();

    assert_eq!(json["isLiked"], true);
    assert_eq!(json["name"], LIKED_PLAYLIST_NAME);
    assert!(json.get("userId").is_some());
    assert!(json.get("createdAt").is_some());
    assert!(json.get("version").is_none());
    assert_eq!(json["songs"].as_array().unwrap().len(), 1);
}

#[test]
fn test_user_view_omits_password_hash_and_falls_back_to_email_name() {
    let now = Utc::now();
    let record = UserRecord {
        id: Uuid::new_v4(),
        email: "dave@example.com".to_string(),
        name: None,
        password_hash: "$argon2id$secret".to_string(),
        role: Role::User,
        created_at: now,
        updated_at: now,
    };

    let view = UserView::from(&record);
    let json = serde_json::to_string(&view).unwrap();

    assert_eq!(view.name, "dave");
    assert!(json.contains(r#""role":"user""#));
    assert!(json.contains("createdAt"));
    assert!(!json.contains("argon2"));
    assert!(!json.contains("password"));
}

#[test]
fn test_role_parsing() {
    assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    assert_eq!("user".parse::<Role>().unwrap(), Role::User);
    assert!(matches!("root".parse::<Role>(), Err(AppError::Validation(_))));
    assert_eq!(Role::default(), Role::User);
}

// --- Song Input ---

#[test]
fn test_song_request_requires_id_name_and_artist() {
    let complete: SongRequest = serde_json::from_str(
        r#"{"jamendoId":"42","name":"Song","artist_name":"Band","image":"  "}"#,
    )
    .unwrap();
    let song = complete.into_song().unwrap();
    assert_eq!(song.track_id, "42");
    assert!(song.image.is_none());

    let incomplete: SongRequest =
        serde_json::from_str(r#"{"jamendoId":"42","name":"Song"}"#).unwrap();
    assert!(matches!(incomplete.into_song(), Err(AppError::Validation(_))));
}

// --- Song List Semantics ---

#[test]
fn test_song_list_rejects_duplicates_and_keeps_order() {
    let mut list = SongList::new();
    list.add(song("a")).unwrap();
    list.add(song("b")).unwrap();

    assert!(matches!(list.add(song("a")), Err(AppError::DuplicateSong)));
    let ids: Vec<&str> = list.iter().map(|s| s.track_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[test]
fn test_song_list_remove() {
    let mut list = SongList::from(vec![song("a"), song("b"), song("c")]);

    let removed = list.remove("b").unwrap();
    assert_eq!(removed.track_id, "b");
    assert!(matches!(list.remove("b"), Err(AppError::SongNotFound)));
    assert_eq!(list.len(), 2);
}

#[test]
fn test_song_list_toggle_twice_restores_membership() {
    let mut list = SongList::from(vec![song("a")]);

    assert!(list.toggle(song("x")));
    assert!(list.contains("x"));
    assert!(!list.toggle(song("x")));
    assert!(!list.contains("x"));
    assert_eq!(list.len(), 1);
}

#[test]
fn test_song_list_from_vec_drops_repeated_ids() {
    let list = SongList::from(vec![song("a"), song("a"), song("b")]);
    assert_eq!(list.len(), 2);
}

// --- Playlist Ordering ---

#[test]
fn test_liked_playlist_is_listed_first_then_newest() {
    let owner = Uuid::new_v4();
    let mut older = Playlist::new(owner, "Older".to_string(), String::new());
    older.created_at = Utc::now() - Duration::hours(2);
    let newer = Playlist::new(owner, "Newer".to_string(), String::new());
    let mut liked = Playlist::liked_for(owner);
    liked.created_at = Utc::now() - Duration::days(30);

    let mut playlists = vec![older, liked, newer];
    order_for_listing(&mut playlists);

    let names: Vec<&str> = playlists.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, [LIKED_PLAYLIST_NAME, "Newer", "Older"]);
}

// --- Error Mapping ---

#[test]
fn test_error_status_codes() {
    let cases = [
        (AppError::Validation("x".to_string()), StatusCode::BAD_REQUEST),
        (AppError::InvalidId, StatusCode::BAD_REQUEST),
        (AppError::ProtectedResource, StatusCode::BAD_REQUEST),
        (AppError::SelfDeleteForbidden, StatusCode::BAD_REQUEST),
        (AppError::MissingToken, StatusCode::UNAUTHORIZED),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::Forbidden("no"), StatusCode::FORBIDDEN),
        (AppError::NotFound("playlist"), StatusCode::NOT_FOUND),
        (AppError::SongNotFound, StatusCode::NOT_FOUND),
        (AppError::Conflict("taken"), StatusCode::CONFLICT),
        (AppError::Timeout, StatusCode::REQUEST_TIMEOUT),
        (AppError::DuplicateSong, StatusCode::CONFLICT),
        (AppError::Internal("db down".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (error, status) in cases {
        assert_eq!(error.status_code(), status, "{error:?}");
    }
}

#[test]
fn test_internal_error_detail_is_not_exposed() {
    let error = AppError::Internal("connection refused to 10.0.0.5".to_string());
    assert_eq!(error.public_message(), "internal server error");
    assert_eq!(AppError::NotFound("playlist").public_message(), "playlist not found");

    let response = error.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_elapsed_timeout_renders_408_envelope() {
    let err = handle_layer_error(Box::new(tower::timeout::error::Elapsed::new())).await;
    assert!(matches!(err, AppError::Timeout));

    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "request timed out");
}

#[tokio::test]
async fn test_other_layer_failures_are_internal() {
    let err = handle_layer_error("connection reset".into()).await;
    assert!(matches!(err, AppError::Internal(_)));
}
