use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

// --- Core Application Schemas ---

/// Role
///
/// The RBAC field. Registration always yields `User`; `Admin` comes only from the
/// seeding routine or an admin update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Validation("role must be 'user' or 'admin'".to_string())),
        }
    }
}

/// UserRecord
///
/// The stored user, password hash included. Never serialized to clients; handlers
/// convert it into `UserView` first.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    // Always trimmed and lowercased before it reaches the store.
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// The name shown to clients, falling back to the local part of the email.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// UserView
///
/// The public projection of a user (no password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.display_name(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self::from(&user)
    }
}

/// Song
///
/// A track reference embedded in a playlist. `track_id` is the external catalogue id and is
/// unique within its playlist. The wire names follow the mobile client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Song {
    #[serde(rename = "jamendoId")]
    pub track_id: String,
    #[serde(rename = "name")]
    pub title: String,
    pub artist_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(rename = "addedAt")]
    #[ts(type = "string")]
    pub added_at: DateTime<Utc>,
}

/// SongList
///
/// The ordered, track-id-unique song collection owned by a playlist. Every mutation is a pure
/// transformation; persisting the result is the caller's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SongList(Vec<Song>);

impl SongList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Song] {
        &self.0
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.position(track_id).is_some()
    }

    fn position(&self, track_id: &str) -> Option<usize> {
        self.0.iter().position(|s| s.track_id == track_id)
    }

    /// Appends the song; the list is untouched when the track id is already present.
    pub fn add(&mut self, song: Song) -> AppResult<()> {
        if self.contains(&song.track_id) {
            return Err(AppError::DuplicateSong);
        }
        self.0.push(song);
        Ok(())
    }

    pub fn remove(&mut self, track_id: &str) -> AppResult<Song> {
        let index = self.position(track_id).ok_or(AppError::SongNotFound)?;
        Ok(self.0.remove(index))
    }

    /// Removes the song if present, appends it otherwise. Returns the membership after the toggle.
    pub fn toggle(&mut self, song: Song) -> bool {
        match self.position(&song.track_id) {
            Some(index) => {
                self.0.remove(index);
                false
            }
            None => {
                self.0.push(song);
                true
            }
        }
    }
}

impl From<Vec<Song>> for SongList {
    /// Keeps the first occurrence of each track id.
    fn from(songs: Vec<Song>) -> Self {
        let mut list = SongList::new();
        for song in songs {
            let _ = list.add(song);
        }
        list
    }
}

pub const LIKED_PLAYLIST_NAME: &str = "Liked Songs";
pub const LIKED_PLAYLIST_DESCRIPTION: &str = "Your favourite tracks";

/// Playlist
///
/// One stored document: metadata plus the embedded song list. `version` backs the
/// version-checked write and is not part of the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Playlist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_liked: bool,
    pub songs: SongList,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: i64,
}

impl Playlist {
    /// A regular, empty playlist. `is_liked` is always false here.
    pub fn new(user_id: Uuid, name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            description,
            is_liked: false,
            songs: SongList::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The per-user liked playlist.
    pub fn liked_for(user_id: Uuid) -> Self {
        Self {
            is_liked: true,
            ..Self::new(
                user_id,
                LIKED_PLAYLIST_NAME.to_string(),
                LIKED_PLAYLIST_DESCRIPTION.to_string(),
            )
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Listing order: liked playlist first, then newest first.
pub fn order_for_listing(playlists: &mut [Playlist]) {
    playlists.sort_by(|a, b| {
        b.is_liked
            .cmp(&a.is_liked)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input for POST /auth/register. Fields are optional so that missing values produce the
/// validation message rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// UpdateUserRequest
///
/// Partial update for PUT /admin/users/{id}. Only the provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// CreatePlaylistRequest
///
/// Any client-supplied `isLiked` is ignored: the field does not exist here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatePlaylistRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// SongRequest
///
/// Song input for add and toggle. `addedAt` is stamped by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SongRequest {
    #[serde(rename = "jamendoId")]
    pub track_id: Option<String>,
    #[serde(rename = "name")]
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub image: Option<String>,
    pub album_image: Option<String>,
    pub audio: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SongRequest {
    /// Validates the required fields and stamps `added_at`.
    pub fn into_song(self) -> AppResult<Song> {
        let incomplete = || AppError::Validation("incomplete song data".to_string());
        Ok(Song {
            track_id: non_blank(self.track_id).ok_or_else(incomplete)?,
            title: non_blank(self.title).ok_or_else(incomplete)?,
            artist_name: non_blank(self.artist_name).ok_or_else(incomplete)?,
            image: non_blank(self.image),
            album_image: non_blank(self.album_image),
            audio: non_blank(self.audio),
            added_at: Utc::now(),
        })
    }
}

// --- Response Payloads (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserEnvelope {
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UsersEnvelope {
    pub users: Vec<UserView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatedUserResponse {
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeletedUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeletedUserResponse {
    pub message: String,
    pub deleted_user: DeletedUser,
}

/// AdminStats
///
/// Output schema for GET /admin/stats.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_admins: i64,
    pub recent_users: Vec<UserView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PlaylistEnvelope {
    pub playlist: Playlist,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PlaylistsEnvelope {
    pub playlists: Vec<Playlist>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SongsEnvelope {
    pub songs: SongList,
}

/// ToggleLikeResponse
///
/// `liked` is the membership of the track after the toggle.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ToggleLikeResponse {
    pub liked: bool,
    pub playlist: Playlist,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    pub env: String,
}
