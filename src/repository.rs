use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Playlist, Role, SongList, UserRecord},
};
use async_trait::async_trait;
use sqlx::{
    FromRow, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
    query_builder::QueryBuilder,
    types::Json,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract shared by the credential and playlist stores. Every method returns
/// a discriminated `AppResult`; implementations translate driver failures into `AppError`.
/// Each write is a single logical document mutation the backing store applies atomically.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<UserRecord>>;
    // `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;
    /// Inserts the user together with its liked playlist, all-or-nothing.
    /// Fails with `Conflict` when the email is taken.
    async fn create_user_with_liked_playlist(
        &self,
        user: UserRecord,
        liked: Playlist,
    ) -> AppResult<UserRecord>;
    /// Newest first. `search` is a case-insensitive substring matched against name and email.
    async fn list_users(&self, search: Option<&str>, limit: Option<i64>) -> AppResult<Vec<UserRecord>>;
    /// Writes name, email and role. `None` when the user no longer exists.
    async fn update_user(&self, user: &UserRecord) -> AppResult<Option<UserRecord>>;
    /// Removes the user and every playlist it owns.
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;
    async fn count_users(&self, role: Option<Role>) -> AppResult<i64>;

    // --- Playlists ---
    async fn list_playlists(&self, user_id: Uuid) -> AppResult<Vec<Playlist>>;
    async fn get_playlist(&self, id: Uuid) -> AppResult<Option<Playlist>>;
    async fn get_liked_playlist(&self, user_id: Uuid) -> AppResult<Option<Playlist>>;
    async fn insert_playlist(&self, playlist: &Playlist) -> AppResult<Playlist>;
    /// Version-checked write of name, description and songs. Fails with `Conflict` when the
    /// stored version no longer matches `playlist.version`.
    async fn save_playlist(&self, playlist: &Playlist) -> AppResult<Playlist>;
    async fn delete_playlist(&self, id: Uuid) -> AppResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const EMAIL_TAKEN: &str = "email is already registered";
const CONCURRENT_PLAYLIST_WRITE: &str = "playlist was modified concurrently, retry";

/// Escapes LIKE metacharacters so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn map_unique_violation(err: sqlx::Error, message: &'static str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message),
        // Only playlist inserts reference another row.
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::NotFound("user"),
        _ => AppError::from(err),
    }
}

// --- Row Mapping ---

impl<'r> FromRow<'r, PgRow> for UserRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            role: role
                .parse()
                .map_err(|e: AppError| sqlx::Error::Decode(e.to_string().into()))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Playlist {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let Json(songs): Json<SongList> = row.try_get("songs")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            is_liked: row.try_get("is_liked")?,
            songs,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at";
const PLAYLIST_COLUMNS: &str =
    "id, user_id, name, description, is_liked, songs, created_at, updated_at, version";

/// Opens the process-wide connection pool.
pub async fn connect_pool(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.request_timeout)
        .connect(&config.db_url)
        .await
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// PostgresRepository
///
/// The production implementation. Playlists are one row each with the song list embedded as
/// JSONB, so every playlist mutation stays a single-row write.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_playlist_with<'e, E>(executor: E, playlist: &Playlist) -> AppResult<Playlist>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = format!(
            "INSERT INTO playlists ({PLAYLIST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {PLAYLIST_COLUMNS}"
        );
        sqlx::query_as::<_, Playlist>(&sql)
            .bind(playlist.id)
            .bind(playlist.user_id)
            .bind(&playlist.name)
            .bind(&playlist.description)
            .bind(playlist.is_liked)
            .bind(Json(&playlist.songs))
            .bind(playlist.created_at)
            .bind(playlist.updated_at)
            .bind(playlist.version)
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "user already has a liked playlist"))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_user_with_liked_playlist
    ///
    /// Both inserts share one transaction; the unique index on `email` enforces uniqueness at
    /// write time even when two registrations race.
    async fn create_user_with_liked_playlist(
        &self,
        user: UserRecord,
        liked: Playlist,
    ) -> AppResult<UserRecord> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, EMAIL_TAKEN))?;

        Self::insert_playlist_with(&mut *tx, &liked).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn list_users(&self, search: Option<&str>, limit: Option<i64>) -> AppResult<Vec<UserRecord>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));

        if let Some(term) = search.filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            builder.push(" WHERE (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        Ok(builder
            .build_query_as::<UserRecord>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_user(&self, user: &UserRecord) -> AppResult<Option<UserRecord>> {
        let sql = format!(
            "UPDATE users SET email = $2, name = $3, role = $4, updated_at = $5 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "email is already in use"))
    }

    /// delete_user
    ///
    /// Owned playlists go with the user through `ON DELETE CASCADE`.
    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_users(&self, role: Option<Role>) -> AppResult<i64> {
        let count = match role {
            Some(role) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
                    .bind(role.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn list_playlists(&self, user_id: Uuid) -> AppResult<Vec<Playlist>> {
        let sql = format!(
            "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE user_id = $1 ORDER BY is_liked DESC, created_at DESC"
        );
        Ok(sqlx::query_as::<_, Playlist>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_playlist(&self, id: Uuid) -> AppResult<Option<Playlist>> {
        let sql = format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = $1");
        Ok(sqlx::query_as::<_, Playlist>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_liked_playlist(&self, user_id: Uuid) -> AppResult<Option<Playlist>> {
        let sql = format!(
            "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE user_id = $1 AND is_liked = true"
        );
        Ok(sqlx::query_as::<_, Playlist>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_playlist(&self, playlist: &Playlist) -> AppResult<Playlist> {
        Self::insert_playlist_with(&self.pool, playlist).await
    }

    /// save_playlist
    ///
    /// Optimistic concurrency: the `WHERE version = $2` guard turns a lost race into zero
    /// affected rows, reported as `Conflict`.
    async fn save_playlist(&self, playlist: &Playlist) -> AppResult<Playlist> {
        let sql = format!(
            r#"
            UPDATE playlists
            SET name = $3,
                description = $4,
                songs = $5,
                updated_at = $6,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {PLAYLIST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Playlist>(&sql)
            .bind(playlist.id)
            .bind(playlist.version)
            .bind(&playlist.name)
            .bind(&playlist.description)
            .bind(Json(&playlist.songs))
            .bind(playlist.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::Conflict(CONCURRENT_PLAYLIST_WRITE))
    }

    async fn delete_playlist(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM playlists WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// MemoryRepository
///
/// An in-process document store with the same contract as `PostgresRepository`: unique
/// emails, cascading user deletes and version-checked playlist writes. Used by the test
/// suites and for running the service without a database.
#[derive(Default)]
pub struct MemoryRepository {
    data: RwLock<MemoryData>,
}

#[derive(Default)]
struct MemoryData {
    // Insertion order is kept so ties on `created_at` resolve newest-inserted first.
    users: Vec<UserRecord>,
    playlists: Vec<Playlist>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(user: &UserRecord, term: &str) -> bool {
    let term = term.to_lowercase();
    user.email.to_lowercase().contains(&term)
        || user
            .name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&term))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<UserRecord>> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user_with_liked_playlist(
        &self,
        user: UserRecord,
        liked: Playlist,
    ) -> AppResult<UserRecord> {
        let mut data = self.data.write().await;
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(EMAIL_TAKEN));
        }
        data.users.push(user.clone());
        data.playlists.push(liked);
        Ok(user)
    }

    async fn list_users(&self, search: Option<&str>, limit: Option<i64>) -> AppResult<Vec<UserRecord>> {
        let data = self.data.read().await;
        let mut users: Vec<UserRecord> = data
            .users
            .iter()
            .rev()
            .filter(|u| search.filter(|t| !t.is_empty()).is_none_or(|t| matches_search(u, t)))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            users.truncate(limit.max(0) as usize);
        }
        Ok(users)
    }

    async fn update_user(&self, user: &UserRecord) -> AppResult<Option<UserRecord>> {
        let mut data = self.data.write().await;
        if data
            .users
            .iter()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(AppError::Conflict("email is already in use"));
        }
        let Some(stored) = data.users.iter_mut().find(|u| u.id == user.id) else {
            return Ok(None);
        };
        stored.email = user.email.clone();
        stored.name = user.name.clone();
        stored.role = user.role;
        stored.updated_at = user.updated_at;
        Ok(Some(stored.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut data = self.data.write().await;
        let before = data.users.len();
        data.users.retain(|u| u.id != id);
        let removed = data.users.len() != before;
        if removed {
            data.playlists.retain(|p| p.user_id != id);
        }
        Ok(removed)
    }

    async fn count_users(&self, role: Option<Role>) -> AppResult<i64> {
        let data = self.data.read().await;
        let count = data
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .count();
        Ok(count as i64)
    }

    async fn list_playlists(&self, user_id: Uuid) -> AppResult<Vec<Playlist>> {
        let data = self.data.read().await;
        Ok(data
            .playlists
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_playlist(&self, id: Uuid) -> AppResult<Option<Playlist>> {
        let data = self.data.read().await;
        Ok(data.playlists.iter().find(|p| p.id == id).cloned())
    }

    async fn get_liked_playlist(&self, user_id: Uuid) -> AppResult<Option<Playlist>> {
        let data = self.data.read().await;
        Ok(data
            .playlists
            .iter()
            .find(|p| p.user_id == user_id && p.is_liked)
            .cloned())
    }

    async fn insert_playlist(&self, playlist: &Playlist) -> AppResult<Playlist> {
        let mut data = self.data.write().await;
        if !data.users.iter().any(|u| u.id == playlist.user_id) {
            return Err(AppError::NotFound("user"));
        }
        if playlist.is_liked
            && data
                .playlists
                .iter()
                .any(|p| p.user_id == playlist.user_id && p.is_liked)
        {
            return Err(AppError::Conflict("user already has a liked playlist"));
        }
        data.playlists.push(playlist.clone());
        Ok(playlist.clone())
    }

    async fn save_playlist(&self, playlist: &Playlist) -> AppResult<Playlist> {
        let mut data = self.data.write().await;
        let stored = data
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist.id && p.version == playlist.version)
            .ok_or(AppError::Conflict(CONCURRENT_PLAYLIST_WRITE))?;
        stored.name = playlist.name.clone();
        stored.description = playlist.description.clone();
        stored.songs = playlist.songs.clone();
        stored.updated_at = playlist.updated_at;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn delete_playlist(&self, id: Uuid) -> AppResult<bool> {
        let mut data = self.data.write().await;
        let before = data.playlists.len();
        data.playlists.retain(|p| p.id != id);
        Ok(data.playlists.len() != before)
    }
}
