use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Playlist, Song, SongList, UpdatePlaylistRequest, order_for_listing},
    repository::RepositoryState,
};

/// PlaylistStore
///
/// Owner-scoped playlist operations. Every mutation loads the document, applies a pure
/// transformation and persists it with one version-checked write.
#[derive(Clone)]
pub struct PlaylistStore {
    repo: RepositoryState,
}

impl PlaylistStore {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Liked playlist first, then the rest newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Playlist>> {
        let mut playlists = self.repo.list_playlists(user_id).await?;
        order_for_listing(&mut playlists);
        Ok(playlists)
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> AppResult<Playlist> {
        let name = required_name(name)?;
        let description = description.unwrap_or_default().trim().to_string();

        let playlist = self
            .repo
            .insert_playlist(&Playlist::new(user_id, name, description))
            .await?;
        tracing::info!(playlist_id = %playlist.id, user_id = %user_id, "playlist created");
        Ok(playlist)
    }

    /// get
    ///
    /// Ownership check: the requester must own the playlist.
    pub async fn get(&self, id: Uuid, requester_id: Uuid) -> AppResult<Playlist> {
        let playlist = self
            .repo
            .get_playlist(id)
            .await?
            .ok_or(AppError::NotFound("playlist"))?;
        if !playlist.is_owned_by(requester_id) {
            return Err(AppError::Forbidden(
                "you do not have permission to access this playlist",
            ));
        }
        Ok(playlist)
    }

    /// update
    ///
    /// Only name and description are mutable.
    pub async fn update(
        &self,
        id: Uuid,
        requester_id: Uuid,
        patch: UpdatePlaylistRequest,
    ) -> AppResult<Playlist> {
        let mut playlist = self.get(id, requester_id).await?;
        if let Some(name) = patch.name {
            playlist.name = required_name(Some(name))?;
        }
        if let Some(description) = patch.description {
            playlist.description = description.trim().to_string();
        }
        self.persist(playlist).await
    }

    /// delete
    ///
    /// The liked playlist is rejected even for its owner.
    pub async fn delete(&self, id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let playlist = self.get(id, requester_id).await?;
        if playlist.is_liked {
            return Err(AppError::ProtectedResource);
        }
        if !self.repo.delete_playlist(id).await? {
            return Err(AppError::NotFound("playlist"));
        }
        tracing::info!(playlist_id = %id, user_id = %requester_id, "playlist deleted");
        Ok(())
    }

    pub async fn add_song(&self, id: Uuid, requester_id: Uuid, song: Song) -> AppResult<Playlist> {
        let mut playlist = self.get(id, requester_id).await?;
        playlist.songs.add(song)?;
        self.persist(playlist).await
    }

    pub async fn remove_song(&self, id: Uuid, requester_id: Uuid, track_id: &str) -> AppResult<Playlist> {
        let mut playlist = self.get(id, requester_id).await?;
        playlist.songs.remove(track_id)?;
        self.persist(playlist).await
    }

    async fn liked_playlist(&self, requester_id: Uuid) -> AppResult<Playlist> {
        self.repo
            .get_liked_playlist(requester_id)
            .await?
            .ok_or(AppError::NotFound("liked playlist"))
    }

    pub async fn liked_songs(&self, requester_id: Uuid) -> AppResult<SongList> {
        Ok(self.liked_playlist(requester_id).await?.songs)
    }

    /// toggle_liked
    ///
    /// Removes the track from the requester's liked playlist when present, appends it
    /// otherwise. Returns the post-toggle membership and the saved playlist.
    pub async fn toggle_liked(&self, requester_id: Uuid, song: Song) -> AppResult<(bool, Playlist)> {
        let mut playlist = self.liked_playlist(requester_id).await?;
        let track_id = song.track_id.clone();
        let liked = playlist.songs.toggle(song);
        let playlist = self.persist(playlist).await?;
        tracing::debug!(user_id = %requester_id, %track_id, liked, "liked toggled");
        Ok((liked, playlist))
    }

    /// ensure_liked_playlists
    ///
    /// Creates the liked playlist for every user that lacks one. Returns how many were created.
    pub async fn ensure_liked_playlists(&self) -> AppResult<usize> {
        let mut created = 0;
        for user in self.repo.list_users(None, None).await? {
            if self.repo.get_liked_playlist(user.id).await?.is_some() {
                continue;
            }
            self.repo.insert_playlist(&Playlist::liked_for(user.id)).await?;
            tracing::info!(user_id = %user.id, "liked playlist backfilled");
            created += 1;
        }
        Ok(created)
    }

    async fn persist(&self, mut playlist: Playlist) -> AppResult<Playlist> {
        playlist.touch();
        self.repo.save_playlist(&playlist).await
    }
}

fn required_name(name: Option<String>) -> AppResult<String> {
    name.map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("name is required".to_string()))
}
