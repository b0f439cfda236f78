//! Collaborateurs distants : source de l'ordre courant et primitive de déplacement
//!
//! Le trait [`RemotePlaylist`] est la seule frontière entre l'exécuteur et le
//! service distant. Deux implémentations sont fournies :
//! - [`MemoryPlaylist`] : playlist en mémoire avec échecs programmables ;
//! - [`YoutubeClient`] : API YouTube Data v3 (`playlistItems`).

mod memory;
mod youtube;

pub use memory::MemoryPlaylist;
pub use youtube::{YoutubeClient, DEFAULT_API_BASE};

use crate::error::RemoteError;
use crate::order::Item;
use async_trait::async_trait;

/// Playlist hébergée par un service distant
#[async_trait]
pub trait RemotePlaylist: Send + Sync {
    /// Identifiant de la playlist côté service
    fn playlist_id(&self) -> &str;

    /// Récupère les éléments dans l'ordre distant actuel
    async fn fetch_items(&self) -> Result<Vec<Item>, RemoteError>;

    /// Place l'élément désigné par `handle` à la position finale `position`
    ///
    /// `item_id` est l'identifiant métier de l'élément, que certaines API
    /// exigent en plus du handle.
    async fn relocate(&self, handle: &str, item_id: &str, position: usize)
    -> Result<(), RemoteError>;
}
