//! Playlist distante simulée en mémoire

use super::RemotePlaylist;
use crate::error::RemoteError;
use crate::order::Item;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    items: Vec<Item>,
    relocate_calls: usize,
    failures: HashMap<usize, RemoteError>,
}

/// Playlist en mémoire implémentant [`RemotePlaylist`]
///
/// Les échecs sont programmés par numéro d'appel à `relocate` (à partir de 1),
/// ce qui permet de rejouer un épuisement de quota au milieu d'un plan.
#[derive(Debug)]
pub struct MemoryPlaylist {
    id: String,
    state: Mutex<MemoryState>,
}

impl MemoryPlaylist {
    pub fn new(id: impl Into<String>, items: Vec<Item>) -> Self {
        let mut items = items;
        renumber(&mut items);
        Self {
            id: id.into(),
            state: Mutex::new(MemoryState {
                items,
                ..MemoryState::default()
            }),
        }
    }

    /// Programme un échec pour le `call`-ième appel à `relocate`
    pub fn fail_on(self, call: usize, error: RemoteError) -> Self {
        self.lock().failures.insert(call, error);
        self
    }

    /// Identifiants dans l'ordre distant actuel
    pub fn ids(&self) -> Vec<String> {
        self.lock().items.iter().map(|item| item.id.clone()).collect()
    }

    /// Nombre d'appels à `relocate` reçus (réussis ou non)
    pub fn relocate_calls(&self) -> usize {
        self.lock().relocate_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemotePlaylist for MemoryPlaylist {
    fn playlist_id(&self) -> &str {
        &self.id
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, RemoteError> {
        Ok(self.lock().items.clone())
    }

    async fn relocate(
        &self,
        handle: &str,
        item_id: &str,
        position: usize,
    ) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.relocate_calls += 1;

        let call = state.relocate_calls;
        if let Some(error) = state.failures.remove(&call) {
            return Err(error);
        }

        let from = state
            .items
            .iter()
            .position(|item| item.handle.as_deref() == Some(handle))
            .ok_or_else(|| RemoteError::rejected(format!("playlist item not found: {}", handle)))?;

        if state.items[from].id != item_id {
            return Err(RemoteError::rejected(format!(
                "handle {} does not reference item {}",
                handle, item_id
            )));
        }
        if position >= state.items.len() {
            return Err(RemoteError::rejected(format!(
                "position {} out of range",
                position
            )));
        }

        let item = state.items.remove(from);
        state.items.insert(position, item);
        renumber(&mut state.items);
        Ok(())
    }
}

fn renumber(items: &mut [Item]) {
    for (position, item) in items.iter_mut().enumerate() {
        item.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist() -> MemoryPlaylist {
        MemoryPlaylist::new(
            "PL1",
            vec![
                Item::with_handle("A", "hA"),
                Item::with_handle("B", "hB"),
                Item::with_handle("C", "hC"),
            ],
        )
    }

    #[tokio::test]
    async fn test_relocate_moves_item() {
        let remote = playlist();
        remote.relocate("hC", "C", 0).await.unwrap();
        assert_eq!(remote.ids(), vec!["C", "A", "B"]);

        let items = remote.fetch_items().await.unwrap();
        assert_eq!(items[2].position, 2);
        assert_eq!(remote.relocate_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let remote = playlist().fail_on(2, RemoteError::quota("quotaExceeded"));
        remote.relocate("hA", "A", 2).await.unwrap();
        let err = remote.relocate("hB", "B", 2).await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(remote.ids(), vec!["B", "C", "A"]);

        remote.relocate("hB", "B", 2).await.unwrap();
        assert_eq!(remote.relocate_calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_rejected() {
        let remote = playlist();
        let err = remote.relocate("hZ", "Z", 0).await.unwrap_err();
        assert_eq!(err.kind, crate::RemoteErrorKind::Rejected);
        let err = remote.relocate("hA", "B", 0).await.unwrap_err();
        assert_eq!(err.kind, crate::RemoteErrorKind::Rejected);
    }
}
