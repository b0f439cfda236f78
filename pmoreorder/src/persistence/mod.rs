//! Persistance SQLite des snapshots de playlists

mod snapshot;

pub use snapshot::{Snapshot, SnapshotRecord};

use crate::order::{ItemMetadata, Order};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Magasin de snapshots (une base pour toutes les playlists)
pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Ouvre (ou crée) la base de snapshots
    pub fn new(db_path: &Path) -> Result<Self> {
        // Créer le répertoire parent si nécessaire
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::PersistenceError(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::PersistenceError(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS playlists (
                id TEXT PRIMARY KEY,
                title TEXT,
                created_at INTEGER NOT NULL,
                last_modified INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS items (
                playlist_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                item_id TEXT NOT NULL,
                handle TEXT,
                title TEXT,
                recorded_at TEXT,
                published_at TEXT,
                PRIMARY KEY (playlist_id, position),
                FOREIGN KEY (playlist_id) REFERENCES playlists(id) ON DELETE CASCADE
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_items_item ON items(playlist_id, item_id);",
        )
        .map_err(|e| Error::PersistenceError(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::PersistenceError("Snapshot database lock poisoned".into()))
    }

    /// Réécrit intégralement le snapshot d'une playlist
    ///
    /// L'écriture est transactionnelle : un snapshot est soit l'ancien, soit
    /// le nouveau, jamais un mélange des deux.
    pub async fn save_snapshot(&self, playlist_id: &str, title: Option<&str>, order: &Order) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::PersistenceError(format!("Failed to begin transaction: {}", e)))?;

        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64;

        tx.execute(
            "INSERT INTO playlists (id, title, created_at, last_modified)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
                title = COALESCE(excluded.title, playlists.title),
                last_modified = excluded.last_modified",
            params![playlist_id, title, now_nanos],
        )
        .map_err(|e| Error::PersistenceError(format!("Failed to save playlist: {}", e)))?;

        tx.execute("DELETE FROM items WHERE playlist_id = ?1", params![playlist_id])
            .map_err(|e| Error::PersistenceError(format!("Failed to delete old items: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO items (playlist_id, position, item_id, handle, title, recorded_at, published_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| {
                    Error::PersistenceError(format!("Failed to prepare statement: {}", e))
                })?;

            for item in order.items() {
                stmt.execute(params![
                    playlist_id,
                    item.position as i64,
                    &item.id,
                    &item.handle,
                    &item.metadata.title,
                    item.metadata.recorded_at.map(|t| t.to_rfc3339()),
                    item.metadata.published_at.map(|t| t.to_rfc3339()),
                ])
                .map_err(|e| Error::PersistenceError(format!("Failed to insert item: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::PersistenceError(format!("Failed to commit snapshot: {}", e)))?;

        debug!(playlist = playlist_id, items = order.len(), "Snapshot saved");
        Ok(())
    }

    /// Charge le snapshot d'une playlist
    pub async fn load_snapshot(&self, playlist_id: &str) -> Result<Option<Snapshot>> {
        let conn = self.lock()?;

        let header = conn.query_row(
            "SELECT title, last_modified FROM playlists WHERE id = ?1",
            params![playlist_id],
            |row| {
                let title: Option<String> = row.get(0)?;
                let last_modified: i64 = row.get(1)?;
                Ok((title, last_modified))
            },
        );

        let (title, last_modified) = match header {
            Ok(data) => data,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => {
                return Err(Error::PersistenceError(format!(
                    "Failed to load playlist: {}",
                    e
                )))
            }
        };

        let mut stmt = conn
            .prepare(
                "SELECT position, item_id, handle, title, recorded_at, published_at
                 FROM items WHERE playlist_id = ?1 ORDER BY position ASC",
            )
            .map_err(|e| Error::PersistenceError(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![playlist_id], |row| {
                let position: i64 = row.get(0)?;
                let recorded_at: Option<String> = row.get(4)?;
                let published_at: Option<String> = row.get(5)?;
                Ok(SnapshotRecord {
                    position: position as usize,
                    id: row.get(1)?,
                    handle: row.get(2)?,
                    metadata: ItemMetadata {
                        title: row.get(3)?,
                        recorded_at: recorded_at.as_deref().and_then(parse_timestamp),
                        published_at: published_at.as_deref().and_then(parse_timestamp),
                    },
                })
            })
            .map_err(|e| Error::PersistenceError(format!("Failed to query items: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::PersistenceError(format!("Failed to read item: {}", e)))?,
            );
        }

        Ok(Some(Snapshot {
            playlist_id: playlist_id.to_string(),
            title,
            updated_at: Some(DateTime::from_timestamp_nanos(last_modified)),
            records,
        }))
    }

    /// Charge l'ordre d'une playlist, ou échoue si aucun snapshot n'existe
    pub async fn load_order(&self, playlist_id: &str) -> Result<Order> {
        self.load_snapshot(playlist_id)
            .await?
            .ok_or_else(|| Error::SnapshotNotFound(playlist_id.to_string()))?
            .to_order()
    }

    /// Supprime le snapshot d'une playlist
    pub async fn delete_snapshot(&self, playlist_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM items WHERE playlist_id = ?1", params![playlist_id])
            .map_err(|e| Error::PersistenceError(format!("Failed to delete items: {}", e)))?;
        conn.execute("DELETE FROM playlists WHERE id = ?1", params![playlist_id])
            .map_err(|e| Error::PersistenceError(format!("Failed to delete playlist: {}", e)))?;
        Ok(())
    }

    /// Liste les playlists ayant un snapshot
    pub async fn list_playlist_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM playlists ORDER BY id")
            .map_err(|e| Error::PersistenceError(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::PersistenceError(format!("Failed to query playlists: {}", e)))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| Error::PersistenceError(format!("Failed to read id: {}", e)))?);
        }
        Ok(ids)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
