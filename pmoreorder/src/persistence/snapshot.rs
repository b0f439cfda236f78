//! Représentation persistée d'un ordre (SQLite et JSON)

use crate::order::{Item, ItemMetadata, Order};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Une ligne du snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub position: usize,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, flatten)]
    pub metadata: ItemMetadata,
}

impl From<&Item> for SnapshotRecord {
    fn from(item: &Item) -> Self {
        Self {
            position: item.position,
            id: item.id.clone(),
            handle: item.handle.clone(),
            metadata: item.metadata.clone(),
        }
    }
}

impl From<SnapshotRecord> for Item {
    fn from(record: SnapshotRecord) -> Self {
        Item {
            id: record.id,
            handle: record.handle,
            position: record.position,
            metadata: record.metadata,
        }
    }
}

/// État durable d'une playlist, réécrit intégralement après chaque déplacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub playlist_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub records: Vec<SnapshotRecord>,
}

impl Snapshot {
    pub fn from_order(playlist_id: impl Into<String>, title: Option<String>, order: &Order) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            title,
            updated_at: Some(Utc::now()),
            records: order.items().iter().map(SnapshotRecord::from).collect(),
        }
    }

    /// Reconstruit l'ordre, trié par position
    pub fn to_order(&self) -> Result<Order> {
        let mut records = self.records.clone();
        records.sort_by_key(|record| record.position);
        Order::new(records.into_iter().map(Item::from).collect())
    }

    pub fn ids(&self) -> Vec<String> {
        let mut records: Vec<&SnapshotRecord> = self.records.iter().collect();
        records.sort_by_key(|record| record.position);
        records.into_iter().map(|record| record.id.clone()).collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::PersistenceError(format!("Invalid snapshot JSON: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::PersistenceError(format!("Failed to serialize snapshot: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_json_format() {
        let published = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let order = Order::new(vec![
            Item::with_handle("B", "hB").title("Bee"),
            Item::with_handle("A", "hA").published_at(published),
        ])
        .unwrap();

        let snapshot = Snapshot::from_order("PL1", Some("Mix".into()), &order);
        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["playlist_id"], "PL1");
        assert_eq!(value["records"][0]["position"], 0);
        assert_eq!(value["records"][0]["id"], "B");
        assert_eq!(value["records"][0]["title"], "Bee");
        assert_eq!(value["records"][1]["published_at"], "2020-01-02T03:04:05Z");

        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(back.to_order().unwrap(), order);
    }

    #[test]
    fn test_records_are_sorted_by_position() {
        let json = r#"{
            "playlist_id": "PL1",
            "records": [
                {"position": 2, "id": "C"},
                {"position": 0, "id": "A"},
                {"position": 1, "id": "B", "handle": "hB"}
            ]
        }"#;
        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(snapshot.ids(), vec!["A", "B", "C"]);

        let order = snapshot.to_order().unwrap();
        assert_eq!(order.ids(), vec!["A", "B", "C"]);
        assert_eq!(order.get("B").unwrap().handle.as_deref(), Some("hB"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let json = r#"{"playlist_id": "PL1", "records": [{"position": 0, "id": "A"}, {"position": 1, "id": "A"}]}"#;
        let snapshot = Snapshot::from_json(json).unwrap();
        assert!(matches!(snapshot.to_order(), Err(Error::DuplicateId(_))));
    }
}
