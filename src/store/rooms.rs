//! Dynamic per-room index application
//!
//! Room collections are created over the service's life, one per chat
//! room, named after the room's registry identifier. At startup the
//! registry is walked and every discovered room collection receives the
//! additive per-room index set; `index_room` covers rooms created after
//! startup without requiring a restart.

use mongodb::bson::{Bson, Document};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::connection::ConnectionManager;
use crate::store::indexes::IndexManager;
use crate::store::schema::ROOMS_COLLECTION;

/// Applies per-room index sets for registry-discovered and newly created
/// rooms
pub struct RoomIndexer<'a> {
    connection: &'a ConnectionManager,
    indexes: IndexManager<'a>,
}

impl<'a> RoomIndexer<'a> {
    /// Create a room indexer bound to the given connection
    pub fn new(connection: &'a ConnectionManager) -> Self {
        Self {
            connection,
            indexes: IndexManager::new(connection),
        }
    }

    /// Walk the room registry and ensure the per-room index set for every
    /// entry; returns the number of rooms indexed
    ///
    /// An empty registry is a no-op. The registry is streamed through a
    /// cursor, so its size is bounded only by the registry itself.
    pub fn index_all_rooms(&self) -> Result<u64> {
        let db = self.connection.database(None)?;
        let registry = db.collection::<Document>(ROOMS_COLLECTION);
        let cursor = registry
            .find(None, None)
            .map_err(|e| StoreError::index(ROOMS_COLLECTION, e))?;

        let mut count = 0u64;
        for entry in cursor {
            let entry = entry.map_err(|e| StoreError::index(ROOMS_COLLECTION, e))?;
            let Some(room_id) = room_id_from_entry(&entry) else {
                debug!("skipping registry entry without a usable identifier");
                continue;
            };
            self.indexes.ensure_indexes_in_room(&room_id)?;
            count += 1;
        }

        info!("ensured indexes for {} room collections", count);
        Ok(count)
    }

    /// Ensure the per-room index set for a single room, for use when a
    /// room is created at runtime
    pub fn index_room(&self, room_id: &str) -> Result<()> {
        self.indexes.ensure_indexes_in_room(room_id)
    }
}

/// Extract the room identifier from a registry document
fn room_id_from_entry(entry: &Document) -> Option<String> {
    match entry.get("_id") {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    #[test]
    fn test_room_id_from_string_entry() {
        let entry = doc! { "_id": "team-42", "users": ["alice", "bob"] };
        assert_eq!(room_id_from_entry(&entry), Some("team-42".to_string()));
    }

    #[test]
    fn test_room_id_from_object_id_entry() {
        let oid = ObjectId::new();
        let entry = doc! { "_id": oid };
        assert_eq!(room_id_from_entry(&entry), Some(oid.to_hex()));
    }

    #[test]
    fn test_room_id_missing() {
        let entry = doc! { "users": [] };
        assert_eq!(room_id_from_entry(&entry), None);
    }
}
