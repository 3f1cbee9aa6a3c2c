//! Collection schema management
//!
//! Declarative collection specs and the idempotent initializer that applies
//! them. Creation is existence-checked, so running the bootstrap repeatedly
//! has no side effects; the one destructive action here is the removal of
//! the superseded `tokens` collection.

use mongodb::bson::{doc, Document};
use mongodb::options::CreateCollectionOptions;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::connection::ConnectionManager;

/// Collection holding per-user notification documents
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";
/// Room registry: one document per chat room
pub const ROOMS_COLLECTION: &str = "room_rooms";
/// Collection of user profile and token documents
pub const USERS_COLLECTION: &str = "users";
/// Superseded token collection, dropped during bootstrap
pub const DEPRECATED_TOKENS_COLLECTION: &str = "tokens";

/// Declarative description of a collection to ensure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name
    pub name: String,
    /// Whether the collection is capacity-bounded
    pub capped: bool,
    /// Maximum size in bytes, required for capped collections
    pub size_bytes: Option<u64>,
}

impl CollectionSpec {
    /// Spec for an ordinary collection
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capped: false,
            size_bytes: None,
        }
    }

    /// Spec for a capped collection with the given maximum byte size
    pub fn capped(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            capped: true,
            size_bytes: Some(size_bytes),
        }
    }

    /// Creation options for this spec; `None` for a plain collection
    pub fn create_options(&self) -> Option<CreateCollectionOptions> {
        if !self.capped {
            return None;
        }
        Some(
            CreateCollectionOptions::builder()
                .capped(true)
                .size(self.size_bytes.unwrap_or_default())
                .build(),
        )
    }
}

/// The fixed collections every deployment needs
pub fn fixed_collections() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec::plain(NOTIFICATIONS_COLLECTION),
        CollectionSpec::plain(ROOMS_COLLECTION),
        CollectionSpec::plain(USERS_COLLECTION),
    ]
}

/// Ensures the required collections exist and deprecated ones do not
pub struct SchemaInitializer<'a> {
    connection: &'a ConnectionManager,
}

impl<'a> SchemaInitializer<'a> {
    /// Create an initializer bound to the given connection
    pub fn new(connection: &'a ConnectionManager) -> Self {
        Self { connection }
    }

    /// Ensure the fixed collection set exists and remove superseded
    /// collections; safe to run on every startup
    pub fn initialize(&self) -> Result<()> {
        for spec in fixed_collections() {
            self.ensure_collection(&spec)?;
        }
        self.drop_deprecated_collection(DEPRECATED_TOKENS_COLLECTION)?;
        Ok(())
    }

    /// Create the described collection if it does not exist yet
    pub fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let db = self.connection.database(None)?;
        let existing = db
            .list_collection_names(doc! { "name": &spec.name })
            .map_err(|e| StoreError::schema(&spec.name, e))?;
        if !existing.is_empty() {
            debug!("collection '{}' already exists", spec.name);
            return Ok(());
        }

        db.create_collection(&spec.name, spec.create_options())
            .map_err(|e| StoreError::schema(&spec.name, e))?;
        info!("created collection '{}'", spec.name);
        Ok(())
    }

    /// Entry point for capacity-bounded log collections
    pub fn init_capped_collection(&self, name: &str, size_bytes: u64) -> Result<()> {
        self.ensure_collection(&CollectionSpec::capped(name, size_bytes))
    }

    /// Drop the named collection if it exists; a no-op once removed
    pub fn drop_deprecated_collection(&self, name: &str) -> Result<()> {
        let db = self.connection.database(None)?;
        let existing = db
            .list_collection_names(doc! { "name": name })
            .map_err(|e| StoreError::schema(name, e))?;
        if existing.is_empty() {
            return Ok(());
        }

        db.collection::<Document>(name)
            .drop(None)
            .map_err(|e| StoreError::schema(name, e))?;
        info!("dropped deprecated collection '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_collections() {
        let specs = fixed_collections();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["notifications", "room_rooms", "users"]);
        assert!(specs.iter().all(|s| !s.capped));
    }

    #[test]
    fn test_plain_spec_has_no_options() {
        let spec = CollectionSpec::plain("users");
        assert!(spec.create_options().is_none());
    }

    #[test]
    fn test_capped_spec_options() {
        let spec = CollectionSpec::capped("status_log", 8192);
        let options = spec.create_options().unwrap();
        assert_eq!(options.capped, Some(true));
        assert_eq!(options.size, Some(8192));
    }
}
