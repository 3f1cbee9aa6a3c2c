//! Store bootstrap module
//!
//! Everything needed to stand up the chat/notification document store,
//! organized into:
//!
//! - **connection**: process-wide connection lifecycle and handle caching
//! - **embedded**: throwaway local server for development
//! - **schema**: idempotent collection creation and deprecated-collection
//!   cleanup
//! - **indexes**: declarative index tables and their two application
//!   strategies (destructive rebuild for fixed collections, additive for
//!   room collections)
//! - **rooms**: registry-driven indexing of dynamic per-room collections
//!
//! # Architecture
//!
//! ```text
//! store/
//! ├── connection      # ConnectionManager (one client per process)
//! │   └── embedded    # dev-mode server subprocess
//! ├── schema          # SchemaInitializer consumes CollectionSpec
//! ├── indexes         # IndexManager consumes FIXED_INDEXES / ROOM_INDEXES
//! └── rooms           # RoomIndexer walks the room registry
//! ```
//!
//! [`ChatStore::bootstrap`] runs the whole startup sequence in order and
//! aborts on the first failure, since downstream query logic assumes the
//! collections and indexes exist.

mod connection;
mod embedded;
mod indexes;
mod rooms;
mod schema;

pub use connection::{ConnectionManager, ConnectionStatus};
pub use embedded::EmbeddedServer;
pub use indexes::{
    room_collection_name, Direction, IndexField, IndexManager, IndexSpec, FIXED_INDEXES,
    ROOM_COLLECTION_PREFIX, ROOM_INDEXES,
};
pub use rooms::RoomIndexer;
pub use schema::{
    fixed_collections, CollectionSpec, SchemaInitializer, DEPRECATED_TOKENS_COLLECTION,
    NOTIFICATIONS_COLLECTION, ROOMS_COLLECTION, USERS_COLLECTION,
};

use tracing::info;

use crate::config::ChatStoreConfig;
use crate::error::Result;

/// Bootstrapped chat store
///
/// Owns the connection manager and exposes the schema/index components
/// for targeted maintenance after startup.
pub struct ChatStore {
    connection: ConnectionManager,
}

impl ChatStore {
    /// Run the full startup sequence: connect, ensure collections,
    /// rebuild the fixed index sets, and index every registered room
    ///
    /// Any failure aborts the bootstrap with an explicit error.
    pub fn bootstrap(config: ChatStoreConfig) -> Result<ChatStore> {
        let store = ChatStore::with_connection(ConnectionManager::new(config));

        store.connection.connect()?;
        store.schema().initialize()?;
        store.indexes().ensure_indexes()?;
        store.rooms().index_all_rooms()?;

        info!("chat store bootstrap completed");
        Ok(store)
    }

    /// Wrap an existing connection manager without running the bootstrap
    /// sequence
    pub fn with_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// The underlying connection manager
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Schema initializer bound to this store's connection
    pub fn schema(&self) -> SchemaInitializer<'_> {
        SchemaInitializer::new(&self.connection)
    }

    /// Index manager bound to this store's connection
    pub fn indexes(&self) -> IndexManager<'_> {
        IndexManager::new(&self.connection)
    }

    /// Room indexer bound to this store's connection
    pub fn rooms(&self) -> RoomIndexer<'_> {
        RoomIndexer::new(&self.connection)
    }

    /// Close the underlying connection (and embedded server, if any)
    pub fn close(&self) {
        self.connection.close();
    }
}
