#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Chatstore - schema bootstrap for the chat/notification document store
//!
//! This crate establishes and maintains the MongoDB schema backing a chat
//! and notification service: it manages the single process-wide
//! connection (to an external instance, or to a throwaway embedded server
//! in development), creates the required collections (including
//! capacity-bounded capped ones), and applies the declared index sets —
//! destructively for the fixed collections, additively for the dynamic
//! per-room collections.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - **[`store`]**: connection lifecycle, schema, and index management
//!   - `connection`: `ConnectionManager`, one client per process
//!   - `embedded`: dev-mode server subprocess
//!   - `schema`: `SchemaInitializer` and declarative `CollectionSpec`s
//!   - `indexes`: `IndexManager` and the declarative index tables
//!   - `rooms`: `RoomIndexer` for registry-discovered room collections
//! - **[`config`]**: configuration management (TOML file + environment)
//! - **[`error`]**: the `StoreError` taxonomy
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chatstore::{ChatStore, ChatStoreConfig};
//!
//! // Load configuration and run the full startup sequence
//! let config = ChatStoreConfig::new(&None)?;
//! let store = ChatStore::bootstrap(config)?;
//!
//! // Index the collection of a room created after startup
//! store.rooms().index_room("team-42")?;
//!
//! store.close();
//! ```

pub mod config;
pub mod error;
pub mod store;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{ChatStoreConfig, ServerType, DEFAULT_DB_NAME};

// =============================================================================
// Errors
// =============================================================================

pub use error::{Result, StoreError};

// =============================================================================
// Store components
// =============================================================================

pub use store::{ChatStore, ConnectionManager, ConnectionStatus, EmbeddedServer};

pub use store::{
    fixed_collections, CollectionSpec, SchemaInitializer, DEPRECATED_TOKENS_COLLECTION,
    NOTIFICATIONS_COLLECTION, ROOMS_COLLECTION, USERS_COLLECTION,
};

pub use store::{
    room_collection_name, Direction, IndexField, IndexManager, IndexSpec, RoomIndexer,
    FIXED_INDEXES, ROOM_COLLECTION_PREFIX, ROOM_INDEXES,
};
