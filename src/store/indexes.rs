//! Declarative index management
//!
//! The target index set of every fixed collection is declared once, in
//! [`FIXED_INDEXES`], and applied uniformly. Two application strategies
//! exist and are deliberately separate operations:
//!
//! - [`IndexManager::ensure_indexes`] performs a destructive rebuild of
//!   the fixed collections: all live indexes are dropped and the declared
//!   set is created from scratch. The live set is guaranteed to match the
//!   declaration exactly, at the cost of a window with no indexes. This is
//!   a startup/maintenance operation, never a request-path one.
//! - [`IndexManager::ensure_indexes_in_room`] applies the per-room set
//!   additively and never drops anything, so it is safe against large,
//!   already-indexed room collections.
//!
//! Index names are derived from the field list (`user_1`, `validity_m1`,
//! `user_1_token_1`), so a re-applied index is recognizable by name.

use mongodb::bson::Document;
use mongodb::options::IndexOptions;
use mongodb::sync::Database;
use mongodb::IndexModel;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::connection::ConnectionManager;
use crate::store::schema::{NOTIFICATIONS_COLLECTION, ROOMS_COLLECTION, USERS_COLLECTION};

/// Prefix of per-room collection names
pub const ROOM_COLLECTION_PREFIX: &str = "room_";

/// Sort direction of an indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending (`1`)
    Asc,
    /// Descending (`-1`)
    Desc,
}

impl Direction {
    /// Key value as stored in the index specification document
    pub fn key_value(&self) -> i32 {
        match self {
            Direction::Asc => 1,
            Direction::Desc => -1,
        }
    }

    /// Suffix used in derived index names (`_1` / `_m1`)
    fn suffix(&self) -> &'static str {
        match self {
            Direction::Asc => "1",
            Direction::Desc => "m1",
        }
    }
}

/// One field of an index, with its direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexField {
    pub name: &'static str,
    pub direction: Direction,
}

const fn asc(name: &'static str) -> IndexField {
    IndexField {
        name,
        direction: Direction::Asc,
    }
}

const fn desc(name: &'static str) -> IndexField {
    IndexField {
        name,
        direction: Direction::Desc,
    }
}

/// Declarative description of one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Indexed fields, in key order
    pub fields: &'static [IndexField],
    /// Whether the index enforces uniqueness
    pub unique: bool,
    /// Whether the build runs in the background (does not block reads
    /// and writes against the collection)
    pub background: bool,
}

impl IndexSpec {
    /// A unique, background-built index over the given fields
    pub const fn unique(fields: &'static [IndexField]) -> Self {
        Self {
            fields,
            unique: true,
            background: true,
        }
    }

    /// A non-unique, background-built index over the given fields
    pub const fn non_unique(fields: &'static [IndexField]) -> Self {
        Self {
            fields,
            unique: false,
            background: true,
        }
    }

    /// Deterministic index name derived from the field list
    ///
    /// `_1` marks an ascending field, `_m1` a descending one, so the same
    /// declaration always produces the same name.
    pub fn derived_name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_{}", f.name, f.direction.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Index key document, preserving field order
    pub fn keys(&self) -> Document {
        let mut keys = Document::new();
        for field in self.fields {
            keys.insert(field.name, field.direction.key_value());
        }
        keys
    }

    /// Driver index model for this spec
    pub fn model(&self) -> IndexModel {
        let options = IndexOptions::builder()
            .name(self.derived_name())
            .unique(self.unique)
            .background(self.background)
            .build();
        IndexModel::builder().keys(self.keys()).options(options).build()
    }
}

/// Target index sets for the fixed collections
///
/// `ensure_indexes` makes the live set of each collection match this table
/// exactly.
pub const FIXED_INDEXES: &[(&str, &[IndexSpec])] = &[
    (
        NOTIFICATIONS_COLLECTION,
        &[
            IndexSpec::non_unique(&[asc("user")]),
            IndexSpec::non_unique(&[asc("isRead")]),
            IndexSpec::non_unique(&[
                asc("user"),
                asc("category"),
                asc("categoryId"),
                asc("type"),
            ]),
        ],
    ),
    (
        ROOMS_COLLECTION,
        &[
            IndexSpec::non_unique(&[asc("space")]),
            IndexSpec::non_unique(&[asc("users")]),
            IndexSpec::non_unique(&[asc("shortName")]),
        ],
    ),
    (
        USERS_COLLECTION,
        &[
            IndexSpec::non_unique(&[asc("token")]),
            IndexSpec::non_unique(&[desc("validity")]),
            IndexSpec::unique(&[asc("user"), asc("token")]),
            IndexSpec::unique(&[asc("user"), desc("validity")]),
            IndexSpec::non_unique(&[desc("validity"), asc("isDemoUser")]),
            IndexSpec::unique(&[asc("user")]),
            IndexSpec::non_unique(&[asc("spaces")]),
        ],
    ),
];

/// Index set applied (additively) to every per-room collection
pub const ROOM_INDEXES: &[IndexSpec] = &[
    IndexSpec::non_unique(&[asc("timestamp")]),
    IndexSpec::non_unique(&[desc("timestamp")]),
];

/// Collection name for a room identifier (`room_<id>`)
pub fn room_collection_name(room_id: &str) -> String {
    format!("{ROOM_COLLECTION_PREFIX}{room_id}")
}

/// Applies the declared index sets to the store
pub struct IndexManager<'a> {
    connection: &'a ConnectionManager,
}

impl<'a> IndexManager<'a> {
    /// Create an index manager bound to the given connection
    pub fn new(connection: &'a ConnectionManager) -> Self {
        Self { connection }
    }

    /// Destructively rebuild the index sets of all fixed collections
    ///
    /// Every existing index is dropped, then the full declared set is
    /// created, so the live set ends up exactly equal to [`FIXED_INDEXES`].
    /// Must not run concurrently with itself or with query traffic that
    /// depends on the indexes being rebuilt.
    pub fn ensure_indexes(&self) -> Result<()> {
        let db = self.connection.database(None)?;
        info!("rebuilding fixed index sets in {}", db.name());

        for (collection, specs) in FIXED_INDEXES {
            Self::rebuild_collection_indexes(&db, collection, specs)?;
        }

        info!("index rebuild completed in {}", db.name());
        Ok(())
    }

    /// Additively ensure the per-room index set on `room_<room_id>`
    ///
    /// Never drops anything: indexes outside the declared set survive, and
    /// already-present declared indexes are left untouched by the store.
    pub fn ensure_indexes_in_room(&self, room_id: &str) -> Result<()> {
        let db = self.connection.database(None)?;
        let name = room_collection_name(room_id);
        let coll = db.collection::<Document>(&name);

        let models: Vec<IndexModel> = ROOM_INDEXES.iter().map(IndexSpec::model).collect();
        coll.create_indexes(models, None)
            .map_err(|e| StoreError::index(&name, e))?;
        debug!("room indexes ensured in '{}'", name);
        Ok(())
    }

    fn rebuild_collection_indexes(
        db: &Database,
        collection: &str,
        specs: &[IndexSpec],
    ) -> Result<()> {
        let coll = db.collection::<Document>(collection);

        coll.drop_indexes(None)
            .map_err(|e| StoreError::index(collection, e))?;

        let models: Vec<IndexModel> = specs.iter().map(IndexSpec::model).collect();
        coll.create_indexes(models, None)
            .map_err(|e| StoreError::index(collection, e))?;

        info!("rebuilt {} indexes on '{}'", specs.len(), collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    fn specs_for(collection: &str) -> &'static [IndexSpec] {
        FIXED_INDEXES
            .iter()
            .find(|(name, _)| *name == collection)
            .map(|(_, specs)| *specs)
            .unwrap()
    }

    #[test]
    fn test_derived_name_single_field() {
        assert_eq!(IndexSpec::non_unique(const { &[asc("user")] }).derived_name(), "user_1");
        assert_eq!(
            IndexSpec::non_unique(const { &[desc("validity")] }).derived_name(),
            "validity_m1"
        );
    }

    #[test]
    fn test_derived_name_compound() {
        assert_eq!(
            IndexSpec::unique(const { &[asc("user"), asc("token")] }).derived_name(),
            "user_1_token_1"
        );
        assert_eq!(
            IndexSpec::unique(const { &[asc("user"), desc("validity")] }).derived_name(),
            "user_1_validity_m1"
        );
        assert_eq!(
            IndexSpec::non_unique(const { &[desc("validity"), asc("isDemoUser")] }).derived_name(),
            "validity_m1_isDemoUser_1"
        );
    }

    #[test]
    fn test_keys_preserve_field_order() {
        let spec = IndexSpec::non_unique(const {
            &[
                asc("user"),
                asc("category"),
                asc("categoryId"),
                asc("type"),
            ]
        });
        let keys = spec.keys();
        let names: Vec<&str> = keys.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["user", "category", "categoryId", "type"]);
        assert_eq!(keys.get("user"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn test_keys_directions() {
        let spec = IndexSpec::non_unique(const { &[desc("validity"), asc("isDemoUser")] });
        let keys = spec.keys();
        assert_eq!(keys.get("validity"), Some(&Bson::Int32(-1)));
        assert_eq!(keys.get("isDemoUser"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn test_model_options() {
        let spec = IndexSpec::unique(const { &[asc("user")] });
        let model = spec.model();
        let options = model.options.unwrap();
        assert_eq!(options.name.as_deref(), Some("user_1"));
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.background, Some(true));
    }

    #[test]
    fn test_fixed_table_shape() {
        let collections: Vec<&str> = FIXED_INDEXES.iter().map(|(name, _)| *name).collect();
        assert_eq!(collections, vec!["notifications", "room_rooms", "users"]);

        assert_eq!(specs_for("notifications").len(), 3);
        assert_eq!(specs_for("room_rooms").len(), 3);
        assert_eq!(specs_for("users").len(), 7);
    }

    #[test]
    fn test_uniqueness_flags() {
        // Only the users collection carries unique indexes
        assert!(specs_for("notifications").iter().all(|s| !s.unique));
        assert!(specs_for("room_rooms").iter().all(|s| !s.unique));

        let unique_names: Vec<String> = specs_for("users")
            .iter()
            .filter(|s| s.unique)
            .map(|s| s.derived_name())
            .collect();
        assert_eq!(
            unique_names,
            vec!["user_1_token_1", "user_1_validity_m1", "user_1"]
        );
    }

    #[test]
    fn test_all_indexes_build_in_background() {
        for (_, specs) in FIXED_INDEXES {
            assert!(specs.iter().all(|s| s.background));
        }
        assert!(ROOM_INDEXES.iter().all(|s| s.background));
    }

    #[test]
    fn test_room_index_set() {
        let names: Vec<String> = ROOM_INDEXES.iter().map(|s| s.derived_name()).collect();
        assert_eq!(names, vec!["timestamp_1", "timestamp_m1"]);
        assert!(ROOM_INDEXES.iter().all(|s| !s.unique));
    }

    #[test]
    fn test_derived_names_are_distinct_per_collection() {
        for (collection, specs) in FIXED_INDEXES {
            let mut names: Vec<String> = specs.iter().map(|s| s.derived_name()).collect();
            let total = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate index name in {collection}");
        }
    }

    #[test]
    fn test_room_collection_name() {
        assert_eq!(room_collection_name("abc123"), "room_abc123");
    }
}
