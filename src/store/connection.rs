//! Store connection management
//!
//! `ConnectionManager` owns the single client connection a process holds
//! to the chat store, in either external or embedded mode. All lifecycle
//! operations (`connect`, `close`, `reinitialize`) and handle lookups go
//! through one mutex, so concurrent callers always observe a consistent
//! connection and a handle can never be obtained halfway through a
//! reinitialization.

use mongodb::bson::doc;
use mongodb::options::{Acknowledgment, ClientOptions, Credential, ServerAddress, WriteConcern};
use mongodb::sync::{Client, Database};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{ChatStoreConfig, ServerType};
use crate::error::{Result, StoreError};
use crate::store::embedded::EmbeddedServer;

/// Observable lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection has been established (or the last attempt failed)
    Unconnected,
    /// A pooled client connection is live
    Connected,
    /// The connection was explicitly closed
    Closed,
}

#[derive(Default)]
struct ConnState {
    client: Option<Client>,
    /// Cached database handle, at most one per connection
    db: Option<(String, Database)>,
    embedded: Option<EmbeddedServer>,
    closed: bool,
}

/// Owner of the process-wide store connection
///
/// Construct one per process and pass it to the components that need it;
/// there is no ambient global.
pub struct ConnectionManager {
    config: ChatStoreConfig,
    state: Mutex<ConnState>,
}

impl ConnectionManager {
    /// Create a manager for the given configuration; no connection is
    /// opened until first use
    pub fn new(config: ChatStoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ConnState::default()),
        }
    }

    /// The configuration this manager was built with
    pub fn config(&self) -> &ChatStoreConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn status(&self) -> ConnectionStatus {
        let state = self.state.lock();
        if state.client.is_some() {
            ConnectionStatus::Connected
        } else if state.closed {
            ConnectionStatus::Closed
        } else {
            ConnectionStatus::Unconnected
        }
    }

    /// Establish the connection if it is not already established
    ///
    /// In embed mode this first spawns the local server. The call fails
    /// explicitly when the host cannot be reached or the credentials are
    /// rejected, leaving the manager unconnected so callers can abort
    /// startup.
    pub fn connect(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_client(&mut state).map(|_| ())
    }

    /// Release the pooled connection and stop the embedded server if one
    /// was started; a no-op when nothing is running
    pub fn close(&self) {
        let mut state = self.state.lock();
        self.close_locked(&mut state);
    }

    /// Close and immediately re-establish the connection, picking up any
    /// configuration the next connect applies
    pub fn reinitialize(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.close_locked(&mut state);
        self.ensure_client(&mut state).map(|_| ())
    }

    /// Get a database handle, connecting lazily on first use
    ///
    /// With no explicit name the cached handle (bound to the configured
    /// `db_name`) is returned. Supplying a name different from the cached
    /// one rebinds the cache to that database.
    pub fn database(&self, name: Option<&str>) -> Result<Database> {
        let mut state = self.state.lock();
        let client = self.ensure_client(&mut state)?;

        match (&state.db, name) {
            (Some((_, db)), None) => return Ok(db.clone()),
            (Some((cached, db)), Some(requested)) if cached == requested => {
                return Ok(db.clone())
            }
            _ => {}
        }

        let db_name = name.unwrap_or(self.config.db_name.as_str()).to_string();
        debug!("binding database handle to '{}'", db_name);
        let db = client.database(&db_name);
        state.db = Some((db_name, db.clone()));
        Ok(db)
    }

    /// Drop the named database
    pub fn drop_database(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let client = self.ensure_client(&mut state)?;
        info!("dropping database {}", name);
        client
            .database(name)
            .drop(None)
            .map_err(|e| StoreError::schema(name, e))?;
        // Invalidate the cached handle if it pointed at the dropped database
        if state.db.as_ref().is_some_and(|(n, _)| n == name) {
            state.db = None;
        }
        info!("database {} dropped", name);
        Ok(())
    }

    fn ensure_client(&self, state: &mut ConnState) -> Result<Client> {
        if let Some(client) = &state.client {
            return Ok(client.clone());
        }

        if self.config.server_type == ServerType::Embed && state.embedded.is_none() {
            state.embedded = Some(EmbeddedServer::start(self.config.server_port)?);
        }

        let client = match self.open_client() {
            Ok(client) => client,
            Err(e) => {
                // Stay unconnected; a dev server spawned for this attempt
                // goes down with it
                if let Some(mut embedded) = state.embedded.take() {
                    embedded.stop();
                }
                return Err(e);
            }
        };

        state.closed = false;
        state.client = Some(client.clone());
        info!("connected to chat store at {}", self.config.server_address());
        Ok(client)
    }

    fn open_client(&self) -> Result<Client> {
        let address = self.config.server_address();

        let server_address = ServerAddress::parse(address.as_str())
            .map_err(|e| StoreError::connection(address.clone(), e))?;
        let mut options = ClientOptions::builder().hosts(vec![server_address]).build();
        options.app_name = Some("chatstore".to_string());
        options.max_pool_size = Some(self.config.max_pool_size);
        options.max_connecting = Some(self.config.max_connecting);
        options.connect_timeout = Some(self.config.connect_timeout());
        options.server_selection_timeout = Some(self.config.connect_timeout());
        // Durable write acknowledgment: majority-acknowledged and journaled
        options.write_concern = Some(
            WriteConcern::builder()
                .w(Acknowledgment::Majority)
                .journal(true)
                .build(),
        );
        if self.config.db_authentication {
            let credential = Credential::builder()
                .username(self.config.db_user.clone().unwrap_or_default())
                .password(self.config.db_password.clone().unwrap_or_default())
                .build();
            options.credential = Some(credential);
        }

        let client = Client::with_options(options)
            .map_err(|e| StoreError::connection(address.clone(), e))?;

        // The driver connects lazily; ping now so an unreachable host or a
        // rejected credential fails this call rather than the first query
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .map_err(|e| StoreError::connection(address, e))?;

        Ok(client)
    }

    fn close_locked(&self, state: &mut ConnState) {
        state.db = None;
        if let Some(client) = state.client.take() {
            // Dropping the client releases its connection pool
            drop(client);
            state.closed = true;
            info!("chat store connection closed");
        }
        if let Some(mut embedded) = state.embedded.take() {
            embedded.stop();
            state.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> ChatStoreConfig {
        ChatStoreConfig {
            server_host: "does-not-resolve".to_string(),
            connect_timeout_secs: 1,
            ..ChatStoreConfig::default()
        }
    }

    #[test]
    fn test_starts_unconnected() {
        let manager = ConnectionManager::new(ChatStoreConfig::default());
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);
    }

    #[test]
    fn test_close_without_connect_is_noop() {
        let manager = ConnectionManager::new(ChatStoreConfig::default());
        manager.close();
        manager.close();
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);
    }

    #[test]
    fn test_connect_failure_is_explicit_and_leaves_unconnected() {
        let manager = ConnectionManager::new(unreachable_config());
        let result = manager.connect();
        assert!(matches!(result, Err(StoreError::Connection { .. })));
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);
    }

    #[test]
    fn test_database_failure_propagates() {
        let manager = ConnectionManager::new(unreachable_config());
        let result = manager.database(None);
        assert!(matches!(result, Err(StoreError::Connection { .. })));
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);
    }
}
