//! Configuration for the Northbound client.

use ovnnb_protocol::NB_DATABASE;

/// Default endpoint of a local `ovsdb-server` serving the Northbound database.
pub const DEFAULT_ENDPOINT: &str = "unix:/var/run/ovn/ovnnb_db.sock";

/// Configuration for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Database name sent with `monitor` and `transact`.
    pub database: String,
    /// Endpoint the transport connects to. Informational for the client
    /// itself; transports use it to pick their connection.
    pub endpoint: String,
}

impl ClientConfig {
    /// Creates a configuration for the Northbound database at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            database: NB_DATABASE.to_string(),
            endpoint: endpoint.into(),
        }
    }

    /// Sets the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}
