//! Gateway lifecycle errors.

use displaydoc::Display as DisplayDoc;
use thiserror::Error;

use crate::configuration::ConfigurationError;
use crate::store::StoreError;

/// Error types for the gateway lifecycle.
///
/// All of these are fatal to startup; after the server reaches the running
/// state nothing is fatal except losing the process.
#[derive(Error, Debug, DisplayDoc)]
#[non_exhaustive]
pub enum GatewayError {
    /// failed to start server
    StartupError,

    /// failed to stop HTTP Server
    HttpServerLifecycleError,

    /// no valid configuration was supplied: {0}
    ConfigError(#[from] ConfigurationError),

    /// no document store connection string was supplied
    NoStoreConfiguration,

    /// could not reach the document store: {0}
    StoreConnection(#[from] StoreError),

    /// could not create the HTTP server: {0}
    ServerCreationError(std::io::Error),
}
