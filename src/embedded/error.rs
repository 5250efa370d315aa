//! Errors raised while starting or stopping an embedded server

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddedError {
    /// A PostgreSQL server binary could not be located
    #[error("PostgreSQL binary '{binary}' not found (searched: {searched})")]
    BinaryNotFound { binary: String, searched: String },

    /// Filesystem or process-spawn failure
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A server utility ran but exited unsuccessfully
    #[error("`{command}` exited with {status}:\n{output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    /// No local port could be reserved for the server
    #[error("No free port available on {host}: {source}")]
    NoFreePort {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The server started but never accepted a connection
    #[error("Embedded Postgres on port {port} is not accepting connections: {source}")]
    NotReady {
        port: u16,
        #[source]
        source: crate::connection::ConnectionError,
    },
}

impl EmbeddedError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        EmbeddedError::Io {
            context: context.into(),
            source,
        }
    }
}
