use std::net::SocketAddr;

use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Startup and runtime failures of the infrastructure adapters.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {listener} listener on {addr}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("database connection failed")]
    Connect(#[source] sqlx::Error),
    #[error("migrations failed")]
    Migration(#[from] MigrateError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn bind(listener: &'static str, addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind {
            listener,
            addr,
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
