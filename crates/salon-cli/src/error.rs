use std::io;

use salon_core::config::ConfigError;
use salon_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] salon_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Client not found for id/name: {0}")]
    ClientNotFound(String),
    #[error("Service not found for id/name: {0}")]
    ServiceNotFound(String),
    #[error("Appointment not found for id/prefix: {0}")]
    AppointmentNotFound(String),
    #[error("{0}")]
    Ambiguous(String),
    #[error("Lookup query cannot be empty")]
    EmptyQuery,
    #[error("Invalid time: {0}")]
    InvalidTime(String),
}
