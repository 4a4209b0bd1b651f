use thiserror::Error;

/// Errors surfaced by the port allocator (C3).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("no ports available in the configured range")]
    Exhausted,
    #[error("port {0} is outside the configured range")]
    OutOfRange(u16),
}

/// Errors surfaced by the app registry (C4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no app record for app_id {0}")]
    NotFound(String),
}
