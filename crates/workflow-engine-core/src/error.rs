// Error types for the workflow engine (spec §7).

use thiserror::Error;

/// Errors the Store can return (spec §4.1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("internal store error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors a capability port (messaging, queue) can return.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not configured")]
    NotConfigured,

    #[error("port call failed: {0}")]
    Failed(String),
}

pub type PortResult<T> = std::result::Result<T, PortError>;

/// The taxonomy from spec §7, used by the Engine and Action Executor.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed workflow configuration. Should be caught at save time by
    /// the administration API; surfacing it here means validation was
    /// skipped or bypassed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Trigger/workflow/template missing at dispatch time.
    #[error("not found: {0}")]
    NotFound(String),

    /// Capability port failure (messaging, queue).
    #[error("port error: {0}")]
    Port(String),

    /// Database unavailable; callers should retry.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// Programming error: an operation crossed a tenant boundary.
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn port(msg: impl Into<String>) -> Self {
        EngineError::Port(msg.into())
    }

    pub fn transient_store(msg: impl Into<String>) -> Self {
        EngineError::TransientStore(msg.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => EngineError::NotFound(msg),
            StoreError::Conflict(msg) => EngineError::Config(msg),
            StoreError::ForeignKey(msg) => EngineError::Config(msg),
            StoreError::TenantMismatch => EngineError::TenantMismatch,
            StoreError::Internal(err) => EngineError::TransientStore(err.to_string()),
        }
    }
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotConfigured => EngineError::Port("port not configured".to_string()),
            PortError::Failed(msg) => EngineError::Port(msg),
        }
    }
}
