use std::time::Duration;

use hakcer_core::errors::ValidationError;
use hakcer_store::StoreError;

/// Why a rule manifest was refused. Any of these rejects the whole manifest.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Parse(String),

    #[error("manifest version is missing")]
    MissingVersion,

    #[error("manifest contains no rules")]
    Empty,

    #[error("rule #{index} has no id")]
    MissingId { index: usize },

    #[error("duplicate rule id: {0}")]
    DuplicateId(String),

    #[error("rule id {0} is reserved for custom rules")]
    ReservedId(String),

    #[error("rule {rule_id} is invalid: {source}")]
    InvalidRule {
        rule_id: String,
        #[source]
        source: ValidationError,
    },
}

/// Failure of a remote catalog refresh. The local catalog is untouched.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("manifest request failed with HTTP {status}")]
    Http { status: u16 },

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("manifest exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("manifest version {incoming} is older than local {local}")]
    StaleVersion { incoming: String, local: String },

    #[error("manifest rule {rule_id} collides with a custom rule")]
    IdConflict { rule_id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http_status",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::TooLarge { .. } => "too_large",
            Self::Manifest(_) => "invalid_manifest",
            Self::StaleVersion { .. } => "stale_version",
            Self::IdConflict { .. } => "id_conflict",
            Self::Store(_) => "store",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("rule {rule_id} is built-in and cannot be removed")]
    BuiltinProtected { rule_id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("bundled rule catalog is broken: {0}")]
    Bundled(ManifestError),
}

impl EngineError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::BuiltinProtected { .. } => "builtin_protected",
            Self::Store(_) => "store",
            Self::Sync(e) => e.error_kind(),
            Self::Serialization(_) => "serialization",
            Self::Bundled(_) => "bundled",
        }
    }
}
