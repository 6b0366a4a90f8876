use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("No such {kind}: {id}")]
    ScopeNotFound { kind: &'static str, id: String },

    #[error("Data access failed: {0}")]
    DataAccess(String),

    #[error("Snapshot store error: {0}")]
    Storage(String),

    #[error("Unknown metric type: {0}")]
    UnknownMetricType(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Rollup verification failed: {0}")]
    VerificationFailed(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RollupError {
    pub fn building_not_found(id: impl Into<String>) -> Self {
        Self::ScopeNotFound {
            kind: "building",
            id: id.into(),
        }
    }

    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ScopeNotFound {
            kind: "project",
            id: id.into(),
        }
    }

    /// Callers surface "no such scope" separately from every other failure.
    pub fn is_scope_not_found(&self) -> bool {
        matches!(self, Self::ScopeNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RollupError>;
