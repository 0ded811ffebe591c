use thiserror::Error;

/// Startup configuration errors. Any of these is fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors raised inside the store. The contract-level operations fold these
/// into `false`/`None`/no-op after logging; the `try_*` operations return them.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("course already exists: {0}")]
    DuplicateCourse(String),

    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },

    #[error("course not found: {0}")]
    CourseNotFound(String),

    #[error("student not found: {0}")]
    StudentNotFound(String),

    #[error("display name must look like \"Lastname, Firstname\": {0:?}")]
    MalformedDisplayName(String),

    #[error("date must be YYYY-MM-DD: {0:?}")]
    InvalidDate(String),

    #[error("unknown {kind} status: {value:?}")]
    InvalidStatus { kind: &'static str, value: String },

    #[error("behavior score must be between 1 and 10, got {0}")]
    ScoreOutOfRange(i64),

    #[error("cannot prepare database directory {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Stable error code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateCourse(_) => "duplicate_course",
            StoreError::EmptyName { .. } => "bad_params",
            StoreError::CourseNotFound(_) => "course_not_found",
            StoreError::StudentNotFound(_) => "student_not_found",
            StoreError::MalformedDisplayName(_) => "bad_display_name",
            StoreError::InvalidDate(_) => "bad_date",
            StoreError::InvalidStatus { .. } => "bad_status",
            StoreError::ScoreOutOfRange(_) => "bad_score",
            StoreError::Io { .. } | StoreError::Pool(_) => "db_unavailable",
            StoreError::Sqlite(_) => "db_query_failed",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::CourseNotFound(_)
                | StoreError::StudentNotFound(_)
                | StoreError::MalformedDisplayName(_)
        )
    }

    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            StoreError::Io { .. } | StoreError::Pool(_) | StoreError::Sqlite(_)
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<crate::model::ParseStatusError> for StoreError {
    fn from(e: crate::model::ParseStatusError) -> Self {
        StoreError::InvalidStatus {
            kind: e.kind,
            value: e.value,
        }
    }
}
