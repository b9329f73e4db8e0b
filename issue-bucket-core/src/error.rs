//! Error types shared by the object-store contract and the bucket engines.

/// Failure of a single object-store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key does not exist. Single-object reads recover from this
    /// locally and return `None`.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Any service or transport failure, passed through unmodified.
    #[error("object store request failed: {0}")]
    Service(String),

    /// An object body could not be (de)serialised as JSON.
    #[error("object {key} is not valid JSON: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Local file I/O while uploading or downloading.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Failure of a multi-key copy or move.
///
/// Copy and delete are issued per key with no rollback, so a failure partway
/// leaves earlier keys already transferred. `completed` lists the source keys
/// that were fully processed before the failing step.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("copy of {source_key} to {destination_key} failed after {} completed keys: {source}", .completed.len())]
    Copy {
        source_key: String,
        destination_key: String,
        completed: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("delete of {key} failed after it was copied ({} completed keys): {source}", .completed.len())]
    Delete {
        key: String,
        completed: Vec<String>,
        #[source]
        source: StoreError,
    },

    /// Enumeration or bulk deletion around the copy step failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    /// Source keys that were fully copied (and deleted, for moves) before the failure.
    pub fn completed(&self) -> &[String] {
        match self {
            TransferError::Copy { completed, .. } | TransferError::Delete { completed, .. } => {
                completed
            }
            TransferError::Store(_) => &[],
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure talking to the issue tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("invalid tracker url: {0}")]
    Url(String),
}

/// Failure of the query service or of the runner driving it.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("failed to read query script {path}: {source}")]
    Script {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("query service request failed: {0}")]
    Service(String),

    #[error("query service response is missing {0}")]
    MissingField(&'static str),
}

/// Failure reading or writing local CSV/JSON files.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("file i/o failed for {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("json error in {path}: {source}")]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of the issue extraction pipeline, tagged by the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("issue search failed: {0}")]
    Tracker(#[from] TrackerError),

    #[error("writing the extract file failed: {0}")]
    File(#[from] FileError),

    #[error("landing the extract in the bucket failed: {0}")]
    Store(#[from] StoreError),
}
