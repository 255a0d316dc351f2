use thiserror::Error;

/// Failures of a sheet sync. The display text is what the status line shows
/// after an interactive sync.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Enter a valid Google Sheets link.")]
    InvalidSource,

    #[error("Could not reach the sheet ({0}). Check its sharing permissions.")]
    Unreachable(String),

    #[error("The sheet is private. Share it as \"Anyone with the link\".")]
    AccessDenied,

    #[error("The sheet does not contain enough data.")]
    EmptySource,

    #[error("No items could be extracted from the sheet.")]
    NoRecordsExtracted,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no assistant API key configured")]
    MissingApiKey,

    #[error("assistant request failed: {0}")]
    Request(String),

    #[error("assistant API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid assistant response: {0}")]
    InvalidResponse(String),

    #[error("assistant returned no answer")]
    EmptyAnswer,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}
