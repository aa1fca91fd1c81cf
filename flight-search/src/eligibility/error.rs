//! Calendar refresh errors.

use std::path::PathBuf;

/// A blackout calendar could not be obtained from its source.
///
/// These never reach users: the refresher logs them and keeps serving the
/// last calendar it had.
#[derive(Debug, thiserror::Error)]
pub enum CalendarRefreshError {
    /// Network failure talking to the calendar endpoint
    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The calendar endpoint answered with a non-success status
    #[error("calendar endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The calendar file could not be read or written
    #[error("calendar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document was not a valid calendar
    #[error("invalid calendar document: {0}")]
    Invalid(#[from] serde_json::Error),

    /// Another refresh is already running
    #[error("a calendar refresh is already in progress")]
    InProgress,
}
