//! Where blackout calendars come from.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::calendar::CalendarDocument;
use super::error::CalendarRefreshError;

/// A remote or local supplier of blackout calendars.
pub trait CalendarSource: Send + Sync {
    /// Read the source's current calendar.
    fn fetch(&self) -> impl Future<Output = Result<CalendarDocument, CalendarRefreshError>> + Send;

    /// Ask the source to re-acquire its calendar, then return it.
    fn refresh(
        &self,
    ) -> impl Future<Output = Result<CalendarDocument, CalendarRefreshError>> + Send;
}

/// Calendar served over HTTP by a search provider.
///
/// `GET {base}/api/blackout-dates` returns the document;
/// `POST {base}/api/blackout-dates/refresh` forces a re-fetch and returns
/// `{ "message": ..., "data": <document> }`.
#[derive(Debug, Clone)]
pub struct HttpCalendarSource {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    data: CalendarDocument,
}

impl HttpCalendarSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CalendarRefreshError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Share an existing HTTP client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<String, CalendarRefreshError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarRefreshError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.text().await?)
    }
}

impl CalendarSource for HttpCalendarSource {
    async fn fetch(&self) -> Result<CalendarDocument, CalendarRefreshError> {
        let url = format!("{}/api/blackout-dates", self.base_url);
        debug!(%url, "fetching blackout calendar");
        let body = Self::check(self.http.get(&url).send().await?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn refresh(&self) -> Result<CalendarDocument, CalendarRefreshError> {
        let url = format!("{}/api/blackout-dates/refresh", self.base_url);
        debug!(%url, "requesting blackout calendar refresh");
        let body = Self::check(self.http.post(&url).send().await?).await?;
        let response: RefreshResponse = serde_json::from_str(&body)?;
        Ok(response.data)
    }
}

/// Calendar document stored as a JSON file.
///
/// Some external job keeps the file current; a refresh simply re-reads it.
#[derive(Debug, Clone)]
pub struct FileCalendarSource {
    path: PathBuf,
}

impl FileCalendarSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the calendar file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a document to the file, creating parent directories if needed.
    pub async fn save(&self, document: &CalendarDocument) -> Result<(), CalendarRefreshError> {
        let io_err = |source| CalendarRefreshError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&self.path, json).await.map_err(io_err)
    }

    async fn read(&self) -> Result<CalendarDocument, CalendarRefreshError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CalendarRefreshError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl CalendarSource for FileCalendarSource {
    async fn fetch(&self) -> Result<CalendarDocument, CalendarRefreshError> {
        self.read().await
    }

    async fn refresh(&self) -> Result<CalendarDocument, CalendarRefreshError> {
        self.read().await
    }
}
