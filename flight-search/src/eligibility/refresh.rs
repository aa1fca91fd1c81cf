//! Keeping the blackout calendar current.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

use super::engine::{CalendarSnapshot, EligibilityEngine};
use super::error::CalendarRefreshError;
use super::source::CalendarSource;

/// How often the calendar is re-fetched (30 days).
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How often the periodic task checks for staleness (daily).
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for calendar refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Calendars older than this are refreshed on load.
    pub interval: Duration,
    /// Period of the background staleness check.
    pub check_every: Duration,
}

impl RefreshConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_check_every(mut self, check_every: Duration) -> Self {
        self.check_every = check_every;
        self
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            check_every: DEFAULT_CHECK_INTERVAL,
        }
    }
}

/// Loads calendars from a source into an [`EligibilityEngine`].
///
/// Refreshes never block readers: the engine keeps answering from the last
/// installed calendar until a new one is swapped in. A failed refresh leaves
/// the installed calendar and its `last_updated` untouched.
pub struct CalendarRefresher<C> {
    engine: EligibilityEngine,
    source: Arc<C>,
    config: RefreshConfig,
    clock: Arc<dyn Clock>,
    /// Held for the duration of a refresh. Released on drop, so an aborted
    /// refresh never blocks the next one.
    refreshing: Arc<Mutex<()>>,
}

impl<C> Clone for CalendarRefresher<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            refreshing: Arc::clone(&self.refreshing),
        }
    }
}

impl<C: CalendarSource + 'static> CalendarRefresher<C> {
    pub fn new(engine: EligibilityEngine, source: C, config: RefreshConfig) -> Self {
        Self::with_clock(engine, source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        engine: EligibilityEngine,
        source: C,
        config: RefreshConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            source: Arc::new(source),
            config,
            clock,
            refreshing: Arc::new(Mutex::new(())),
        }
    }

    /// The engine this refresher feeds.
    pub fn engine(&self) -> &EligibilityEngine {
        &self.engine
    }

    /// Whether the installed calendar is older than the refresh interval.
    pub fn is_stale(&self) -> bool {
        let interval = TimeDelta::from_std(self.config.interval).unwrap_or(TimeDelta::MAX);
        let age = self
            .clock
            .now()
            .signed_duration_since(self.engine.snapshot().last_updated);
        age > interval
    }

    /// Load the source's calendar, falling back to what is installed.
    ///
    /// If the resulting calendar is stale, a refresh is started in the
    /// background and this returns without waiting for it.
    pub async fn load(&self) -> Arc<CalendarSnapshot> {
        match self.source.fetch().await {
            Ok(document) => {
                let snapshot = CalendarSnapshot::from_document(&document);
                info!(
                    periods = snapshot.calendar.len(),
                    source = %snapshot.source,
                    last_updated = %snapshot.last_updated,
                    "loaded blackout calendar"
                );
                self.engine.install(snapshot);
            }
            Err(e) => {
                let current = self.engine.snapshot();
                warn!(error = %e, source = %current.source, "blackout calendar unavailable, keeping current");
            }
        }

        if self.is_stale() {
            info!("blackout calendar is stale, refreshing in background");
            self.spawn_refresh();
        }

        self.engine.snapshot()
    }

    /// Refresh immediately, regardless of age.
    ///
    /// Only one refresh runs at a time; a concurrent call gets
    /// [`CalendarRefreshError::InProgress`].
    pub async fn refresh_now(&self) -> Result<Arc<CalendarSnapshot>, CalendarRefreshError> {
        let Ok(_running) = self.refreshing.try_lock() else {
            debug!("calendar refresh already running");
            return Err(CalendarRefreshError::InProgress);
        };

        let result = self.source.refresh().await;

        match result {
            Ok(document) => {
                let snapshot = CalendarSnapshot::from_document(&document);
                info!(periods = snapshot.calendar.len(), "refreshed blackout calendar");
                self.engine.install(snapshot);
                Ok(self.engine.snapshot())
            }
            Err(e) => {
                warn!(error = %e, "blackout calendar refresh failed, keeping current");
                Err(e)
            }
        }
    }

    /// Run [`refresh_now`](Self::refresh_now) on a background task.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let refresher = self.clone();
        tokio::spawn(async move {
            // Failures are already logged
            let _ = refresher.refresh_now().await;
        })
    }

    /// Periodically refresh whenever the calendar goes stale.
    pub fn spawn_periodic(&self) -> JoinHandle<()> {
        let refresher = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresher.config.check_every);
            interval.tick().await; // First tick is immediate, skip it
            loop {
                interval.tick().await;
                if refresher.is_stale() {
                    let _ = refresher.refresh_now().await;
                }
            }
        })
    }
}
