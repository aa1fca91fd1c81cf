//! Search orchestration.
//!
//! One [`Orchestrator`] runs at most one streaming search at a time. Each
//! call to [`Orchestrator::search`] opens a new session: it checks the
//! cache, and on a miss streams batches from the provider, annotating and
//! forwarding each one, then commits everything it saw to the cache when
//! the provider signals completion.
//!
//! Starting a session supersedes the previous one. A superseded session
//! stops reading its stream and never invokes another callback, even if its
//! transport still had events buffered.

mod observer;
mod session;

#[cfg(test)]
mod search_tests;

use std::sync::{Mutex, MutexGuard};

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStorage, SearchCache, SearchSnapshot};
use crate::domain::{CacheKey, Flight, SearchRequest};
use crate::eligibility::{AnnotatedFlight, EligibilityEngine};
use crate::planner::{PlanError, PlannerConfig, TripPlanRequest, TripPlanResult, TripPlanner};
use crate::provider::{SearchTransport, StreamEvent, TransportError, decode_events};

pub use observer::{CompletionInfo, FlightBatch, SearchError, SearchObserver, SearchUpdate};
pub use session::{SessionOutcome, SessionState};

use session::{ActiveSlot, Session};

/// Result of a non-streaming search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub flights: Vec<AnnotatedFlight>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_airline: Option<String>,
}

/// Drives searches against a transport, through a cache, with eligibility
/// annotation.
pub struct Orchestrator<T, S> {
    transport: T,
    cache: SearchCache<S>,
    eligibility: EligibilityEngine,
    planner_config: PlannerConfig,
    active: Mutex<ActiveSlot>,
}

impl<T: SearchTransport, S: CacheStorage> Orchestrator<T, S> {
    pub fn new(transport: T, cache: SearchCache<S>, eligibility: EligibilityEngine) -> Self {
        Self {
            transport,
            cache,
            eligibility,
            planner_config: PlannerConfig::default(),
            active: Mutex::new(ActiveSlot::default()),
        }
    }

    pub fn with_planner_config(mut self, config: PlannerConfig) -> Self {
        self.planner_config = config;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &SearchCache<S> {
        &self.cache
    }

    pub fn eligibility(&self) -> &EligibilityEngine {
        &self.eligibility
    }

    /// State of the most recent session.
    pub fn state(&self) -> SessionState {
        self.lock_active().state
    }

    /// Abort the active session, if any. Its remaining events are dropped.
    pub fn cancel(&self) {
        let mut active = self.lock_active();
        active.cancel.cancel();
        if active.state.is_active() {
            info!(session = active.id, "search cancelled");
            active.state = SessionState::Aborted;
        }
    }

    /// Run one search session, reporting to `observer`.
    ///
    /// Returns once the session is complete, has failed, or has been
    /// superseded. Failures are reported through [`SearchObserver::on_error`];
    /// supersession is not reported at all.
    pub async fn search<O>(&self, request: &SearchRequest, observer: &O) -> SessionOutcome
    where
        O: SearchObserver + ?Sized,
    {
        let session = self.begin_session();

        if let Err(e) = request.validate() {
            return self.fail(&session, observer, SearchError::Invalid(e));
        }

        let key = request.cache_key();
        if let Some(snapshot) = self.cache.get(&key).await {
            debug!(session = session.id, %key, flights = snapshot.len(), "cache hit");
            return self.deliver_cached(&session, observer, snapshot);
        }
        debug!(session = session.id, %key, "cache miss");

        if !self.transition(&session, SessionState::Streaming) {
            return SessionOutcome::Superseded;
        }

        let opened = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return SessionOutcome::Superseded,
            opened = self.transport.open_stream(request) => opened,
        };
        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(&session, observer, e.into()),
        };

        let mut events = decode_events(bytes);
        let mut accumulated: Vec<Flight> = Vec::new();
        let mut received = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = session.cancel.cancelled() => return SessionOutcome::Superseded,
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => return self.fail(&session, observer, e.into()),
                None => {
                    let incomplete = TransportError::Incomplete { events: received };
                    return self.fail(&session, observer, incomplete.into());
                }
            };
            received += 1;

            let delivered = match event {
                StreamEvent::Flights { route, flights, .. } => {
                    debug!(session = session.id, route = route.as_deref(), flights = flights.len(), "batch received");
                    accumulated.extend(flights.iter().cloned());
                    let batch = FlightBatch {
                        route,
                        flights: self.eligibility.annotate_all(flights),
                    };
                    self.deliver(&session, || observer.on_flights(&batch))
                }
                StreamEvent::FallbackNotice { notice, airline } => self.deliver(&session, || {
                    observer.on_fallback_notice(&notice, airline.as_deref())
                }),
                StreamEvent::Error(message) => {
                    warn!(session = session.id, %message, "provider reported an error");
                    let error = SearchError::Provider(message);
                    self.deliver(&session, || observer.on_error(&error))
                }
                StreamEvent::Complete { total_flights } => {
                    return self
                        .commit(&session, observer, &key, accumulated, total_flights)
                        .await;
                }
            };

            if !delivered {
                return SessionOutcome::Superseded;
            }
        }
    }

    /// Run a search as a single request/response round trip.
    ///
    /// Shares the cache with [`search`](Self::search) but not its session:
    /// it neither supersedes nor is superseded by streaming searches.
    pub async fn search_once(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        request.validate()?;

        let key = request.cache_key();
        if let Some(snapshot) = self.cache.get(&key).await {
            debug!(%key, flights = snapshot.len(), "cache hit");
            return Ok(SearchResult {
                flights: self.eligibility.annotate_all(snapshot.flights),
                from_cache: true,
                data_source: snapshot.data_source,
                fallback_notice: None,
                fallback_airline: None,
            });
        }

        let response = self.transport.fetch_once(request).await?;
        let snapshot = SearchSnapshot {
            flights: response.flights,
            data_source: response.data_source,
        };
        self.cache.set(&key, &snapshot).await;
        info!(%key, flights = snapshot.len(), "search complete");

        Ok(SearchResult {
            flights: self.eligibility.annotate_all(snapshot.flights),
            from_cache: false,
            data_source: snapshot.data_source,
            fallback_notice: response.fallback_notice,
            fallback_airline: response.fallback_airline,
        })
    }

    /// Find the earliest departure with trips of the requested length.
    /// Results are annotated but never cached.
    pub async fn plan_trip(&self, request: &TripPlanRequest) -> Result<TripPlanResult, PlanError> {
        TripPlanner::new(&self.transport, &self.planner_config)
            .with_eligibility(&self.eligibility)
            .plan(request)
            .await
    }

    fn lock_active(&self) -> MutexGuard<'_, ActiveSlot> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the active slot, aborting whichever session held it.
    fn begin_session(&self) -> Session {
        let mut active = self.lock_active();
        active.cancel.cancel();
        if active.state.is_active() {
            info!(session = active.id, "search superseded");
            debug!(session = active.id, from = ?active.state, to = ?SessionState::Aborted, "session state");
        }

        let session = Session {
            id: active.id + 1,
            cancel: tokio_util::sync::CancellationToken::new(),
        };
        *active = ActiveSlot {
            id: session.id,
            cancel: session.cancel.clone(),
            state: SessionState::CacheCheck,
        };
        debug!(session = session.id, to = ?SessionState::CacheCheck, "session state");
        session
    }

    /// Move `session` to `state`. Returns false if it no longer owns the
    /// slot.
    fn transition(&self, session: &Session, state: SessionState) -> bool {
        let mut active = self.lock_active();
        if !active.is_current(session) {
            return false;
        }
        debug!(session = session.id, from = ?active.state, to = ?state, "session state");
        active.state = state;
        true
    }

    /// Invoke a callback if `session` is still current. The lock is held
    /// for the duration, so a concurrent supersede waits for it.
    fn deliver(&self, session: &Session, callback: impl FnOnce()) -> bool {
        let active = self.lock_active();
        if !active.is_current(session) {
            debug!(session = session.id, "dropping event for superseded session");
            return false;
        }
        callback();
        true
    }

    /// Deliver callbacks and move to a terminal state under one lock.
    fn finish(&self, session: &Session, state: SessionState, callback: impl FnOnce()) -> bool {
        let mut active = self.lock_active();
        if !active.is_current(session) {
            return false;
        }
        callback();
        debug!(session = session.id, from = ?active.state, to = ?state, "session state");
        active.state = state;
        true
    }

    fn fail<O>(&self, session: &Session, observer: &O, error: SearchError) -> SessionOutcome
    where
        O: SearchObserver + ?Sized,
    {
        warn!(session = session.id, error = %error, "search failed");
        if self.finish(session, SessionState::Failed, || observer.on_error(&error)) {
            SessionOutcome::Failed
        } else {
            SessionOutcome::Superseded
        }
    }

    fn deliver_cached<O>(&self, session: &Session, observer: &O, snapshot: SearchSnapshot) -> SessionOutcome
    where
        O: SearchObserver + ?Sized,
    {
        if !self.transition(session, SessionState::Delivering { from_cache: true }) {
            return SessionOutcome::Superseded;
        }

        let info = CompletionInfo {
            total: snapshot.len(),
            from_cache: true,
        };
        let batch = FlightBatch {
            route: None,
            flights: self.eligibility.annotate_all(snapshot.flights),
        };

        let done = self.finish(session, SessionState::Complete, || {
            if !batch.flights.is_empty() {
                observer.on_flights(&batch);
            }
            observer.on_complete(info);
        });

        if done {
            SessionOutcome::Complete {
                total: info.total,
                from_cache: true,
            }
        } else {
            SessionOutcome::Superseded
        }
    }

    /// Write everything the stream delivered to the cache, then report
    /// completion. A session superseded before this point commits nothing.
    async fn commit<O>(
        &self,
        session: &Session,
        observer: &O,
        key: &CacheKey,
        flights: Vec<Flight>,
        total_flights: Option<usize>,
    ) -> SessionOutcome
    where
        O: SearchObserver + ?Sized,
    {
        if !self.transition(session, SessionState::Committing) {
            return SessionOutcome::Superseded;
        }

        let snapshot = SearchSnapshot::new(flights);
        self.cache.set(key, &snapshot).await;

        let info = CompletionInfo {
            total: total_flights.unwrap_or(snapshot.len()),
            from_cache: false,
        };
        info!(session = session.id, %key, total = info.total, "search complete");

        if self.finish(session, SessionState::Complete, || observer.on_complete(info)) {
            SessionOutcome::Complete {
                total: info.total,
                from_cache: false,
            }
        } else {
            SessionOutcome::Superseded
        }
    }
}
