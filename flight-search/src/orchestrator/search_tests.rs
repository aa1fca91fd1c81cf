use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc;

use super::*;
use crate::cache::{CacheConfig, MemoryStorage};
use crate::clock::{Clock, ManualClock};
use crate::domain::{AirportCode, RawFlight, RawPrice, TripType};
use crate::planner::DurationUnit;
use crate::provider::{ScriptedTransport, SearchResponse};

type TestOrchestrator = Orchestrator<ScriptedTransport, MemoryStorage>;

fn code(s: &str) -> AirportCode {
    AirportCode::parse(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn flight(number: &str, destination: &str) -> Flight {
    Flight::from_raw(RawFlight {
        origin: Some("DEN".into()),
        destination: Some(destination.into()),
        airline: Some("Frontier Airlines".into()),
        flight_number: Some(number.into()),
        departure_date: Some("2026-03-10".into()),
        departure_time: Some("08:00".into()),
        arrival_time: Some("10:30".into()),
        price: Some(RawPrice::Number(59.0)),
        pass_eligible: Some(true),
        ..RawFlight::default()
    })
    .unwrap()
}

fn batch(route: &str, flights: Vec<Flight>) -> StreamEvent {
    StreamEvent::Flights {
        route: Some(route.to_string()),
        count: Some(flights.len()),
        flights,
    }
}

fn complete(total: usize) -> StreamEvent {
    StreamEvent::Complete {
        total_flights: Some(total),
    }
}

fn request(destinations: &[&str]) -> SearchRequest {
    SearchRequest::one_way(
        vec![code("DEN")],
        destinations.iter().map(|d| code(d)).collect(),
        date("2026-03-10"),
    )
}

fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
}

fn orchestrator(transport: &ScriptedTransport, clock: &ManualClock) -> TestOrchestrator {
    let cache = SearchCache::with_clock(
        MemoryStorage::default(),
        CacheConfig::default(),
        Arc::new(clock.clone()),
    );
    let eligibility = EligibilityEngine::with_fallback(clock.now());
    Orchestrator::new(transport.clone(), cache, eligibility)
}

/// Everything received so far, without waiting.
fn drain(rx: &mut mpsc::UnboundedReceiver<SearchUpdate>) -> Vec<SearchUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

fn batch_numbers(update: &SearchUpdate) -> Vec<String> {
    match update {
        SearchUpdate::Flights(batch) => batch
            .flights
            .iter()
            .map(|f| f.flight.flight_number.clone())
            .collect(),
        other => panic!("expected flights, got {other:?}"),
    }
}

#[tokio::test]
async fn batches_delivered_in_order_and_union_committed() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    transport.push_events(&[
        batch("DEN->LAS", vec![flight("F1", "LAS"), flight("F2", "LAS")]),
        batch("DEN->PHX", vec![flight("F3", "PHX")]),
        complete(3),
    ]);

    let req = request(&["LAS", "PHX"]);
    let outcome = orch.search(&req, &tx).await;
    assert_eq!(
        outcome,
        SessionOutcome::Complete {
            total: 3,
            from_cache: false
        }
    );
    assert_eq!(orch.state(), SessionState::Complete);

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 3);
    assert_eq!(batch_numbers(&updates[0]), vec!["F1", "F2"]);
    assert_eq!(batch_numbers(&updates[1]), vec!["F3"]);
    assert_eq!(
        updates[2],
        SearchUpdate::Complete(CompletionInfo {
            total: 3,
            from_cache: false
        })
    );

    let cached = orch.cache().get(&req.cache_key()).await.unwrap();
    let numbers: Vec<&str> = cached.flights.iter().map(|f| f.flight_number.as_str()).collect();
    assert_eq!(numbers, vec!["F1", "F2", "F3"]);
}

#[tokio::test]
async fn two_route_search_then_repeat_served_from_cache() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);

    let las = vec![flight("F9-100", "LAS"), flight("F9-101", "LAS")];
    let phx = vec![
        flight("F9-200", "PHX"),
        flight("F9-201", "PHX"),
        flight("F9-202", "PHX"),
    ];
    transport.push_events(&[
        batch("DEN->LAS", las.clone()),
        batch("DEN->PHX", phx.clone()),
        complete(5),
    ]);

    let req = request(&["LAS", "PHX"]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    orch.search(&req, &tx).await;
    drain(&mut rx);

    let expected: Vec<Flight> = las.into_iter().chain(phx).collect();
    let cached = orch.cache().get(&req.cache_key()).await.unwrap();
    assert_eq!(cached.flights, expected);

    clock.advance(chrono::Duration::minutes(59));
    let outcome = orch.search(&req, &tx).await;
    assert_eq!(
        outcome,
        SessionOutcome::Complete {
            total: 5,
            from_cache: true
        }
    );
    assert_eq!(transport.stream_calls(), 1);

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 2);
    match &updates[0] {
        SearchUpdate::Flights(batch) => {
            let flights: Vec<Flight> = batch.flights.iter().map(|f| f.flight.clone()).collect();
            assert_eq!(flights, expected);
            assert!(batch.flights.iter().all(|f| f.eligibility.eligible));
        }
        other => panic!("expected flights, got {other:?}"),
    }
    assert_eq!(
        updates[1],
        SearchUpdate::Complete(CompletionInfo {
            total: 5,
            from_cache: true
        })
    );
}

#[tokio::test]
async fn expired_entry_searches_again() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, _rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    transport.push_events(&[batch("DEN->LAS", vec![flight("OLD", "LAS")]), complete(1)]);
    orch.search(&req, &tx).await;

    clock.advance(chrono::Duration::minutes(61));
    transport.push_events(&[batch("DEN->LAS", vec![flight("NEW", "LAS")]), complete(1)]);
    let outcome = orch.search(&req, &tx).await;

    assert_eq!(
        outcome,
        SessionOutcome::Complete {
            total: 1,
            from_cache: false
        }
    );
    assert_eq!(transport.stream_calls(), 2);
    let cached = orch.cache().get(&req.cache_key()).await.unwrap();
    assert_eq!(cached.flights[0].flight_number, "NEW");
}

#[tokio::test]
async fn empty_cached_result_completes_without_flights() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    transport.push_events(&[complete(0)]);
    orch.search(&req, &tx).await;
    drain(&mut rx);

    orch.search(&req, &tx).await;
    assert_eq!(
        drain(&mut rx),
        vec![SearchUpdate::Complete(CompletionInfo {
            total: 0,
            from_cache: true
        })]
    );
}

#[tokio::test]
async fn rejected_request_reports_error_and_skips_cache() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    transport.push_stream_error(TransportError::from_status(500, r#"{"error": "scraper down"}"#));
    let outcome = orch.search(&req, &tx).await;

    assert_eq!(outcome, SessionOutcome::Failed);
    assert_eq!(orch.state(), SessionState::Failed);
    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 1);
    match &updates[0] {
        SearchUpdate::Error(message) => {
            assert!(message.contains("500"));
            assert!(message.contains("scraper down"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(orch.cache().get(&req.cache_key()).await.is_none());
}

#[tokio::test]
async fn stream_without_completion_is_not_cached() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    transport.push_events(&[batch("DEN->LAS", vec![flight("F1", "LAS")])]);
    let outcome = orch.search(&req, &tx).await;

    assert_eq!(outcome, SessionOutcome::Failed);
    let updates = drain(&mut rx);
    assert_eq!(batch_numbers(&updates[0]), vec!["F1"]);
    assert!(matches!(&updates[1], SearchUpdate::Error(m) if m.contains("without completing")));
    assert!(orch.cache().get(&req.cache_key()).await.is_none());
}

#[tokio::test]
async fn transport_failure_mid_stream_is_not_cached() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    let mut script = transport.push_stream();
    script.send(&batch("DEN->LAS", vec![flight("F1", "LAS")]));
    script.fail(TransportError::Unavailable("connection reset".into()));

    assert_eq!(orch.search(&req, &tx).await, SessionOutcome::Failed);
    let updates = drain(&mut rx);
    assert!(matches!(&updates[1], SearchUpdate::Error(m) if m.contains("connection reset")));
    assert!(orch.cache().get(&req.cache_key()).await.is_none());
}

#[tokio::test]
async fn provider_errors_and_notices_do_not_end_stream() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = request(&["LAS", "PHX"]);

    transport.push_events(&[
        StreamEvent::FallbackNotice {
            notice: "Showing Spirit fares".into(),
            airline: Some("Spirit".into()),
        },
        StreamEvent::Error("DEN->LAS timed out".into()),
        batch("DEN->PHX", vec![flight("F3", "PHX")]),
        complete(1),
    ]);

    let outcome = orch.search(&req, &tx).await;
    assert_eq!(
        outcome,
        SessionOutcome::Complete {
            total: 1,
            from_cache: false
        }
    );

    let updates = drain(&mut rx);
    assert_eq!(
        updates[0],
        SearchUpdate::FallbackNotice {
            notice: "Showing Spirit fares".into(),
            airline: Some("Spirit".into()),
        }
    );
    assert!(matches!(&updates[1], SearchUpdate::Error(m) if m.contains("timed out")));
    assert_eq!(batch_numbers(&updates[2]), vec!["F3"]);
    assert!(matches!(updates[3], SearchUpdate::Complete(_)));
}

#[tokio::test]
async fn malformed_events_are_skipped() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    let mut script = transport.push_stream();
    script.send_raw("data: {\"flights\": [\n\n");
    script.send(&batch("DEN->LAS", vec![flight("F1", "LAS")]));
    script.send(&complete(1));
    script.close();

    let outcome = orch.search(&req, &tx).await;
    assert!(matches!(outcome, SessionOutcome::Complete { total: 1, .. }));
    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 2);
    assert_eq!(batch_numbers(&updates[0]), vec!["F1"]);
}

#[tokio::test]
async fn invalid_request_never_reaches_transport() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let req = SearchRequest::one_way(vec![], vec![code("LAS")], date("2026-03-10"));
    assert_eq!(orch.search(&req, &tx).await, SessionOutcome::Failed);
    assert!(matches!(&drain(&mut rx)[0], SearchUpdate::Error(m) if m.contains("invalid search request")));
    assert_eq!(transport.stream_calls(), 0);
}

#[tokio::test]
async fn newer_search_silences_older_session() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = Arc::new(orchestrator(&transport, &clock));
    let req_a = request(&["LAS"]);
    let req_b = request(&["PHX"]);

    let mut script_a = transport.push_stream();
    script_a.send(&batch("DEN->LAS", vec![flight("A1", "LAS")]));

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let task_a = tokio::spawn({
        let orch = Arc::clone(&orch);
        let req = req_a.clone();
        async move { orch.search(&req, &tx_a).await }
    });

    let first = rx_a.recv().await.unwrap();
    assert_eq!(batch_numbers(&first), vec!["A1"]);
    assert_eq!(orch.state(), SessionState::Streaming);

    transport.push_events(&[batch("DEN->PHX", vec![flight("B1", "PHX")]), complete(1)]);
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let outcome_b = orch.search(&req_b, &tx_b).await;
    assert!(matches!(outcome_b, SessionOutcome::Complete { total: 1, .. }));

    // The superseded transport still has events to give
    script_a.send(&batch("DEN->LAS", vec![flight("A2", "LAS")]));
    script_a.send(&complete(2));

    assert_eq!(task_a.await.unwrap(), SessionOutcome::Superseded);
    assert!(drain(&mut rx_a).is_empty());
    assert!(script_a.is_cancelled());
    assert!(orch.cache().get(&req_a.cache_key()).await.is_none());

    let updates_b = drain(&mut rx_b);
    assert_eq!(batch_numbers(&updates_b[0]), vec!["B1"]);
    assert_eq!(orch.state(), SessionState::Complete);
}

#[tokio::test]
async fn cancel_aborts_active_session() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = Arc::new(orchestrator(&transport, &clock));
    let req = request(&["LAS"]);

    let mut script = transport.push_stream();
    script.send(&batch("DEN->LAS", vec![flight("F1", "LAS")]));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn({
        let orch = Arc::clone(&orch);
        let req = req.clone();
        async move { orch.search(&req, &tx).await }
    });
    rx.recv().await.unwrap();

    orch.cancel();
    assert_eq!(orch.state(), SessionState::Aborted);
    script.send(&complete(1));

    assert_eq!(task.await.unwrap(), SessionOutcome::Superseded);
    assert!(drain(&mut rx).is_empty());
    assert!(orch.cache().get(&req.cache_key()).await.is_none());
}

#[tokio::test]
async fn search_once_caches_result() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let req = request(&["LAS"]);

    transport.push_response(Ok(SearchResponse {
        flights: vec![flight("F1", "LAS"), flight("F2", "LAS")],
        data_source: Some("scraper".into()),
        fallback_notice: Some("Using cached fares".into()),
        fallback_airline: None,
    }));

    let first = orch.search_once(&req).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.flights.len(), 2);
    assert_eq!(first.fallback_notice.as_deref(), Some("Using cached fares"));

    let second = orch.search_once(&req).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.data_source.as_deref(), Some("scraper"));
    assert_eq!(second.flights, first.flights);
    assert_eq!(transport.fetch_calls(), 1);
}

#[tokio::test]
async fn search_once_failure_is_an_error() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let req = request(&["LAS"]);

    transport.push_response(Err(TransportError::Status {
        status: 503,
        message: "maintenance".into(),
    }));

    let err = orch.search_once(&req).await.unwrap_err();
    assert!(matches!(err, SearchError::Transport(TransportError::Status { status: 503, .. })));
    assert!(orch.cache().get(&req.cache_key()).await.is_none());
}

#[tokio::test]
async fn streamed_result_serves_search_once() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock);
    let (tx, _rx) = mpsc::unbounded_channel();
    let req = request(&["LAS"]);

    transport.push_events(&[batch("DEN->LAS", vec![flight("F1", "LAS")]), complete(1)]);
    orch.search(&req, &tx).await;

    let result = orch.search_once(&req).await.unwrap();
    assert!(result.from_cache);
    assert_eq!(transport.fetch_calls(), 0);
}

#[tokio::test]
async fn planned_trips_bypass_cache() {
    let transport = ScriptedTransport::new();
    let clock = test_clock();
    let orch = orchestrator(&transport, &clock).with_planner_config(PlannerConfig::new(1, 20, 1));

    let mut raw = RawFlight {
        origin: Some("DEN".into()),
        destination: Some("LAS".into()),
        flight_number: Some("F9-1".into()),
        departure_date: Some("2026-03-10".into()),
        departure_time: Some("08:00".into()),
        arrival_time: Some("10:00".into()),
        pass_eligible: Some(true),
        ..RawFlight::default()
    };
    raw.return_flight = Some(Box::new(RawFlight {
        origin: Some("LAS".into()),
        destination: Some("DEN".into()),
        flight_number: Some("F9-2".into()),
        departure_date: Some("2026-03-12".into()),
        departure_time: Some("08:00".into()),
        arrival_time: Some("10:00".into()),
        ..RawFlight::default()
    }));
    transport.push_response(Ok(SearchResponse::default()));
    transport.push_response(Ok(SearchResponse::new(vec![Flight::from_raw(raw).unwrap()])));
    transport.push_response(Ok(SearchResponse::default()));

    let plan = TripPlanRequest {
        origins: vec![code("DEN")],
        destinations: vec![code("LAS")],
        departure_date: date("2026-03-10"),
        trip_length: 2.0,
        trip_length_unit: DurationUnit::Days,
        nonstop_preferred: false,
        max_trip_duration: None,
        max_trip_duration_unit: DurationUnit::Days,
    };
    let result = orch.plan_trip(&plan).await.unwrap();

    assert_eq!(result.flights.len(), 1);
    assert_eq!(result.flights[0].trip_hours, 50.0);
    assert!(result.flights[0].eligibility.is_some());
    assert_eq!(transport.requests()[0].trip_type, TripType::RoundTrip);
    assert_eq!(orch.cache().stats().await.total, 0);
}
