//! Read side of the eligibility engine.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Flight;

use super::calendar::{BlackoutCalendar, CalendarDocument, MonthGroup};

/// Source label for the built-in calendar.
pub const FALLBACK_SOURCE: &str = "fallback";

/// Whether a flight's pass fare can be used on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityAnnotation {
    /// Fare-class eligibility, independent of blackouts.
    pub eligible: bool,
    pub blackout: BlackoutStatus,
}

impl EligibilityAnnotation {
    /// An eligible fare on a date that is not blacked out.
    pub fn is_usable(&self) -> bool {
        self.eligible && !self.blackout.has_blackout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutStatus {
    pub has_blackout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A flight together with its eligibility at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedFlight {
    #[serde(flatten)]
    pub flight: Flight,
    pub eligibility: EligibilityAnnotation,
}

/// One installed calendar and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSnapshot {
    pub calendar: BlackoutCalendar,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

impl CalendarSnapshot {
    /// The built-in calendar, stamped with `now`.
    pub fn fallback(now: DateTime<Utc>) -> Self {
        Self {
            calendar: BlackoutCalendar::fallback(),
            last_updated: now,
            source: FALLBACK_SOURCE.to_string(),
        }
    }

    pub fn from_document(document: &CalendarDocument) -> Self {
        Self {
            calendar: document.to_calendar(),
            last_updated: document.last_updated,
            source: document
                .source
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    pub fn to_document(&self) -> CalendarDocument {
        CalendarDocument::from_calendar(
            &self.calendar,
            self.last_updated,
            Some(self.source.clone()),
        )
    }

    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }
}

/// Answers eligibility questions against the current blackout calendar.
///
/// The calendar is replaced as a whole: readers clone the `Arc` of whichever
/// snapshot is installed and never observe a partially updated calendar.
/// Cloning the engine shares the calendar.
#[derive(Debug, Clone)]
pub struct EligibilityEngine {
    current: Arc<RwLock<Arc<CalendarSnapshot>>>,
}

impl EligibilityEngine {
    pub fn new(snapshot: CalendarSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// An engine serving the built-in calendar.
    pub fn with_fallback(now: DateTime<Utc>) -> Self {
        Self::new(CalendarSnapshot::fallback(now))
    }

    /// The calendar currently in use.
    pub fn snapshot(&self) -> Arc<CalendarSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the calendar.
    pub fn install(&self, snapshot: CalendarSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// Check one date against the calendar for `flight`'s fare.
    pub fn is_eligible(&self, flight: &Flight, pass_date: NaiveDate) -> EligibilityAnnotation {
        let snapshot = self.snapshot();
        let blackout = match snapshot.calendar.find(pass_date) {
            Some(period) => BlackoutStatus {
                has_blackout: true,
                message: Some(format!(
                    "{} falls within blackout period: {}",
                    pass_date, period.description
                )),
            },
            None => BlackoutStatus::default(),
        };

        EligibilityAnnotation {
            eligible: flight.pass_eligible,
            blackout,
        }
    }

    /// Check every leg of `flight`, reporting the first blacked-out one.
    pub fn annotate(&self, flight: &Flight) -> EligibilityAnnotation {
        let snapshot = self.snapshot();
        let legs = std::iter::once(("Departure", flight.departure_date)).chain(
            flight
                .return_flight
                .iter()
                .map(|r| ("Return", r.departure_date)),
        );

        for (leg, date) in legs {
            if let Some(period) = snapshot.calendar.find(date) {
                return EligibilityAnnotation {
                    eligible: flight.pass_eligible,
                    blackout: BlackoutStatus {
                        has_blackout: true,
                        message: Some(format!(
                            "{leg} date {date} falls within blackout period: {}",
                            period.description
                        )),
                    },
                };
            }
        }

        EligibilityAnnotation {
            eligible: flight.pass_eligible,
            blackout: BlackoutStatus::default(),
        }
    }

    /// Attach an annotation to each flight.
    pub fn annotate_all(&self, flights: impl IntoIterator<Item = Flight>) -> Vec<AnnotatedFlight> {
        flights
            .into_iter()
            .map(|flight| {
                let eligibility = self.annotate(&flight);
                AnnotatedFlight {
                    flight,
                    eligibility,
                }
            })
            .collect()
    }

    /// Upcoming blackout periods of `year`, grouped by month.
    pub fn grouped_for_display(&self, year: i32, today: NaiveDate) -> Vec<MonthGroup> {
        self.snapshot().calendar.grouped_for_display(year, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawFlight;
    use crate::eligibility::BlackoutPeriod;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap()
    }

    fn flight(departure: &str, ret: Option<&str>, eligible: bool) -> Flight {
        let leg = |origin: &str, destination: &str, day: &str| RawFlight {
            origin: Some(origin.into()),
            destination: Some(destination.into()),
            flight_number: Some("F9-100".into()),
            departure_date: Some(day.into()),
            departure_time: Some("08:00".into()),
            arrival_time: Some("10:00".into()),
            pass_eligible: Some(eligible),
            ..RawFlight::default()
        };
        let mut raw = leg("DEN", "LAS", departure);
        raw.return_flight = ret.map(|d| Box::new(leg("LAS", "DEN", d)));
        Flight::from_raw(raw).unwrap()
    }

    fn engine() -> EligibilityEngine {
        EligibilityEngine::new(CalendarSnapshot {
            calendar: BlackoutCalendar::from_periods([BlackoutPeriod::new(
                date("2026-01-15"),
                date("2026-01-16"),
                "MLK Weekend",
            )]),
            last_updated: now(),
            source: "test".into(),
        })
    }

    #[test]
    fn blackout_gates_but_does_not_change_eligibility() {
        let engine = engine();
        let f = flight("2026-01-15", None, true);

        let verdict = engine.is_eligible(&f, date("2026-01-15"));
        assert!(verdict.eligible);
        assert!(verdict.blackout.has_blackout);
        assert!(verdict.blackout.message.unwrap().contains("MLK Weekend"));
        assert!(!engine.is_eligible(&f, date("2026-01-15")).is_usable());

        let verdict = engine.is_eligible(&f, date("2026-01-17"));
        assert!(verdict.is_usable());
        assert_eq!(verdict.blackout.message, None);

        let ineligible = flight("2026-01-20", None, false);
        let verdict = engine.is_eligible(&ineligible, date("2026-01-20"));
        assert!(!verdict.eligible);
        assert!(!verdict.blackout.has_blackout);
    }

    #[test]
    fn round_trip_checks_return_leg() {
        let engine = engine();
        let f = flight("2026-01-10", Some("2026-01-16"), true);

        let verdict = engine.annotate(&f);
        assert!(verdict.blackout.has_blackout);
        assert!(verdict.blackout.message.unwrap().starts_with("Return date 2026-01-16"));

        let clear = flight("2026-01-10", Some("2026-01-14"), true);
        assert!(engine.annotate(&clear).is_usable());
    }

    #[test]
    fn install_replaces_whole_calendar() {
        let engine = engine();
        let reader = engine.clone();
        let before = reader.snapshot();

        engine.install(CalendarSnapshot::fallback(now()));

        // Old readers keep their snapshot, new reads see the new one
        assert_eq!(before.source, "test");
        assert!(reader.snapshot().is_fallback());
        assert!(reader.snapshot().calendar.len() > 1);
    }

    #[test]
    fn annotation_wire_format() {
        let engine = engine();
        let annotated = engine.annotate_all([flight("2026-01-16", None, true)]);
        let json = serde_json::to_value(&annotated[0]).unwrap();

        assert_eq!(json["flightNumber"], "F9-100");
        assert_eq!(json["eligibility"]["eligible"], true);
        assert_eq!(json["eligibility"]["blackout"]["hasBlackout"], true);
    }

    #[test]
    fn snapshot_document_round_trip() {
        let snapshot = CalendarSnapshot::fallback(now());
        let back = CalendarSnapshot::from_document(&snapshot.to_document());
        assert_eq!(back, snapshot);
    }
}
