//! Pass-fare eligibility under a blackout calendar.
//!
//! A flight's fare class is either pass-eligible or not; that is fixed by the
//! provider. The blackout calendar then decides whether an eligible fare is
//! usable on a given date. [`EligibilityEngine`] answers that question
//! against whichever calendar is installed, and [`CalendarRefresher`] keeps
//! the installed calendar current from a [`CalendarSource`].

mod calendar;
mod engine;
mod error;
mod refresh;
mod source;

pub use calendar::{BlackoutCalendar, BlackoutPeriod, CalendarDocument, MonthGroup};
pub use engine::{
    AnnotatedFlight, BlackoutStatus, CalendarSnapshot, EligibilityAnnotation, EligibilityEngine,
    FALLBACK_SOURCE,
};
pub use error::CalendarRefreshError;
pub use refresh::{CalendarRefresher, RefreshConfig};
pub use source::{CalendarSource, FileCalendarSource, HttpCalendarSource};
