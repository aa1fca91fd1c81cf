//! Blackout calendar data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// An inclusive date range during which pass fares cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub description: String,
}

impl BlackoutPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            start,
            end,
            description: description.into(),
        }
    }

    /// Whether `date` falls within this period, both ends inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Blackout periods indexed by calendar year.
///
/// Each year's periods are kept sorted by start date, whatever order they
/// were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlackoutCalendar {
    years: BTreeMap<i32, Vec<BlackoutPeriod>>,
}

impl BlackoutCalendar {
    /// Build a calendar from per-year period lists.
    pub fn new(years: BTreeMap<i32, Vec<BlackoutPeriod>>) -> Self {
        let mut years = years;
        for periods in years.values_mut() {
            periods.sort_by_key(|p| p.start);
        }
        Self { years }
    }

    /// Build a calendar, filing each period under the year it starts in.
    pub fn from_periods(periods: impl IntoIterator<Item = BlackoutPeriod>) -> Self {
        let mut years: BTreeMap<i32, Vec<BlackoutPeriod>> = BTreeMap::new();
        for period in periods {
            years.entry(period.start.year()).or_default().push(period);
        }
        Self::new(years)
    }

    /// The periods listed for `year`, sorted by start. Empty if the year is
    /// not present.
    pub fn periods_for(&self, year: i32) -> &[BlackoutPeriod] {
        self.years.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first period (by start) in `date`'s year that contains `date`.
    pub fn find(&self, date: NaiveDate) -> Option<&BlackoutPeriod> {
        self.periods_for(date.year())
            .iter()
            .find(|p| p.contains(date))
    }

    /// Whether `date` is blacked out.
    pub fn is_blacked_out(&self, date: NaiveDate) -> bool {
        self.find(date).is_some()
    }

    /// Years with an entry, ascending.
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    /// Total number of periods across all years.
    pub fn len(&self) -> usize {
        self.years.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periods of `year` that have not yet ended as of `today`, grouped by
    /// the month they start in.
    pub fn grouped_for_display(&self, year: i32, today: NaiveDate) -> Vec<MonthGroup> {
        let mut groups: Vec<MonthGroup> = Vec::new();

        for period in self.periods_for(year).iter().filter(|p| p.end >= today) {
            let month = period.start.month();
            match groups.last_mut() {
                Some(group) if group.month == month => group.periods.push(period.clone()),
                _ => groups.push(MonthGroup {
                    month,
                    name: month_name(month).to_string(),
                    periods: vec![period.clone()],
                }),
            }
        }

        groups
    }

    /// The calendar used when no source has ever been loaded.
    pub fn fallback() -> Self {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap_or_default();
        let p = |start, end, description: &str| BlackoutPeriod::new(start, end, description);

        Self::from_periods([
            p(d(2026, 1, 1), d(2026, 1, 1), "New Year's Day"),
            p(d(2026, 1, 3), d(2026, 1, 4), "New Year's Return"),
            p(d(2026, 1, 15), d(2026, 1, 16), "Martin Luther King Jr. Day"),
            p(d(2026, 1, 19), d(2026, 1, 19), "Martin Luther King Jr. Day Return"),
            p(d(2026, 2, 12), d(2026, 2, 13), "Presidents' Day"),
            p(d(2026, 2, 16), d(2026, 2, 16), "Presidents' Day Return"),
            p(d(2026, 3, 13), d(2026, 3, 15), "Spring Break"),
            p(d(2026, 3, 20), d(2026, 3, 22), "Spring Break"),
            p(d(2026, 4, 2), d(2026, 4, 6), "Easter"),
            p(d(2026, 5, 21), d(2026, 5, 22), "Memorial Day"),
            p(d(2026, 5, 25), d(2026, 5, 25), "Memorial Day Return"),
            p(d(2026, 7, 2), d(2026, 7, 6), "Independence Day"),
            p(d(2026, 9, 3), d(2026, 9, 4), "Labor Day"),
            p(d(2026, 9, 7), d(2026, 9, 7), "Labor Day Return"),
            p(d(2026, 10, 8), d(2026, 10, 12), "Columbus Day"),
            p(d(2026, 11, 24), d(2026, 11, 25), "Thanksgiving"),
            p(d(2026, 11, 28), d(2026, 11, 30), "Thanksgiving Return"),
            p(d(2026, 12, 19), d(2026, 12, 31), "Christmas and New Year"),
            p(d(2027, 1, 1), d(2027, 1, 3), "New Year's Day"),
            p(d(2027, 1, 15), d(2027, 1, 18), "Martin Luther King Jr. Day"),
            p(d(2027, 2, 12), d(2027, 2, 15), "Presidents' Day"),
            p(d(2027, 3, 25), d(2027, 3, 29), "Easter"),
            p(d(2027, 5, 27), d(2027, 5, 31), "Memorial Day"),
            p(d(2027, 7, 1), d(2027, 7, 5), "Independence Day"),
            p(d(2027, 9, 2), d(2027, 9, 6), "Labor Day"),
            p(d(2027, 11, 23), d(2027, 11, 24), "Thanksgiving"),
            p(d(2027, 11, 27), d(2027, 11, 29), "Thanksgiving Return"),
            p(d(2027, 12, 18), d(2027, 12, 31), "Christmas and New Year"),
        ])
    }
}

/// Periods starting in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGroup {
    pub month: u32,
    pub name: String,
    pub periods: Vec<BlackoutPeriod>,
}

fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    month
        .checked_sub(1)
        .and_then(|i| NAMES.get(i as usize))
        .copied()
        .unwrap_or("Unknown")
}

/// The calendar as exchanged with sources:
/// `{ "last_updated": ..., "blackout_periods": { "2026": [...] }, "source": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDocument {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub blackout_periods: BTreeMap<String, Vec<BlackoutPeriod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CalendarDocument {
    /// Describe a calendar as a document.
    pub fn from_calendar(
        calendar: &BlackoutCalendar,
        last_updated: DateTime<Utc>,
        source: Option<String>,
    ) -> Self {
        let blackout_periods = calendar
            .years
            .iter()
            .map(|(year, periods)| (year.to_string(), periods.clone()))
            .collect();
        Self {
            last_updated,
            blackout_periods,
            source,
        }
    }

    /// Convert to a calendar. Year keys that are not integers are skipped.
    pub fn to_calendar(&self) -> BlackoutCalendar {
        let mut years = BTreeMap::new();
        for (key, periods) in &self.blackout_periods {
            match key.trim().parse::<i32>() {
                Ok(year) => {
                    years.insert(year, periods.clone());
                }
                Err(_) => warn!(key = %key, "ignoring blackout periods under non-numeric year"),
            }
        }
        BlackoutCalendar::new(years)
    }
}

/// Accepts RFC 3339 timestamps as well as naive ISO-8601 timestamps and bare
/// dates, which are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
