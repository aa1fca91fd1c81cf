//! Trip ranking for planner results.
//!
//! Orders candidate trips so the closest match to the requested length comes
//! first.

use std::cmp::Ordering;

use super::search::TripOption;

/// Rank trips by preference.
///
/// Trips are ranked by:
/// 1. Nonstop on both legs, when `nonstop_preferred`
/// 2. Deviation from the requested trip length (smaller is better)
/// 3. Price (cheaper is better; unknown prices last)
///
/// Returns trips sorted best-first. The sort is stable, so equally ranked
/// trips keep their search order.
pub fn rank_trips(mut trips: Vec<TripOption>, nonstop_preferred: bool) -> Vec<TripOption> {
    trips.sort_by(|a, b| {
        // Primary: nonstop first, if asked for
        if nonstop_preferred {
            let stops_cmp = b.is_nonstop().cmp(&a.is_nonstop());
            if stops_cmp != Ordering::Equal {
                return stops_cmp;
            }
        }

        // Secondary: closeness to the target length
        let dev_cmp = a.deviation_hours.total_cmp(&b.deviation_hours);
        if dev_cmp != Ordering::Equal {
            return dev_cmp;
        }

        // Tertiary: price
        match (a.total_price(), b.total_price()) {
            (Some(pa), Some(pb)) => pa.total_cmp(&pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });

    trips
}

/// Deduplicate trips that pair the same outbound and return flights.
///
/// Keeps the first occurrence.
pub fn deduplicate(trips: Vec<TripOption>) -> Vec<TripOption> {
    if trips.len() <= 1 {
        return trips;
    }

    let mut seen = std::collections::HashSet::new();
    trips
        .into_iter()
        .filter(|trip| seen.insert(trip.identity()))
        .collect()
}
