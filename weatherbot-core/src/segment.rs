//! Forecast segmentation: reduce a fixed-interval forecast series to three
//! representative day-parts (Morning 09:00, Afternoon 15:00, Evening 21:00)
//! for the next useful local day.

use chrono::{Duration, NaiveDate, Timelike};
use std::collections::BTreeMap;

use crate::model::{ForecastSample, ForecastSegment, SegmentLabel};

/// After this local hour, "tomorrow" is the more useful forecast day than
/// the remainder of today.
const DAY_CUTOVER_HOUR: u32 = 21;

/// Pick at most one sample per day-part from `samples`.
///
/// `now` is the current UTC instant; `utc_offset_seconds` shifts both the
/// clock and every sample into the location's local time. Labels with no
/// sample on the target date are omitted, never an error. The series is
/// assumed chronologically ordered; on a tie in hour distance the earliest
/// sample wins.
pub fn pick_day_segments(
    samples: &[ForecastSample],
    utc_offset_seconds: i32,
    now: chrono::DateTime<chrono::Utc>,
) -> BTreeMap<SegmentLabel, ForecastSegment> {
    let offset = Duration::seconds(i64::from(utc_offset_seconds));
    let now_local = now + offset;

    let mut target_date = now_local.date_naive();
    if now_local.hour() >= DAY_CUTOVER_HOUR {
        target_date = next_day(target_date);
    }

    let mut chosen = BTreeMap::new();

    for label in SegmentLabel::ALL {
        let target_hour = i64::from(label.target_hour());
        let mut best: Option<(&ForecastSample, chrono::DateTime<chrono::Utc>, i64)> = None;

        for sample in samples {
            let local = sample.timestamp + offset;
            if local.date_naive() != target_date {
                continue;
            }
            let diff = (i64::from(local.hour()) - target_hour).abs();
            // Strict `<` keeps the earliest sample on ties.
            if best.as_ref().is_none_or(|(_, _, best_diff)| diff < *best_diff) {
                best = Some((sample, local, diff));
            }
        }

        if let Some((sample, local, _)) = best {
            chosen.insert(
                label,
                ForecastSegment {
                    local_time: local.format("%Y-%m-%d %H:%M").to_string(),
                    temperature: sample.temperature,
                    description: sample.description.clone(),
                },
            );
        }
    }

    chosen
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(chrono::Days::new(1)).unwrap_or(date)
}
