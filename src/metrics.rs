use std::collections::HashMap;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc,
};
use tracing::{debug, trace};

use crate::models::{
    BlockVisits, DayTrend, HourCount, IncidentStatusCounts, MetricsSnapshot, MovementRecord,
    MovementType, VisitorCount,
};

pub const DEFAULT_STAY_MINUTES: i64 = 45;
pub const TOP_VISITOR_LIMIT: usize = 5;
pub const TREND_DAYS: i64 = 7;
pub const WEEK_DAYS: i64 = 7;
pub const MONTH_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Offset used for "today", hour-of-day buckets and trend dates.
    pub offset: FixedOffset,
    pub placeholder_stay_minutes: i64,
    /// When set, entries and exits of the same visit are paired to derive the average stay.
    pub stay_pairing_window: Option<Duration>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            offset: utc_offset(),
            placeholder_stay_minutes: DEFAULT_STAY_MINUTES,
            stay_pairing_window: None,
        }
    }
}

pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// The `days` days up to `end`, or `None` when the range leaves chrono's supported span.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Option<Self> {
        let start = end.checked_sub_signed(Duration::try_days(days)?)?;
        Some(Self { start, end })
    }

    /// Records whose canonical time falls in the window. Malformed records never match.
    pub fn select<'a>(&self, records: &'a [MovementRecord]) -> Vec<&'a MovementRecord> {
        records
            .iter()
            .filter(|record| record.canonical_time().is_some_and(|at| self.contains(at)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub today: Window,
    pub week: Window,
    pub month: Window,
}

impl Windows {
    pub fn anchored_at(anchor: DateTime<Utc>, offset: FixedOffset) -> Self {
        let start_of_today = local_midnight(anchor.with_timezone(&offset).date_naive(), offset);
        Self {
            today: Window {
                start: start_of_today,
                end: start_of_today + Duration::days(1) - Duration::seconds(1),
            },
            week: Window {
                start: anchor - Duration::days(WEEK_DAYS),
                end: anchor,
            },
            month: Window {
                start: anchor - Duration::days(MONTH_DAYS),
                end: anchor,
            },
        }
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset.local_minus_utc()))))
}

/// Record sets as fetched per window. They may disagree with each other (read skew);
/// each set is still clipped to its own window before aggregation.
#[derive(Debug, Clone, Copy)]
pub struct WindowedRecords<'a> {
    pub today: &'a [MovementRecord],
    pub week: &'a [MovementRecord],
    pub month: &'a [MovementRecord],
}

impl<'a> WindowedRecords<'a> {
    pub fn shared(records: &'a [MovementRecord]) -> Self {
        Self {
            today: records,
            week: records,
            month: records,
        }
    }
}

pub fn compute_metrics(
    anchor: DateTime<Utc>,
    records: &[MovementRecord],
    incidents: IncidentStatusCounts,
    config: &MetricsConfig,
) -> MetricsSnapshot {
    compute_from_windows(anchor, WindowedRecords::shared(records), incidents, config)
}

pub fn compute_from_windows(
    anchor: DateTime<Utc>,
    fetched: WindowedRecords<'_>,
    incidents: IncidentStatusCounts,
    config: &MetricsConfig,
) -> MetricsSnapshot {
    let windows = Windows::anchored_at(anchor, config.offset);
    let today = windows.today.select(fetched.today);
    let week = windows.week.select(fetched.week);
    let month = windows.month.select(fetched.month);

    let malformed = fetched
        .month
        .iter()
        .filter(|record| record.canonical_time().is_none())
        .count();
    if malformed > 0 {
        debug!(malformed, "skipped movement records without a usable timestamp");
    }

    MetricsSnapshot {
        total_entries: count_type(&month, MovementType::Entry),
        total_exits: count_type(&month, MovementType::Exit),
        total_visitors_today: today.len(),
        total_visitors_week: week.len(),
        total_visitors_month: month.len(),
        average_stay_minutes: average_stay_minutes(&month, config),
        visits_by_block: BlockVisits::from_ordered(tally(month.iter().map(|r| r.block.as_str()))),
        incident_stats: incidents,
        top_visitors: top_visitors(&month, TOP_VISITOR_LIMIT),
        entries_by_hour: entries_by_hour(&today, config.offset),
        entry_exit_trend: entry_exit_trend(anchor, &week, config.offset),
    }
}

fn count_type(records: &[&MovementRecord], movement_type: MovementType) -> usize {
    records
        .iter()
        .filter(|record| record.movement_type == movement_type)
        .count()
}

/// Counts per key in first-seen order.
fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for key in keys {
        match index.get(key) {
            Some(&position) => counts[position].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key.to_string(), 1));
            }
        }
    }

    counts
}

pub fn top_visitors(records: &[&MovementRecord], limit: usize) -> Vec<VisitorCount> {
    let mut visitors: Vec<VisitorCount> = tally(records.iter().map(|r| r.driver_name.as_str()))
        .into_iter()
        .map(|(name, count)| VisitorCount { name, count })
        .collect();

    // stable: ties keep first-seen order
    visitors.sort_by(|a, b| b.count.cmp(&a.count));
    visitors.truncate(limit);
    visitors
}

pub fn entries_by_hour(records: &[&MovementRecord], offset: FixedOffset) -> Vec<HourCount> {
    let mut hours: Vec<HourCount> = (0..24).map(|hour| HourCount { hour, count: 0 }).collect();

    for record in records {
        if record.movement_type != MovementType::Entry {
            continue;
        }
        if let Some(at) = record.canonical_time() {
            let hour = at.with_timezone(&offset).hour() as usize;
            hours[hour].count += 1;
        }
    }

    hours
}

pub fn entry_exit_trend(
    anchor: DateTime<Utc>,
    records: &[&MovementRecord],
    offset: FixedOffset,
) -> Vec<DayTrend> {
    let today = anchor.with_timezone(&offset).date_naive();
    let oldest = today - Duration::days(TREND_DAYS - 1);
    let mut trend: Vec<DayTrend> = (0..TREND_DAYS)
        .map(|day| DayTrend {
            date: oldest + Duration::days(day),
            entries: 0,
            exits: 0,
        })
        .collect();

    for record in records {
        let Some(at) = record.canonical_time() else {
            continue;
        };
        let date = at.with_timezone(&offset).date_naive();
        let slot = usize::try_from((date - oldest).num_days())
            .ok()
            .and_then(|index| trend.get_mut(index));

        match slot {
            Some(day) => match record.movement_type {
                MovementType::Entry => day.entries += 1,
                MovementType::Exit => day.exits += 1,
            },
            None => trace!(id = %record.id, %date, "movement dated outside the trend range"),
        }
    }

    trend
}

fn visit_key(record: &MovementRecord) -> String {
    match record.license_plate.as_deref().map(str::trim) {
        Some(plate) if !plate.is_empty() => plate.to_ascii_uppercase(),
        _ => record.driver_name.trim().to_string(),
    }
}

/// Mean paired stay in minutes, or the configured placeholder when pairing is off
/// or nothing pairs up.
pub fn average_stay_minutes(records: &[&MovementRecord], config: &MetricsConfig) -> i64 {
    let Some(max_stay) = config.stay_pairing_window else {
        return config.placeholder_stay_minutes;
    };

    let mut timeline: Vec<(DateTime<Utc>, &MovementRecord)> = records
        .iter()
        .filter_map(|record| record.canonical_time().map(|at| (at, *record)))
        .collect();
    // entries before exits at the same instant
    timeline.sort_by_key(|(at, record)| (*at, record.movement_type != MovementType::Entry));

    let mut open: HashMap<(String, &str), Vec<DateTime<Utc>>> = HashMap::new();
    let mut total_seconds = 0i64;
    let mut pairs = 0i64;

    for (at, record) in timeline {
        let key = (visit_key(record), record.block.as_str());
        match record.movement_type {
            MovementType::Entry => open.entry(key).or_default().push(at),
            MovementType::Exit => {
                let Some(entries) = open.get_mut(&key) else {
                    continue;
                };
                // most recent entry first; anything older is further away
                match entries.pop() {
                    Some(entered) if at - entered <= max_stay => {
                        total_seconds += (at - entered).num_seconds();
                        pairs += 1;
                    }
                    Some(_) => entries.clear(),
                    None => {}
                }
            }
        }
    }

    if pairs == 0 {
        debug!("no entry/exit pairs found, using placeholder stay");
        return config.placeholder_stay_minutes;
    }

    (total_seconds as f64 / pairs as f64 / 60.0).round() as i64
}
