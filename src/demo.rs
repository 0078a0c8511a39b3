use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::metrics::DEFAULT_STAY_MINUTES;
use crate::models::{
    BlockVisits, DayTrend, HourCount, IncidentStatusCounts, MetricsSnapshot, VisitorCount,
};

const HOURLY_ENTRIES: [usize; 24] = [
    2, 1, 0, 0, 0, 0, 3, 5, 12, 8, 7, 6, 9, 11, 8, 7, 10, 15, 14, 12, 9, 6, 4, 3,
];
const DAILY_TREND: [(usize, usize); 7] = [
    (32, 30),
    (35, 33),
    (38, 36),
    (42, 40),
    (28, 27),
    (30, 28),
    (45, 40),
];

/// Placeholder dashboard shown when live data cannot be loaded.
/// Trend dates end on the anchor's local day so charts stay aligned.
pub fn demo_snapshot(anchor: DateTime<Utc>, offset: FixedOffset) -> MetricsSnapshot {
    let today = anchor.with_timezone(&offset).date_naive();
    let oldest = today - Duration::days(DAILY_TREND.len() as i64 - 1);

    let visitors = [
        ("Juan Pérez", 15),
        ("María Gómez", 12),
        ("Carlos López", 10),
        ("Ana Martínez", 8),
        ("David Rodríguez", 7),
    ];
    let blocks = [("A", 145), ("B", 98), ("C", 210), ("D", 120), ("E", 69)];

    MetricsSnapshot {
        total_entries: 250,
        total_exits: 220,
        total_visitors_today: 35,
        total_visitors_week: 178,
        total_visitors_month: 642,
        average_stay_minutes: DEFAULT_STAY_MINUTES,
        visits_by_block: BlockVisits::from_ordered(
            blocks
                .iter()
                .map(|(block, count)| (block.to_string(), *count))
                .collect(),
        ),
        incident_stats: IncidentStatusCounts {
            open: 5,
            in_progress: 3,
            resolved: 12,
        },
        top_visitors: visitors
            .iter()
            .map(|(name, count)| VisitorCount {
                name: name.to_string(),
                count: *count,
            })
            .collect(),
        entries_by_hour: HOURLY_ENTRIES
            .iter()
            .enumerate()
            .map(|(hour, count)| HourCount {
                hour: hour as u32,
                count: *count,
            })
            .collect(),
        entry_exit_trend: DAILY_TREND
            .iter()
            .enumerate()
            .map(|(day, (entries, exits))| DayTrend {
                date: oldest + Duration::days(day as i64),
                entries: *entries,
                exits: *exits,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::utc_offset;

    #[test]
    fn demo_snapshot_has_chart_shapes() {
        let anchor = "2026-03-24T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let snapshot = demo_snapshot(anchor, utc_offset());

        assert_eq!(snapshot.entries_by_hour.len(), 24);
        assert_eq!(snapshot.entries_by_hour[17].count, 15);
        assert_eq!(snapshot.entry_exit_trend.len(), 7);
        assert_eq!(
            snapshot.entry_exit_trend.last().unwrap().date.to_string(),
            "2026-03-24"
        );
        assert!(snapshot.top_visitors.len() <= 5);
        assert!(snapshot
            .top_visitors
            .windows(2)
            .all(|pair| pair[0].count >= pair[1].count));
        assert_eq!(snapshot.visits_by_block.total(), 642);
    }
}
