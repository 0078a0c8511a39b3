use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::demo;
use crate::metrics::{self, MetricsConfig, WindowedRecords, Windows};
use crate::models::{IncidentStatus, IncidentStatusCounts, MetricsSnapshot};
use crate::store::MetricsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Live,
    Demo,
}

pub async fn load_incident_counts<S: MetricsStore>(
    store: &S,
    company_id: &str,
) -> anyhow::Result<IncidentStatusCounts> {
    let (open, in_progress, resolved) = tokio::try_join!(
        store.count_incidents(company_id, IncidentStatus::Open),
        store.count_incidents(company_id, IncidentStatus::InProgress),
        store.count_incidents(company_id, IncidentStatus::Resolved),
    )?;

    Ok(IncidentStatusCounts {
        open,
        in_progress,
        resolved,
    })
}

/// Fetches the three windows and the incident counts concurrently, then aggregates.
pub async fn load_snapshot<S: MetricsStore>(
    store: &S,
    company_id: &str,
    anchor: DateTime<Utc>,
    config: &MetricsConfig,
) -> anyhow::Result<MetricsSnapshot> {
    let windows = Windows::anchored_at(anchor, config.offset);

    let (today, week, month, incidents) = tokio::try_join!(
        store.fetch_movements(company_id, windows.today),
        store.fetch_movements(company_id, windows.week),
        store.fetch_movements(company_id, windows.month),
        load_incident_counts(store, company_id),
    )
    .with_context(|| format!("failed to load dashboard data for company {company_id}"))?;

    info!(
        company_id,
        today = today.len(),
        week = week.len(),
        month = month.len(),
        "loaded movement windows"
    );

    let fetched = WindowedRecords {
        today: &today,
        week: &week,
        month: &month,
    };
    Ok(metrics::compute_from_windows(anchor, fetched, incidents, config))
}

/// Live snapshot, or the demo snapshot when anything upstream fails.
pub async fn snapshot_or_demo<S: MetricsStore>(
    store: &S,
    company_id: &str,
    anchor: DateTime<Utc>,
    config: &MetricsConfig,
) -> (MetricsSnapshot, SnapshotSource) {
    match store.snapshot(company_id, anchor, config).await {
        Ok(snapshot) => (snapshot, SnapshotSource::Live),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "falling back to demo dashboard");
            (demo::demo_snapshot(anchor, config.offset), SnapshotSource::Demo)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Window;
    use crate::models::{MovementRecord, MovementType};

    struct FakeStore {
        records: Vec<MovementRecord>,
        incidents: Vec<IncidentStatus>,
        fail: bool,
    }

    impl MetricsStore for FakeStore {
        async fn fetch_movements(
            &self,
            _company_id: &str,
            window: Window,
        ) -> anyhow::Result<Vec<MovementRecord>> {
            if self.fail {
                anyhow::bail!("store unavailable");
            }
            Ok(window.select(&self.records).into_iter().cloned().collect())
        }

        async fn count_incidents(
            &self,
            _company_id: &str,
            status: IncidentStatus,
        ) -> anyhow::Result<u64> {
            Ok(self.incidents.iter().filter(|s| **s == status).count() as u64)
        }
    }

    fn movement(id: &str, movement_type: MovementType, when: &str) -> MovementRecord {
        MovementRecord {
            id: id.to_string(),
            driver_name: "Jane".to_string(),
            movement_type,
            block: "A".to_string(),
            unit: "12".to_string(),
            license_plate: Some("XYZ-987".to_string()),
            occurred_at: None,
            recorded_at: Some(when.parse().unwrap()),
        }
    }

    fn anchor() -> DateTime<Utc> {
        "2026-03-24T20:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn live_snapshot_matches_pure_computation() {
        let store = FakeStore {
            records: vec![
                movement("1", MovementType::Entry, "2026-03-24T08:00:00Z"),
                movement("2", MovementType::Exit, "2026-03-24T17:00:00Z"),
                movement("3", MovementType::Entry, "2026-03-10T09:00:00Z"),
            ],
            incidents: vec![
                IncidentStatus::Open,
                IncidentStatus::Open,
                IncidentStatus::Resolved,
            ],
            fail: false,
        };
        let config = MetricsConfig::default();

        let (snapshot, source) = snapshot_or_demo(&store, "condo-1", anchor(), &config).await;

        assert_eq!(source, SnapshotSource::Live);
        assert_eq!(
            snapshot.incident_stats,
            IncidentStatusCounts {
                open: 2,
                in_progress: 0,
                resolved: 1
            }
        );
        let expected = metrics::compute_metrics(
            anchor(),
            &store.records,
            snapshot.incident_stats,
            &config,
        );
        assert_eq!(snapshot, expected);
        assert_eq!(snapshot.total_visitors_month, 3);
        assert_eq!(snapshot.total_visitors_week, 2);
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_demo() {
        let store = FakeStore {
            records: Vec::new(),
            incidents: Vec::new(),
            fail: true,
        };
        let config = MetricsConfig::default();

        let err = load_snapshot(&store, "condo-1", anchor(), &config)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("store unavailable"));

        let (snapshot, source) = snapshot_or_demo(&store, "condo-1", anchor(), &config).await;
        assert_eq!(source, SnapshotSource::Demo);
        assert_eq!(snapshot, demo::demo_snapshot(anchor(), config.offset));
    }
}
