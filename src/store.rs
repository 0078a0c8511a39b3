use chrono::{DateTime, Utc};

use crate::dashboard;
use crate::metrics::{MetricsConfig, Window};
use crate::models::{IncidentStatus, MetricsSnapshot, MovementRecord};

/// Read side of the condominium data store used by the dashboard.
///
/// Fetched movements are expected newest first, ordered by canonical time.
pub trait MetricsStore {
    async fn fetch_movements(
        &self,
        company_id: &str,
        window: Window,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    async fn count_incidents(&self, company_id: &str, status: IncidentStatus)
        -> anyhow::Result<u64>;

    /// Dashboard snapshot for one company. Defaults to one fetch per window.
    async fn snapshot(
        &self,
        company_id: &str,
        anchor: DateTime<Utc>,
        config: &MetricsConfig,
    ) -> anyhow::Result<MetricsSnapshot>
    where
        Self: Sized,
    {
        dashboard::load_snapshot(self, company_id, anchor, config).await
    }
}
