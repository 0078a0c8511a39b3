use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::dashboard;
use crate::metrics::{self, MetricsConfig, Window};
use crate::models::{IncidentStatus, MetricsSnapshot, MovementRecord, MovementType};
use crate::store::MetricsStore;

#[derive(Debug, Deserialize)]
pub struct MovementRow {
    #[serde(default)]
    pub id: Option<String>,
    pub company_id: String,
    pub driver_name: String,
    pub movement_type: String,
    pub block: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncidentRow {
    company_id: String,
    status: String,
}

/// Parses an RFC 3339 timestamp. Blank or unparseable values become `None`.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(err) => {
            warn!(value, error = %err, "ignoring unparseable timestamp");
            None
        }
    }
}

impl MovementRow {
    pub fn into_record(self, line: usize) -> anyhow::Result<(String, MovementRecord)> {
        let movement_type: MovementType = self.movement_type.parse()?;
        let record = MovementRecord {
            id: self.id.unwrap_or_else(|| format!("csv-{line}")),
            driver_name: self.driver_name,
            movement_type,
            block: self.block,
            unit: self.unit,
            license_plate: self.license_plate.filter(|plate| !plate.trim().is_empty()),
            occurred_at: parse_timestamp(self.occurred_at.as_deref()),
            recorded_at: parse_timestamp(self.recorded_at.as_deref()),
        };
        Ok((self.company_id, record))
    }
}

/// In-memory store backed by CSV exports.
#[derive(Debug, Default)]
pub struct CsvStore {
    movements: Vec<(String, MovementRecord)>,
    incidents: Vec<(String, IncidentStatus)>,
}

impl CsvStore {
    pub fn open(movements: &Path, incidents: Option<&Path>) -> anyhow::Result<Self> {
        let movement_file = std::fs::File::open(movements)
            .with_context(|| format!("failed to open {}", movements.display()))?;
        let mut store = Self::default();
        store.movements = read_movements(movement_file)?;

        if let Some(path) = incidents {
            let incident_file = std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            store.incidents = read_incidents(incident_file)?;
        }

        Ok(store)
    }

    /// Every record of one company, newest first. Records without a timestamp sort last.
    pub fn load_all(&self, company_id: &str) -> Vec<MovementRecord> {
        self.records_matching(company_id, |_| true)
    }

    fn records_matching(
        &self,
        company_id: &str,
        keep: impl Fn(&MovementRecord) -> bool,
    ) -> Vec<MovementRecord> {
        let mut records: Vec<MovementRecord> = self
            .movements
            .iter()
            .filter(|(company, record)| company == company_id && keep(record))
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| b.canonical_time().cmp(&a.canonical_time()));
        records
    }
}

pub fn read_movements<R: Read>(reader: R) -> anyhow::Result<Vec<(String, MovementRecord)>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in csv_reader.deserialize::<MovementRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid movement row at line {line}"))?;
        match row.into_record(line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(line, error = %err, "skipping movement row"),
        }
    }

    Ok(records)
}

fn read_incidents<R: Read>(reader: R) -> anyhow::Result<Vec<(String, IncidentStatus)>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut incidents = Vec::new();

    for (index, result) in csv_reader.deserialize::<IncidentRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid incident row at line {line}"))?;
        match row.status.parse::<IncidentStatus>() {
            Ok(status) => incidents.push((row.company_id, status)),
            Err(err) => warn!(line, error = %err, "skipping incident row"),
        }
    }

    Ok(incidents)
}

impl MetricsStore for CsvStore {
    async fn fetch_movements(
        &self,
        company_id: &str,
        window: Window,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        Ok(self.records_matching(company_id, |record| {
            record.canonical_time().is_some_and(|at| window.contains(at))
        }))
    }

    async fn count_incidents(
        &self,
        company_id: &str,
        status: IncidentStatus,
    ) -> anyhow::Result<u64> {
        Ok(self
            .incidents
            .iter()
            .filter(|(company, incident)| company == company_id && *incident == status)
            .count() as u64)
    }

    /// All records are in memory, so the windows are cut from one consistent set.
    async fn snapshot(
        &self,
        company_id: &str,
        anchor: DateTime<Utc>,
        config: &MetricsConfig,
    ) -> anyhow::Result<MetricsSnapshot> {
        let records = self.load_all(company_id);
        let incidents = dashboard::load_incident_counts(self, company_id).await?;
        Ok(metrics::compute_metrics(anchor, &records, incidents, config))
    }
}
