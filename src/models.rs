use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementType {
    Entry,
    Exit,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "entry",
            MovementType::Exit => "exit",
        }
    }
}

impl FromStr for MovementType {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(MovementType::Entry),
            "exit" => Ok(MovementType::Exit),
            _ => Err(RecordError::UnknownMovementType(value.to_string())),
        }
    }
}

/// One vehicle entry or exit event at a condominium gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRecord {
    pub id: String,
    pub driver_name: String,
    pub movement_type: MovementType,
    pub block: String,
    pub unit: String,
    pub license_plate: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl MovementRecord {
    /// Time used for every window and bucket: ingestion time, falling back to event time.
    /// `None` marks the record as malformed.
    pub fn canonical_time(&self) -> Option<DateTime<Utc>> {
        self.recorded_at.or(self.occurred_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncidentStatus {
    Open,
    InProgress,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::InProgress => "inProgress",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "open" => Ok(IncidentStatus::Open),
            "inProgress" => Ok(IncidentStatus::InProgress),
            "resolved" => Ok(IncidentStatus::Resolved),
            other => Err(RecordError::UnknownIncidentStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentStatusCounts {
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
}

impl IncidentStatusCounts {
    pub fn total(&self) -> u64 {
        self.open + self.in_progress + self.resolved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitorCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayTrend {
    pub date: NaiveDate,
    pub entries: usize,
    pub exits: usize,
}

/// Visit counts per block, kept in first-seen order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockVisits(Vec<(String, usize)>);

impl BlockVisits {
    pub fn from_ordered(counts: Vec<(String, usize)>) -> Self {
        Self(counts)
    }

    #[cfg(test)]
    pub fn get(&self, block: &str) -> Option<usize> {
        self.0
            .iter()
            .find(|(name, _)| name == block)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, count)| count).sum()
    }
}

impl Serialize for BlockVisits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (block, count) in &self.0 {
            map.serialize_entry(block, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_entries: usize,
    pub total_exits: usize,
    pub total_visitors_today: usize,
    pub total_visitors_week: usize,
    pub total_visitors_month: usize,
    pub average_stay_minutes: i64,
    pub visits_by_block: BlockVisits,
    pub incident_stats: IncidentStatusCounts,
    pub top_visitors: Vec<VisitorCount>,
    pub entries_by_hour: Vec<HourCount>,
    pub entry_exit_trend: Vec<DayTrend>,
}
