use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::dashboard::SnapshotSource;
use crate::models::{MetricsSnapshot, MovementRecord};

pub fn build_report(
    company_id: &str,
    anchor: DateTime<Utc>,
    offset: FixedOffset,
    snapshot: &MetricsSnapshot,
    source: SnapshotSource,
) -> String {
    let mut output = String::new();
    let generated = anchor.with_timezone(&offset);

    let _ = writeln!(output, "# Condominium Dashboard Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        company_id,
        generated.format("%Y-%m-%d %H:%M %:z")
    );
    if source == SnapshotSource::Demo {
        let _ = writeln!(output);
        let _ = writeln!(output, "> Live data was unavailable; figures below are demo values.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "| Metric | Value |");
    let _ = writeln!(output, "| --- | --- |");
    let summary = [
        ("Total entries", snapshot.total_entries.to_string()),
        ("Total exits", snapshot.total_exits.to_string()),
        ("Visitors today", snapshot.total_visitors_today.to_string()),
        ("Visitors this week", snapshot.total_visitors_week.to_string()),
        ("Visitors this month", snapshot.total_visitors_month.to_string()),
        ("Average stay (min)", snapshot.average_stay_minutes.to_string()),
    ];
    for (label, value) in summary {
        let _ = writeln!(output, "| {label} | {value} |");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Visits by Block");
    if snapshot.visits_by_block.is_empty() {
        let _ = writeln!(output, "No visits recorded for this window.");
    } else {
        for (block, count) in snapshot.visits_by_block.iter() {
            let _ = writeln!(output, "- Block {block}: {count}");
        }
        let _ = writeln!(output, "- Total: {}", snapshot.visits_by_block.total());
    }

    let incidents = &snapshot.incident_stats;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Incidents");
    let _ = writeln!(output, "- Open: {}", incidents.open);
    let _ = writeln!(output, "- In progress: {}", incidents.in_progress);
    let _ = writeln!(output, "- Resolved: {}", incidents.resolved);
    let _ = writeln!(output, "- Total: {}", incidents.total());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Visitors");
    if snapshot.top_visitors.is_empty() {
        let _ = writeln!(output, "No visitors recorded for this window.");
    } else {
        for visitor in &snapshot.top_visitors {
            let _ = writeln!(output, "- {}: {} visits", visitor.name, visitor.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Entries by Hour (today)");
    let busy: Vec<_> = snapshot
        .entries_by_hour
        .iter()
        .filter(|bucket| bucket.count > 0)
        .collect();
    if busy.is_empty() {
        let _ = writeln!(output, "No entries recorded today.");
    } else {
        for bucket in busy {
            let _ = writeln!(output, "- {:02}:00 {}", bucket.hour, bucket.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Entry/Exit Trend");
    let _ = writeln!(output, "| Date | Entries | Exits |");
    let _ = writeln!(output, "| --- | --- | --- |");
    for day in &snapshot.entry_exit_trend {
        let _ = writeln!(output, "| {} | {} | {} |", day.date, day.entries, day.exits);
    }

    output
}

#[derive(Debug, Serialize)]
struct MovementExportRow<'a> {
    #[serde(rename = "Driver Name")]
    driver_name: &'a str,
    #[serde(rename = "License Plate")]
    license_plate: &'a str,
    #[serde(rename = "House")]
    house: String,
    #[serde(rename = "Type")]
    movement_type: &'static str,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time")]
    time: String,
}

/// Writes movement records as CSV with local dates. Records without a timestamp keep blank date cells.
pub fn write_movements_csv<W: std::io::Write>(
    writer: W,
    records: &[MovementRecord],
    offset: FixedOffset,
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for record in records {
        let local = record.canonical_time().map(|at| at.with_timezone(&offset));
        csv_writer.serialize(MovementExportRow {
            driver_name: &record.driver_name,
            license_plate: record.license_plate.as_deref().unwrap_or_default(),
            house: format!("{}-{}", record.block, record.unit),
            movement_type: record.movement_type.as_str(),
            date: local
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            time: local
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_default(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
