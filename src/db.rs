use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::csv_source::MovementRow;
use crate::metrics::Window;
use crate::models::{IncidentStatus, MovementRecord, MovementType};
use crate::store::MetricsStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let companies = vec![
        ("condo-las-palmas", "Condominio Las Palmas"),
        ("condo-el-roble", "Residencial El Roble"),
    ];

    for (id, name) in companies {
        sqlx::query(
            r#"
            INSERT INTO condo_dashboard.companies (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let now = Utc::now();
    let movements = vec![
        ("seed-001", "Juan Pérez", MovementType::Entry, "A", "101", "PQR-123", 2),
        ("seed-002", "Juan Pérez", MovementType::Exit, "A", "101", "PQR-123", 1),
        ("seed-003", "María Gómez", MovementType::Entry, "C", "305", "JKL-456", 26),
        ("seed-004", "María Gómez", MovementType::Exit, "C", "305", "JKL-456", 25),
        ("seed-005", "Carlos López", MovementType::Entry, "B", "210", "MNO-789", 72),
        ("seed-006", "Ana Martínez", MovementType::Entry, "C", "312", "", 240),
    ];

    for (source_key, driver, movement_type, block, unit, plate, hours_ago) in movements {
        let recorded_at = now - Duration::hours(hours_ago);
        sqlx::query(
            r#"
            INSERT INTO condo_dashboard.movements
            (id, company_id, driver_name, movement_type, block, unit, license_plate,
             occurred_at, recorded_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind("condo-las-palmas")
        .bind(driver)
        .bind(movement_type.as_str())
        .bind(block)
        .bind(unit)
        .bind(Some(plate).filter(|p| !p.is_empty()))
        .bind(recorded_at)
        .bind(recorded_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let incidents = vec![
        ("seed-inc-001", "Broken gate barrier", IncidentStatus::Open),
        ("seed-inc-002", "Noise complaint block C", IncidentStatus::InProgress),
        ("seed-inc-003", "Unregistered vehicle", IncidentStatus::Resolved),
    ];

    for (source_key, title, status) in incidents {
        sqlx::query(
            r#"
            INSERT INTO condo_dashboard.incidents (id, company_id, title, status, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind("condo-las-palmas")
        .bind(title)
        .bind(status.as_str())
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Imports movement rows. Rows already seen (same `id` as source key) are skipped.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<MovementRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid movement row at line {line}"))?;
        let source_key = row
            .id
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let (company_id, record) = match row.into_record(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(line, error = %err, "skipping movement row");
                continue;
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO condo_dashboard.movements
            (id, company_id, driver_name, movement_type, block, unit, license_plate,
             occurred_at, recorded_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&company_id)
        .bind(&record.driver_name)
        .bind(record.movement_type.as_str())
        .bind(&record.block)
        .bind(&record.unit)
        .bind(&record.license_plate)
        .bind(record.occurred_at)
        .bind(record.recorded_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "movement import finished");
    Ok(inserted)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl MetricsStore for PgStore {
    async fn fetch_movements(
        &self,
        company_id: &str,
        window: Window,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let rows = sqlx::query(
            "SELECT id, driver_name, movement_type, block, unit, license_plate, \
             occurred_at, recorded_at \
             FROM condo_dashboard.movements \
             WHERE company_id = $1 \
             AND COALESCE(recorded_at, occurred_at) BETWEEN $2 AND $3 \
             ORDER BY COALESCE(recorded_at, occurred_at) DESC",
        )
        .bind(company_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch movements")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            let raw_type: String = row.get("movement_type");
            let movement_type = match raw_type.parse::<MovementType>() {
                Ok(movement_type) => movement_type,
                Err(err) => {
                    warn!(%id, error = %err, "skipping movement with unknown type");
                    continue;
                }
            };
            records.push(MovementRecord {
                id: id.to_string(),
                driver_name: row.get("driver_name"),
                movement_type,
                block: row.get("block"),
                unit: row.get("unit"),
                license_plate: row.get("license_plate"),
                occurred_at: row.get::<Option<DateTime<Utc>>, _>("occurred_at"),
                recorded_at: row.get::<Option<DateTime<Utc>>, _>("recorded_at"),
            });
        }

        Ok(records)
    }

    async fn count_incidents(
        &self,
        company_id: &str,
        status: IncidentStatus,
    ) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM condo_dashboard.incidents \
             WHERE company_id = $1 AND status = $2",
        )
        .bind(company_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to count {} incidents", status.as_str()))?
        .get("total");

        Ok(u64::try_from(count).unwrap_or_default())
    }
}
