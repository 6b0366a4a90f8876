//! SQLite-backed [`SnapshotStore`].

use crate::error::{Result, RollupError};
use crate::snapshot::{MetricSnapshot, MetricType, SnapshotMetrics, SnapshotStore};
use chrono::NaiveDate;
use log::debug;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SNAPSHOT_COLUMNS: &str = "period_start, metric_type, period_end, captured_at,
    total_revenue, total_expenses, net_operating_income, profit_margin,
    rental_income, other_income, occupancy_rate, rent_collection_rate,
    budget_utilization, pending_income, pending_expenses, building_count,
    total_units, occupied_units, active_projects, average_project_health";

impl ToSql for MetricType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MetricType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: RollupError| FromSqlError::Other(Box::new(e)))
    }
}

pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened snapshot database at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RollupError::Storage("snapshot connection lock poisoned".to_string()))
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let migrations = [(
        "001_create_metric_snapshots.sql",
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/migrations/001_create_metric_snapshots.sql"
        )),
    )];

    for (name, sql) in migrations {
        let applied: Option<String> = conn
            .query_row(
                "SELECT name FROM schema_migrations WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if applied.is_none() {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                params![name],
            )?;
            tx.commit()?;
            debug!("Applied migration {}", name);
        }
    }

    Ok(())
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<MetricSnapshot> {
    Ok(MetricSnapshot {
        period_start: row.get(0)?,
        metric_type: row.get(1)?,
        period_end: row.get(2)?,
        captured_at: row.get(3)?,
        metrics: SnapshotMetrics {
            total_revenue: row.get(4)?,
            total_expenses: row.get(5)?,
            net_operating_income: row.get(6)?,
            profit_margin: row.get(7)?,
            rental_income: row.get(8)?,
            other_income: row.get(9)?,
            occupancy_rate: row.get(10)?,
            rent_collection_rate: row.get(11)?,
            budget_utilization: row.get(12)?,
            pending_income: row.get(13)?,
            pending_expenses: row.get(14)?,
            building_count: row.get(15)?,
            total_units: row.get(16)?,
            occupied_units: row.get(17)?,
            active_projects: row.get(18)?,
            average_project_health: row.get(19)?,
        },
    })
}

impl SnapshotStore for SqliteSnapshotStore {
    fn find(
        &self,
        period_start: NaiveDate,
        metric_type: MetricType,
    ) -> Result<Option<MetricSnapshot>> {
        let conn = self.lock()?;
        let snapshot = conn
            .query_row(
                &format!(
                    "SELECT {} FROM metric_snapshots WHERE period_start = ?1 AND metric_type = ?2",
                    SNAPSHOT_COLUMNS
                ),
                params![period_start, metric_type],
                snapshot_from_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    /// One `INSERT .. ON CONFLICT DO UPDATE` statement; `captured_at` is
    /// only written on insert.
    fn upsert(&self, snapshot: MetricSnapshot) -> Result<MetricSnapshot> {
        let conn = self.lock()?;
        let m = &snapshot.metrics;
        let stored = conn.query_row(
            &format!(
                "INSERT INTO metric_snapshots ({columns})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                 ON CONFLICT (period_start, metric_type) DO UPDATE SET
                    period_end = excluded.period_end,
                    total_revenue = excluded.total_revenue,
                    total_expenses = excluded.total_expenses,
                    net_operating_income = excluded.net_operating_income,
                    profit_margin = excluded.profit_margin,
                    rental_income = excluded.rental_income,
                    other_income = excluded.other_income,
                    occupancy_rate = excluded.occupancy_rate,
                    rent_collection_rate = excluded.rent_collection_rate,
                    budget_utilization = excluded.budget_utilization,
                    pending_income = excluded.pending_income,
                    pending_expenses = excluded.pending_expenses,
                    building_count = excluded.building_count,
                    total_units = excluded.total_units,
                    occupied_units = excluded.occupied_units,
                    active_projects = excluded.active_projects,
                    average_project_health = excluded.average_project_health
                 RETURNING {columns}",
                columns = SNAPSHOT_COLUMNS
            ),
            params![
                snapshot.period_start,
                snapshot.metric_type,
                snapshot.period_end,
                snapshot.captured_at,
                m.total_revenue,
                m.total_expenses,
                m.net_operating_income,
                m.profit_margin,
                m.rental_income,
                m.other_income,
                m.occupancy_rate,
                m.rent_collection_rate,
                m.budget_utilization,
                m.pending_income,
                m.pending_expenses,
                m.building_count,
                m.total_units,
                m.occupied_units,
                m.active_projects,
                m.average_project_health
            ],
            snapshot_from_row,
        )?;
        Ok(stored)
    }

    fn list_between(
        &self,
        metric_type: MetricType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM metric_snapshots
             WHERE metric_type = ?1 AND period_start >= ?2 AND period_start <= ?3
             ORDER BY period_start ASC",
            SNAPSHOT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![metric_type, start, end], snapshot_from_row)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(23, 59, 0).unwrap()
    }

    fn snapshot(start: NaiveDate, captured_at: NaiveDateTime, revenue: f64) -> MetricSnapshot {
        let period = MetricType::Monthly.period_for(start).unwrap();
        MetricSnapshot {
            period_start: period.start,
            period_end: period.end,
            metric_type: MetricType::Monthly,
            captured_at,
            metrics: SnapshotMetrics {
                total_revenue: revenue,
                total_expenses: 400.0,
                net_operating_income: revenue - 400.0,
                building_count: 2,
                total_units: 30,
                occupied_units: 27,
                occupancy_rate: 90.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_upsert_keeps_first_capture_time() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();

        let first = store
            .upsert(snapshot(date(2024, 5, 1), at(2024, 5, 31), 1_000.0))
            .unwrap();
        assert_eq!(first.captured_at, at(2024, 5, 31));

        let second = store
            .upsert(snapshot(date(2024, 5, 1), at(2024, 6, 2), 1_200.0))
            .unwrap();
        assert_eq!(second.captured_at, at(2024, 5, 31));
        assert_eq!(second.metrics.total_revenue, 1_200.0);

        let found = store
            .find_by_period(date(2024, 5, 17), MetricType::Monthly)
            .unwrap()
            .unwrap();
        assert_eq!(found, second);
        assert!(store
            .find_by_period(date(2024, 5, 17), MetricType::Daily)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_concurrent_upserts_keep_one_row() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();

        std::thread::scope(|scope| {
            for day in 1..=8 {
                let store = &store;
                scope.spawn(move || {
                    store
                        .upsert(snapshot(date(2024, 5, day), at(2024, 5, day), 1_000.0))
                        .unwrap();
                });
            }
        });

        let rows = store
            .list_between(MetricType::Monthly, date(2024, 1, 1), date(2024, 12, 31))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period_start, date(2024, 5, 1));
        assert!(rows[0].captured_at <= at(2024, 5, 8));
    }

    #[test]
    fn test_list_between_is_ordered() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        for month in [3, 1, 2] {
            store
                .upsert(snapshot(date(2024, month, 1), at(2024, month, 28), month as f64))
                .unwrap();
        }

        let listed = store
            .list_between(MetricType::Monthly, date(2024, 1, 1), date(2024, 2, 29))
            .unwrap();
        let starts: Vec<_> = listed.iter().map(|s| s.period_start).collect();
        assert_eq!(starts, vec![date(2024, 1, 1), date(2024, 2, 1)]);
    }

    #[test]
    fn test_reopen_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.db");

        {
            let store = SqliteSnapshotStore::open(&path).unwrap();
            store
                .upsert(snapshot(date(2024, 7, 1), at(2024, 7, 31), 9_000.0))
                .unwrap();
        }

        let reopened = SqliteSnapshotStore::open(&path).unwrap();
        let found = reopened
            .find(date(2024, 7, 1), MetricType::Monthly)
            .unwrap()
            .unwrap();
        assert_eq!(found.metrics.total_revenue, 9_000.0);
        assert_eq!(found.metrics.occupied_units, 27);
    }
}
