//! Point-in-time captures of the portfolio rollup, one per
//! (period start, metric type), for trend reporting.

use crate::engine::{PortfolioMetrics, ProjectMetrics, RollupEngine};
use crate::error::{Result, RollupError};
use crate::source::FinancialDataSource;
use crate::utils::{average, variance_percentage, DateRange};
use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Daily,
    Monthly,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Monthly => "MONTHLY",
        }
    }

    /// DAILY is the calendar day itself, MONTHLY the calendar month containing it.
    pub fn period_for(self, date: NaiveDate) -> Result<DateRange> {
        match self {
            Self::Daily => Ok(DateRange::day(date)),
            Self::Monthly => DateRange::month_of(date),
        }
    }

    pub fn previous_period(self, date: NaiveDate) -> Result<DateRange> {
        let current = self.period_for(date)?;
        let before = current
            .start
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| RollupError::DateError(format!("No period before {}", current.start)))?;
        self.period_for(before)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = RollupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "MONTHLY" => Ok(Self::Monthly),
            _ => Err(RollupError::UnknownMetricType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_operating_income: f64,
    pub profit_margin: f64,
    pub rental_income: f64,
    pub other_income: f64,
    pub occupancy_rate: f64,
    pub rent_collection_rate: f64,
    pub budget_utilization: f64,
    pub pending_income: f64,
    pub pending_expenses: f64,
    pub building_count: u32,
    pub total_units: u32,
    pub occupied_units: u32,
    pub active_projects: u32,
    pub average_project_health: f64,
}

impl SnapshotMetrics {
    pub fn from_rollup(portfolio: &PortfolioMetrics, active_projects: &[ProjectMetrics]) -> Self {
        let health: Vec<f64> = active_projects.iter().map(|p| p.health.score).collect();
        Self {
            total_revenue: portfolio.summary.total_revenue,
            total_expenses: portfolio.summary.total_expenses,
            net_operating_income: portfolio.summary.net_operating_income,
            profit_margin: portfolio.summary.profit_margin,
            rental_income: portfolio.income.rental_income,
            other_income: portfolio.income.other_income,
            occupancy_rate: portfolio.occupancy_rate,
            rent_collection_rate: portfolio.rent_collection_rate,
            budget_utilization: portfolio.budget_utilization,
            pending_income: portfolio.pending.pending_income,
            pending_expenses: portfolio.pending.pending_expenses,
            building_count: portfolio.building_count as u32,
            total_units: portfolio.total_units,
            occupied_units: portfolio.occupied_units,
            active_projects: active_projects.len() as u32,
            average_project_health: average(&health),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub metric_type: MetricType,
    /// Time of the first capture; re-captures keep it.
    pub captured_at: NaiveDateTime,
    pub metrics: SnapshotMetrics,
}

impl MetricSnapshot {
    pub fn key(&self) -> (NaiveDate, MetricType) {
        (self.period_start, self.metric_type)
    }
}

/// Persistence for snapshots. `upsert` must be a single atomic
/// update-or-insert keyed by (period start, metric type).
pub trait SnapshotStore {
    fn find(&self, period_start: NaiveDate, metric_type: MetricType)
        -> Result<Option<MetricSnapshot>>;

    fn upsert(&self, snapshot: MetricSnapshot) -> Result<MetricSnapshot>;

    /// Snapshots whose period starts within `[start, end]`, oldest first.
    fn list_between(
        &self,
        metric_type: MetricType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricSnapshot>>;

    /// Looks up the snapshot of the period containing `date`.
    fn find_by_period(
        &self,
        date: NaiveDate,
        metric_type: MetricType,
    ) -> Result<Option<MetricSnapshot>> {
        let period = metric_type.period_for(date)?;
        self.find(period.start, metric_type)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rows: Mutex<BTreeMap<(NaiveDate, MetricType), MetricSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(NaiveDate, MetricType), MetricSnapshot>>> {
        self.rows
            .lock()
            .map_err(|_| RollupError::Storage("snapshot store lock poisoned".to_string()))
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn find(
        &self,
        period_start: NaiveDate,
        metric_type: MetricType,
    ) -> Result<Option<MetricSnapshot>> {
        Ok(self.lock()?.get(&(period_start, metric_type)).cloned())
    }

    fn upsert(&self, snapshot: MetricSnapshot) -> Result<MetricSnapshot> {
        let mut rows = self.lock()?;
        let stored = match rows.get(&snapshot.key()) {
            Some(existing) => MetricSnapshot {
                captured_at: existing.captured_at,
                ..snapshot
            },
            None => snapshot,
        };
        rows.insert(stored.key(), stored.clone());
        Ok(stored)
    }

    fn list_between(
        &self,
        metric_type: MetricType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricSnapshot>> {
        Ok(self
            .lock()?
            .values()
            .filter(|s| {
                s.metric_type == metric_type && start <= s.period_start && s.period_start <= end
            })
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub previous: f64,
    pub current: f64,
    pub change: f64,
    pub change_percentage: f64,
}

impl MetricDelta {
    pub fn new(previous: f64, current: f64) -> Self {
        let change = current - previous;
        Self {
            previous,
            current,
            change,
            change_percentage: variance_percentage(change, previous),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendComparison {
    pub metric_type: MetricType,
    pub previous_period_start: NaiveDate,
    pub current_period_start: NaiveDate,
    pub total_revenue: MetricDelta,
    pub total_expenses: MetricDelta,
    pub net_operating_income: MetricDelta,
    pub profit_margin: MetricDelta,
    pub occupancy_rate: MetricDelta,
    pub rent_collection_rate: MetricDelta,
    pub budget_utilization: MetricDelta,
    pub average_project_health: MetricDelta,
}

pub fn compare_snapshots(previous: &MetricSnapshot, current: &MetricSnapshot) -> TrendComparison {
    let (p, c) = (&previous.metrics, &current.metrics);
    TrendComparison {
        metric_type: current.metric_type,
        previous_period_start: previous.period_start,
        current_period_start: current.period_start,
        total_revenue: MetricDelta::new(p.total_revenue, c.total_revenue),
        total_expenses: MetricDelta::new(p.total_expenses, c.total_expenses),
        net_operating_income: MetricDelta::new(p.net_operating_income, c.net_operating_income),
        profit_margin: MetricDelta::new(p.profit_margin, c.profit_margin),
        occupancy_rate: MetricDelta::new(p.occupancy_rate, c.occupancy_rate),
        rent_collection_rate: MetricDelta::new(p.rent_collection_rate, c.rent_collection_rate),
        budget_utilization: MetricDelta::new(p.budget_utilization, c.budget_utilization),
        average_project_health: MetricDelta::new(
            p.average_project_health,
            c.average_project_health,
        ),
    }
}

/// Computes a period's rollup and writes it with one upsert.
pub struct SnapshotCapture<'e, 'a, D, S>
where
    D: FinancialDataSource + ?Sized,
    S: SnapshotStore + ?Sized,
{
    engine: &'e RollupEngine<'a, D>,
    store: &'e S,
}

impl<'e, 'a, D, S> SnapshotCapture<'e, 'a, D, S>
where
    D: FinancialDataSource + ?Sized,
    S: SnapshotStore + ?Sized,
{
    pub fn new(engine: &'e RollupEngine<'a, D>, store: &'e S) -> Self {
        Self { engine, store }
    }

    pub fn capture(&self, metric_type: MetricType, date: NaiveDate) -> Result<MetricSnapshot> {
        self.capture_at(metric_type, date, Utc::now().naive_utc())
    }

    /// Nothing is written unless every fetch and computation succeeded.
    pub fn capture_at(
        &self,
        metric_type: MetricType,
        date: NaiveDate,
        captured_at: NaiveDateTime,
    ) -> Result<MetricSnapshot> {
        let period = metric_type.period_for(date)?;
        let portfolio = self.engine.portfolio_metrics(&period)?;

        let active = self
            .engine
            .source()
            .projects(self.engine.access())?
            .into_iter()
            .filter(|p| !p.status.is_terminal())
            .map(|p| self.engine.metrics_for_project(&p, &period))
            .collect::<Result<Vec<_>>>()?;

        let snapshot = MetricSnapshot {
            period_start: period.start,
            period_end: period.end,
            metric_type,
            captured_at,
            metrics: SnapshotMetrics::from_rollup(&portfolio, &active),
        };

        let stored = self.store.upsert(snapshot)?;
        info!(
            "Captured {} snapshot for {} (revenue {}, NOI {})",
            metric_type,
            stored.period_start,
            stored.metrics.total_revenue,
            stored.metrics.net_operating_income
        );
        Ok(stored)
    }

    /// Compares the stored snapshot of the period containing `date` with the one before it.
    pub fn compare_with_previous(
        &self,
        metric_type: MetricType,
        date: NaiveDate,
    ) -> Result<Option<TrendComparison>> {
        let previous_period = metric_type.previous_period(date)?;
        let current = self.store.find_by_period(date, metric_type)?;
        let previous = self.store.find(previous_period.start, metric_type)?;

        match (previous, current) {
            (Some(previous), Some(current)) => Ok(Some(compare_snapshots(&previous, &current))),
            _ => {
                debug!(
                    "No {} snapshot pair around {}; skipping trend comparison",
                    metric_type, date
                );
                Ok(None)
            }
        }
    }

    pub fn history(
        &self,
        metric_type: MetricType,
        window: &DateRange,
    ) -> Result<Vec<MetricSnapshot>> {
        self.store.list_between(metric_type, window.start, window.end)
    }
}
