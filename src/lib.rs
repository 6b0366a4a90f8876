//! # Facility Rollup
//!
//! Financial rollups for multi-tenant facility and property management:
//! revenue, expenses, net operating income, budget variance, project
//! health and point-in-time metric snapshots.
//!
//! ## Core Concepts
//!
//! - **Scope**: the aggregation boundary, a single building, a single project
//!   or the whole portfolio
//! - **Actualized vs Pending**: only records in an actualized status (paid,
//!   approved, completed) count towards totals
//! - **Relevant Date**: every record has one date that decides which window it belongs to
//! - **Portfolio**: each visible building is computed on its own, then summed
//!   (amounts) or averaged (rates)
//! - **Snapshot**: a captured portfolio rollup keyed by period start and metric
//!   type, upserted idempotently
//!
//! ## Example
//!
//! ```rust,ignore
//! use facility_rollup::*;
//!
//! let source = InMemoryDataSource::from_json_str(&std::fs::read_to_string("tenant.json")?)?;
//! let engine = RollupEngine::new(&source, RollupConfig::default()).with_access(
//!     AccessScope::PropertyManager {
//!         building_ids: vec!["harbour-view".to_string()],
//!     },
//! );
//!
//! let period = DateRange::parse("2024-01:2024-03")?;
//! let metrics = engine.compute(&Scope::Portfolio, &period)?;
//! println!("NOI: {}", metrics.summary().net_operating_income);
//!
//! let store = InMemorySnapshotStore::new();
//! SnapshotCapture::new(&engine, &store).capture(MetricType::Monthly, period.end)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod filters;
pub mod health;
pub mod profit;
pub mod recompute;
pub mod schema;
pub mod snapshot;
pub mod source;
pub mod utils;

#[cfg(feature = "sqlite")]
pub mod store_sqlite;

pub use config::{HealthPenalties, HealthThresholds, HealthWeights, RollupConfig};
pub use engine::*;
pub use error::{Result, RollupError};
pub use filters::{Dated, Monetary, MoneySplit};
pub use health::{HealthScore, HealthStatus, MilestoneHealth};
pub use profit::{MonthlyTrendPoint, ProfitAnalytics, ProjectProfit};
pub use recompute::{recompute_project_cost, CostBreakdown, ProjectCostRecompute};
pub use schema::*;
pub use snapshot::{
    compare_snapshots, InMemorySnapshotStore, MetricDelta, MetricSnapshot, MetricType,
    SnapshotCapture, SnapshotMetrics, SnapshotStore, TrendComparison,
};
pub use source::{AccessScope, FinancialDataSource, InMemoryDataSource, Owner, RecordQuery};
pub use utils::*;

#[cfg(feature = "sqlite")]
pub use store_sqlite::SqliteSnapshotStore;

use log::{debug, info};

/// Computes one scope over a "YYYY-MM" or "YYYY-MM:YYYY-MM" period string.
pub fn compute_rollup<D>(
    source: &D,
    config: RollupConfig,
    access: AccessScope,
    scope: &Scope,
    period: &str,
) -> Result<ScopeMetrics>
where
    D: FinancialDataSource + ?Sized,
{
    config.validate()?;
    let period = DateRange::parse(period)?;
    RollupEngine::new(source, config)
        .with_access(access)
        .compute(scope, &period)
}

pub fn compute_with_verification<D>(
    source: &D,
    config: RollupConfig,
    access: AccessScope,
    scope: &Scope,
    period: &str,
    tolerance: f64,
) -> Result<ScopeMetrics>
where
    D: FinancialDataSource + ?Sized,
{
    let metrics = compute_rollup(source, config, access, scope, period)?;
    verify_rollup(&metrics, tolerance)?;
    Ok(metrics)
}

/// Checks the identities every rollup must satisfy: NOI is revenue minus
/// expenses, the margin follows from them, and a portfolio's totals equal
/// the sum of its buildings.
pub fn verify_rollup(metrics: &ScopeMetrics, tolerance: f64) -> Result<()> {
    let summary = metrics.summary();
    check_summary(summary, tolerance)?;

    if let ScopeMetrics::Portfolio(portfolio) = metrics {
        let revenue: f64 = portfolio
            .buildings
            .iter()
            .map(|b| b.summary.total_revenue)
            .sum();
        let expenses: f64 = portfolio
            .buildings
            .iter()
            .map(|b| b.summary.total_expenses)
            .sum();

        if (revenue - summary.total_revenue).abs() > tolerance {
            return Err(RollupError::VerificationFailed(format!(
                "Portfolio revenue {} differs from building sum {}",
                summary.total_revenue, revenue
            )));
        }
        if (expenses - summary.total_expenses).abs() > tolerance {
            return Err(RollupError::VerificationFailed(format!(
                "Portfolio expenses {} differs from building sum {}",
                summary.total_expenses, expenses
            )));
        }

        for building in &portfolio.buildings {
            check_summary(&building.summary, tolerance)?;
        }
        debug!(
            "Verified portfolio rollup across {} buildings",
            portfolio.buildings.len()
        );
    }

    info!("Rollup verification passed");
    Ok(())
}

fn check_summary(summary: &FinancialSummary, tolerance: f64) -> Result<()> {
    let expected_noi = summary.total_revenue - summary.total_expenses;
    if (summary.net_operating_income - expected_noi).abs() > tolerance {
        return Err(RollupError::VerificationFailed(format!(
            "NOI {} does not equal revenue {} minus expenses {}",
            summary.net_operating_income, summary.total_revenue, summary.total_expenses
        )));
    }

    let expected_margin = if summary.total_revenue > 0.0 {
        percentage(expected_noi, summary.total_revenue)
    } else {
        0.0
    };
    if (summary.profit_margin - expected_margin).abs() > tolerance {
        return Err(RollupError::VerificationFailed(format!(
            "Profit margin {} should be {}",
            summary.profit_margin, expected_margin
        )));
    }

    Ok(())
}
