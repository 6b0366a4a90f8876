use crate::error::{Result, RollupError};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthWeights {
    #[schemars(description = "Share of the project health score driven by budget health")]
    pub budget: f64,
    #[schemars(description = "Share of the project health score driven by schedule health")]
    pub schedule: f64,
    #[schemars(description = "Share of the project health score driven by risk health")]
    pub risk: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            budget: 0.4,
            schedule: 0.3,
            risk: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthPenalties {
    #[schemars(description = "Points lost per percent of cost above the estimated budget")]
    pub budget_overrun_per_percent: f64,
    #[schemars(description = "Points lost per percent of milestones that are delayed")]
    pub delayed_milestone_per_percent: f64,
    #[schemars(description = "Points lost per day an unfinished project is past its end date")]
    pub overdue_per_day: f64,
    #[schemars(description = "Points lost per percent of risks that are open and high or critical")]
    pub high_risk_per_percent: f64,
}

impl Default for HealthPenalties {
    fn default() -> Self {
        Self {
            budget_overrun_per_percent: 1.0,
            delayed_milestone_per_percent: 1.0,
            overdue_per_day: 1.0,
            high_risk_per_percent: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthThresholds {
    pub healthy: f64,
    pub at_risk: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            healthy: 80.0,
            at_risk: 60.0,
        }
    }
}

/// Tunables for the rollup. `Default` carries the production constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RollupConfig {
    pub health_weights: HealthWeights,
    pub penalties: HealthPenalties,
    pub thresholds: HealthThresholds,
}

impl RollupConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        debug!("Loaded rollup configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.health_weights;
        for (name, value) in [("budget", w.budget), ("schedule", w.schedule), ("risk", w.risk)] {
            if !(value >= 0.0) {
                return Err(RollupError::InvalidConfig(format!(
                    "Health weight '{}' must be non-negative, got {}",
                    name, value
                )));
            }
        }

        let total = w.budget + w.schedule + w.risk;
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RollupError::InvalidConfig(format!(
                "Health weights must sum to 1.0, got {}",
                total
            )));
        }

        let p = &self.penalties;
        for (name, value) in [
            ("budgetOverrunPerPercent", p.budget_overrun_per_percent),
            ("delayedMilestonePerPercent", p.delayed_milestone_per_percent),
            ("overduePerDay", p.overdue_per_day),
            ("highRiskPerPercent", p.high_risk_per_percent),
        ] {
            if !(value >= 0.0) {
                return Err(RollupError::InvalidConfig(format!(
                    "Penalty '{}' must be non-negative, got {}",
                    name, value
                )));
            }
        }

        let t = &self.thresholds;
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(t.healthy) || !in_range(t.at_risk) || t.at_risk > t.healthy {
            return Err(RollupError::InvalidConfig(format!(
                "Thresholds must satisfy 0 <= atRisk ({}) <= healthy ({}) <= 100",
                t.at_risk, t.healthy
            )));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RollupConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
