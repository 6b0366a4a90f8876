use crate::config::{HealthPenalties, HealthThresholds, RollupConfig};
use crate::schema::{Milestone, MilestoneStatus, Project, ProjectRisk};
use crate::utils::{clamp_score, percentage, variance_percentage};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    AtRisk,
    Critical,
}

impl HealthStatus {
    pub fn classify(score: f64, thresholds: &HealthThresholds) -> Self {
        if score >= thresholds.healthy {
            Self::Healthy
        } else if score >= thresholds.at_risk {
            Self::AtRisk
        } else {
            Self::Critical
        }
    }
}

/// Weighted blend of three sub-scores, each already clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub score: f64,
    pub budget_health: f64,
    pub schedule_health: f64,
    pub risk_health: f64,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneHealth {
    pub milestone_id: String,
    pub name: String,
    pub status: MilestoneStatus,
    pub budget_allocated: f64,
    pub actual_cost: f64,
    pub remaining_budget: f64,
    pub budget_utilization: f64,
    /// actual - allocated
    pub cost_variance: f64,
    pub cost_variance_percentage: f64,
    pub expected_profit: f64,
    pub is_over_budget: bool,
    pub is_delayed: bool,
}

pub fn is_milestone_delayed(milestone: &Milestone, as_of: NaiveDate) -> bool {
    match milestone.status {
        MilestoneStatus::Delayed => true,
        MilestoneStatus::Completed => false,
        _ => milestone.due_date.is_some_and(|due| due < as_of),
    }
}

pub fn milestone_health(milestone: &Milestone, as_of: NaiveDate) -> MilestoneHealth {
    let cost_variance = milestone.actual_cost - milestone.budget_allocated;
    MilestoneHealth {
        milestone_id: milestone.id.clone(),
        name: milestone.name.clone(),
        status: milestone.status,
        budget_allocated: milestone.budget_allocated,
        actual_cost: milestone.actual_cost,
        remaining_budget: milestone.budget_allocated - milestone.actual_cost,
        budget_utilization: percentage(milestone.actual_cost, milestone.budget_allocated),
        cost_variance,
        cost_variance_percentage: variance_percentage(cost_variance, milestone.budget_allocated),
        expected_profit: milestone.expected_profit,
        is_over_budget: milestone.actual_cost > milestone.budget_allocated,
        is_delayed: is_milestone_delayed(milestone, as_of),
    }
}

/// 100 minus the overrun percentage, scaled by the configured penalty.
pub fn budget_health(estimated_budget: f64, actual_cost: f64, penalties: &HealthPenalties) -> f64 {
    let overrun = (actual_cost - estimated_budget).max(0.0);
    let overrun_pct = percentage(overrun, estimated_budget);
    clamp_score(100.0 - overrun_pct * penalties.budget_overrun_per_percent)
}

pub fn schedule_health(
    project: &Project,
    milestones: &[Milestone],
    as_of: NaiveDate,
    penalties: &HealthPenalties,
) -> f64 {
    let delayed = milestones
        .iter()
        .filter(|m| is_milestone_delayed(m, as_of))
        .count();
    let delayed_pct = percentage(delayed as f64, milestones.len() as f64);

    let overdue_days = match project.end_date {
        Some(end) if !project.status.is_terminal() && end < as_of => (as_of - end).num_days(),
        _ => 0,
    };

    clamp_score(
        100.0
            - delayed_pct * penalties.delayed_milestone_per_percent
            - overdue_days as f64 * penalties.overdue_per_day,
    )
}

pub fn risk_health(risks: &[ProjectRisk], penalties: &HealthPenalties) -> f64 {
    let high = risks.iter().filter(|r| r.is_open_high()).count();
    let high_pct = percentage(high as f64, risks.len() as f64);
    clamp_score(100.0 - high_pct * penalties.high_risk_per_percent)
}

pub fn project_health(
    config: &RollupConfig,
    project: &Project,
    actual_cost: f64,
    milestones: &[Milestone],
    risks: &[ProjectRisk],
    as_of: NaiveDate,
) -> HealthScore {
    let penalties = &config.penalties;
    let weights = &config.health_weights;

    let budget = budget_health(project.estimated_budget, actual_cost, penalties);
    let schedule = schedule_health(project, milestones, as_of, penalties);
    let risk = risk_health(risks, penalties);

    let score = clamp_score(
        weights.budget * budget + weights.schedule * schedule + weights.risk * risk,
    );

    HealthScore {
        score,
        budget_health: budget,
        schedule_health: schedule,
        risk_health: risk,
        status: HealthStatus::classify(score, &config.thresholds),
    }
}
