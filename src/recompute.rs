//! Single-project cost recompute: approved quotations, paid supplier
//! invoices and milestone costs, over the project's whole lifetime.

use crate::error::{Result, RollupError};
use crate::filters::{
    milestone_in_period, sum_actualized, sum_actualized_all, supplier_invoices,
};
use crate::schema::{Invoice, Milestone, Project, Quotation};
use crate::source::{AccessScope, FinancialDataSource, RecordQuery};
use crate::utils::{percentage, variance_percentage, DateRange};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub quotation_costs: f64,
    pub invoice_costs: f64,
    pub milestone_costs: f64,
    pub total: f64,
    pub estimated_budget: f64,
    /// total - estimated budget; positive means over budget
    pub variance: f64,
    pub variance_percentage: f64,
    pub budget_utilization: f64,
}

impl CostBreakdown {
    pub fn new(
        estimated_budget: f64,
        quotation_costs: f64,
        invoice_costs: f64,
        milestone_costs: f64,
    ) -> Self {
        let total = quotation_costs + invoice_costs + milestone_costs;
        let variance = total - estimated_budget;
        Self {
            quotation_costs,
            invoice_costs,
            milestone_costs,
            total,
            estimated_budget,
            variance,
            variance_percentage: variance_percentage(variance, estimated_budget),
            budget_utilization: percentage(total, estimated_budget),
        }
    }

    /// Lifetime costs, ignoring record dates.
    pub fn lifetime(
        project: &Project,
        quotations: &[Quotation],
        invoices: &[Invoice],
        milestones: &[Milestone],
    ) -> Self {
        let supplier = supplier_invoices(invoices);
        Self::new(
            project.estimated_budget,
            sum_actualized_all(quotations),
            sum_actualized_all(&supplier),
            milestones.iter().map(|m| m.actual_cost).sum(),
        )
    }

    /// Costs whose relevant date (or milestone span) falls in `period`.
    pub fn within(
        project: &Project,
        quotations: &[Quotation],
        invoices: &[Invoice],
        milestones: &[Milestone],
        period: &DateRange,
    ) -> Self {
        let supplier = supplier_invoices(invoices);
        Self::new(
            project.estimated_budget,
            sum_actualized(quotations, period),
            sum_actualized(&supplier, period),
            milestones
                .iter()
                .filter(|m| milestone_in_period(m, period))
                .map(|m| m.actual_cost)
                .sum(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCostRecompute {
    /// The project with `actual_cost` refreshed; persisting it is the caller's job.
    pub project: Project,
    pub breakdown: CostBreakdown,
}

pub fn recompute_project_cost<D>(
    source: &D,
    access: &AccessScope,
    project_id: &str,
) -> Result<ProjectCostRecompute>
where
    D: FinancialDataSource + ?Sized,
{
    let mut project = source
        .project(access, project_id)?
        .ok_or_else(|| RollupError::project_not_found(project_id))?;

    let query = RecordQuery::project(project_id, None);
    let quotations = source.quotations(access, &query)?;
    let invoices = source.invoices(access, &query)?;
    let milestones = source.milestones(access, project_id)?;

    let breakdown = CostBreakdown::lifetime(&project, &quotations, &invoices, &milestones);

    if project.actual_cost != breakdown.total {
        debug!(
            "Project {} actual cost changes from {} to {}",
            project.id, project.actual_cost, breakdown.total
        );
    }
    project.actual_cost = breakdown.total;

    info!(
        "Recomputed project {}: cost {} against budget {} (variance {})",
        project.id, breakdown.total, breakdown.estimated_budget, breakdown.variance
    );

    Ok(ProjectCostRecompute { project, breakdown })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use crate::source::InMemoryDataSource;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn data() -> InMemoryDataSource {
        InMemoryDataSource {
            projects: vec![Project {
                id: "p1".to_string(),
                name: "Lobby refurbishment".to_string(),
                building_id: Some("b1".to_string()),
                estimated_budget: 50_000.0,
                actual_cost: 999.0,
                status: ProjectStatus::InProgress,
                start_date: None,
                end_date: None,
            }],
            milestones: vec![Milestone {
                id: "m1".to_string(),
                project_id: "p1".to_string(),
                name: "Demolition".to_string(),
                budget_allocated: 20_000.0,
                actual_cost: 18_000.0,
                expected_profit: 2_000.0,
                status: MilestoneStatus::Completed,
                start_date: None,
                due_date: None,
            }],
            quotations: vec![
                Quotation {
                    id: "q1".to_string(),
                    project_id: Some("p1".to_string()),
                    building_id: None,
                    contractor_id: Some("c1".to_string()),
                    subtotal: 10_000.0,
                    tax: 1_500.0,
                    total: 11_500.0,
                    status: QuotationStatus::Approved,
                    created_at: date(2024, 1, 5),
                    approved_date: Some(date(2024, 1, 9)),
                },
                Quotation {
                    id: "q2".to_string(),
                    project_id: Some("p1".to_string()),
                    building_id: None,
                    contractor_id: Some("c1".to_string()),
                    subtotal: 4_000.0,
                    tax: 600.0,
                    total: 4_600.0,
                    status: QuotationStatus::Draft,
                    created_at: date(2024, 1, 5),
                    approved_date: None,
                },
            ],
            invoices: vec![
                Invoice {
                    id: "inv-supplier".to_string(),
                    kind: InvoiceKind::Supplier,
                    project_id: Some("p1".to_string()),
                    building_id: None,
                    contractor_id: Some("c1".to_string()),
                    subtotal: 5_000.0,
                    tax: 750.0,
                    total: 5_750.0,
                    status: InvoiceStatus::Paid,
                    due_date: date(2024, 2, 1),
                    paid_date: Some(date(2024, 2, 3)),
                },
                Invoice {
                    id: "inv-client".to_string(),
                    kind: InvoiceKind::Client,
                    project_id: Some("p1".to_string()),
                    building_id: None,
                    contractor_id: None,
                    subtotal: 60_000.0,
                    tax: 0.0,
                    total: 60_000.0,
                    status: InvoiceStatus::Paid,
                    due_date: date(2024, 2, 1),
                    paid_date: Some(date(2024, 2, 3)),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_recompute_sums_all_cost_sources() {
        let result = recompute_project_cost(&data(), &AccessScope::Unrestricted, "p1").unwrap();
        let b = &result.breakdown;

        assert_eq!(b.quotation_costs, 11_500.0);
        assert_eq!(b.invoice_costs, 5_750.0);
        assert_eq!(b.milestone_costs, 18_000.0);
        assert_eq!(b.total, 35_250.0);
        assert_eq!(b.variance, -14_750.0);
        assert_eq!(b.variance_percentage, -29.5);
        assert_eq!(result.project.actual_cost, 35_250.0);
    }

    #[test]
    fn test_recompute_is_stable() {
        let mut source = data();
        let first = recompute_project_cost(&source, &AccessScope::Unrestricted, "p1").unwrap();
        source.projects[0] = first.project.clone();
        let second = recompute_project_cost(&source, &AccessScope::Unrestricted, "p1").unwrap();
        assert_eq!(first.breakdown, second.breakdown);
    }

    #[test]
    fn test_unknown_project_is_scope_not_found() {
        let err = recompute_project_cost(&data(), &AccessScope::Unrestricted, "nope").unwrap_err();
        assert!(err.is_scope_not_found());
    }

    #[test]
    fn test_zero_budget_has_zero_ratios() {
        let breakdown = CostBreakdown::new(0.0, 100.0, 0.0, 0.0);
        assert_eq!(breakdown.variance, 100.0);
        assert_eq!(breakdown.variance_percentage, 0.0);
        assert_eq!(breakdown.budget_utilization, 0.0);
    }
}
