//! Cross-project profit analytics with a month-by-month trend.

use crate::engine::{FinancialSummary, ProjectMetrics, RollupEngine};
use crate::error::Result;
use crate::filters::{
    client_invoices, milestone_booking_date, sum_actualized, supplier_invoices,
};
use crate::schema::{Invoice, Milestone, ProjectStatus, Quotation};
use crate::source::{FinancialDataSource, RecordQuery};
use crate::utils::DateRange;
use chrono::NaiveDate;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProfit {
    pub project_id: String,
    pub project_name: String,
    pub status: ProjectStatus,
    pub revenue: f64,
    pub cost: f64,
    pub expected_profit: f64,
    pub actual_profit: f64,
    pub variance: f64,
    pub variance_percentage: f64,
    pub profit_margin: f64,
}

impl From<&ProjectMetrics> for ProjectProfit {
    fn from(m: &ProjectMetrics) -> Self {
        Self {
            project_id: m.project_id.clone(),
            project_name: m.project_name.clone(),
            status: m.status,
            revenue: m.revenue,
            cost: m.costs.total,
            expected_profit: m.profit.expected_profit,
            actual_profit: m.profit.actual_profit,
            variance: m.profit.variance,
            variance_percentage: m.profit.variance_percentage,
            profit_margin: m.summary.profit_margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrendPoint {
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAnalytics {
    pub period: DateRange,
    pub projects: Vec<ProjectProfit>,
    pub project_revenue: f64,
    pub project_cost: f64,
    pub expected_profit: f64,
    pub actual_profit: f64,
    pub alternative_revenue: f64,
    pub operational_expenses: f64,
    /// Revenue is project revenue plus alternative revenue; expenses are
    /// project cost plus operational expenses.
    pub summary: FinancialSummary,
    pub trend: Vec<MonthlyTrendPoint>,
}

/// Dated project inputs, fetched once and re-summed per month.
struct ProjectLedger {
    client: Vec<Invoice>,
    supplier: Vec<Invoice>,
    quotations: Vec<Quotation>,
    milestones: Vec<Milestone>,
}

impl ProjectLedger {
    fn revenue(&self, month: &DateRange) -> f64 {
        sum_actualized(&self.client, month)
    }

    fn cost(&self, month: &DateRange, period: &DateRange) -> f64 {
        let milestones: f64 = self
            .milestones
            .iter()
            .filter(|m| milestone_booking_date(m, period).is_some_and(|d| month.contains(d)))
            .map(|m| m.actual_cost)
            .sum();
        sum_actualized(&self.quotations, month) + sum_actualized(&self.supplier, month) + milestones
    }
}

impl<'a, D: FinancialDataSource + ?Sized> RollupEngine<'a, D> {
    /// Project totals come from the project rollup; the trend re-buckets the
    /// same inputs by month so that it adds up to the totals.
    pub fn profit_analytics(&self, period: &DateRange) -> Result<ProfitAnalytics> {
        let source = self.source();
        let access = self.access();

        let mut projects = Vec::new();
        let mut ledgers = Vec::new();
        for project in source.projects(access)? {
            let query = RecordQuery::project(project.id.clone(), Some(*period));
            let invoices = source.invoices(access, &query)?;
            ledgers.push(ProjectLedger {
                client: client_invoices(&invoices),
                supplier: supplier_invoices(&invoices),
                quotations: source.quotations(access, &query)?,
                milestones: source.milestones(access, &project.id)?,
            });
            projects.push(ProjectProfit::from(&self.metrics_for_project(&project, period)?));
        }

        let query = RecordQuery::any(Some(*period));
        let other = source.alternative_revenues(access, &query)?;
        let operational = source.operational_expenses(access, &query)?;

        let project_revenue: f64 = projects.iter().map(|p| p.revenue).sum();
        let project_cost: f64 = projects.iter().map(|p| p.cost).sum();
        let alternative_revenue = sum_actualized(&other, period);
        let operational_expenses = sum_actualized(&operational, period);

        let trend = period
            .months()?
            .into_iter()
            .map(|month| {
                let revenue = ledgers.iter().map(|l| l.revenue(&month)).sum::<f64>()
                    + sum_actualized(&other, &month);
                let cost = ledgers.iter().map(|l| l.cost(&month, period)).sum::<f64>()
                    + sum_actualized(&operational, &month);
                MonthlyTrendPoint {
                    month_start: month.start,
                    month_end: month.end,
                    revenue,
                    cost,
                    profit: revenue - cost,
                }
            })
            .collect();

        let analytics = ProfitAnalytics {
            period: *period,
            project_revenue,
            project_cost,
            expected_profit: projects.iter().map(|p| p.expected_profit).sum(),
            actual_profit: projects.iter().map(|p| p.actual_profit).sum(),
            alternative_revenue,
            operational_expenses,
            summary: FinancialSummary::from_totals(
                project_revenue + alternative_revenue,
                project_cost + operational_expenses,
            ),
            projects,
            trend,
        };

        info!(
            "Profit analytics over {} projects: net {}",
            analytics.projects.len(),
            analytics.summary.net_operating_income
        );

        Ok(analytics)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RollupConfig;
    use crate::engine::RollupEngine;
    use crate::schema::*;
    use crate::source::InMemoryDataSource;
    use crate::utils::DateRange;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client_invoice(id: &str, project: &str, total: f64, paid: NaiveDate) -> Invoice {
        Invoice {
            id: id.to_string(),
            kind: InvoiceKind::Client,
            project_id: Some(project.to_string()),
            building_id: None,
            contractor_id: None,
            subtotal: total,
            tax: 0.0,
            total,
            status: InvoiceStatus::Paid,
            due_date: paid,
            paid_date: Some(paid),
        }
    }

    #[test]
    fn test_profit_analytics_totals_and_trend() {
        let data = InMemoryDataSource {
            projects: vec![Project {
                id: "p1".to_string(),
                name: "Facade".to_string(),
                building_id: None,
                estimated_budget: 10_000.0,
                actual_cost: 0.0,
                status: ProjectStatus::InProgress,
                start_date: None,
                end_date: None,
            }],
            invoices: vec![
                client_invoice("i1", "p1", 6_000.0, date(2024, 1, 20)),
                client_invoice("i2", "p1", 9_000.0, date(2024, 2, 10)),
            ],
            quotations: vec![Quotation {
                id: "q1".to_string(),
                project_id: Some("p1".to_string()),
                building_id: None,
                contractor_id: None,
                subtotal: 8_000.0,
                tax: 0.0,
                total: 8_000.0,
                status: QuotationStatus::Approved,
                created_at: date(2024, 1, 2),
                approved_date: Some(date(2024, 1, 3)),
            }],
            alternative_revenues: vec![AlternativeRevenue {
                id: "ar".to_string(),
                building_id: None,
                amount: 500.0,
                category: "parking".to_string(),
                date: date(2024, 2, 1),
                is_approved: true,
            }],
            operational_expenses: vec![OperationalExpense {
                id: "ox".to_string(),
                building_id: None,
                amount: 1_500.0,
                category: "insurance".to_string(),
                date: date(2024, 2, 15),
                is_approved: true,
            }],
            ..Default::default()
        };

        let engine = RollupEngine::new(&data, RollupConfig::default());
        let window = DateRange::parse("2024-01:2024-03").unwrap();
        let analytics = engine.profit_analytics(&window).unwrap();

        assert_eq!(analytics.projects.len(), 1);
        assert_eq!(analytics.project_revenue, 15_000.0);
        assert_eq!(analytics.project_cost, 8_000.0);
        assert_eq!(analytics.expected_profit, 5_000.0);
        assert_eq!(analytics.actual_profit, 7_000.0);
        assert_eq!(analytics.summary.total_revenue, 15_500.0);
        assert_eq!(analytics.summary.total_expenses, 9_500.0);
        assert_eq!(analytics.summary.net_operating_income, 6_000.0);

        assert_eq!(analytics.trend.len(), 3);
        assert_eq!(analytics.trend[0].revenue, 6_000.0);
        assert_eq!(analytics.trend[0].cost, 8_000.0);
        assert_eq!(analytics.trend[0].profit, -2_000.0);
        assert_eq!(analytics.trend[1].revenue, 9_500.0);
        assert_eq!(analytics.trend[1].cost, 1_500.0);
        assert_eq!(analytics.trend[2].profit, 0.0);
    }

    #[test]
    fn test_trend_adds_up_to_totals() {
        let milestone = |id: &str, cost: f64, due: Option<NaiveDate>| Milestone {
            id: id.to_string(),
            project_id: "p1".to_string(),
            name: id.to_string(),
            budget_allocated: cost,
            actual_cost: cost,
            expected_profit: 0.0,
            status: MilestoneStatus::InProgress,
            start_date: None,
            due_date: due,
        };
        let data = InMemoryDataSource {
            projects: vec![Project {
                id: "p1".to_string(),
                name: "Atrium".to_string(),
                building_id: None,
                estimated_budget: 100_000.0,
                actual_cost: 0.0,
                status: ProjectStatus::InProgress,
                start_date: None,
                end_date: None,
            }],
            milestones: vec![
                milestone("undated", 120_000.0, None),
                milestone("glazing", 4_000.0, Some(date(2024, 2, 20))),
            ],
            invoices: vec![
                client_invoice("i1", "p1", 150_000.0, date(2024, 3, 12)),
                Invoice {
                    project_id: None,
                    ..client_invoice("loose", "p1", 999.0, date(2024, 3, 12))
                },
            ],
            payment_requests: vec![PaymentRequest {
                id: "pr".to_string(),
                project_id: Some("p1".to_string()),
                building_id: None,
                contractor_id: Some("c1".to_string()),
                calculated_amount: 5_000.0,
                status: PaymentRequestStatus::Paid,
                created_at: date(2024, 2, 1),
                paid_date: Some(date(2024, 2, 2)),
            }],
            ..Default::default()
        };

        let engine = RollupEngine::new(&data, RollupConfig::default());
        let window = DateRange::parse("2024-01:2024-06").unwrap();
        let analytics = engine.profit_analytics(&window).unwrap();

        assert_eq!(analytics.summary.total_revenue, 150_000.0);
        assert_eq!(analytics.summary.total_expenses, 124_000.0);

        let revenue: f64 = analytics.trend.iter().map(|p| p.revenue).sum();
        let cost: f64 = analytics.trend.iter().map(|p| p.cost).sum();
        let profit: f64 = analytics.trend.iter().map(|p| p.profit).sum();
        assert_eq!(revenue, analytics.summary.total_revenue);
        assert_eq!(cost, analytics.summary.total_expenses);
        assert_eq!(profit, analytics.summary.net_operating_income);

        assert_eq!(analytics.trend[1].cost, 4_000.0);
        assert_eq!(analytics.trend[2].revenue, 150_000.0);
        assert_eq!(analytics.trend[5].cost, 120_000.0);
    }
}
