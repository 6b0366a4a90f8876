use crate::config::RollupConfig;
use crate::error::{Result, RollupError};
use crate::filters::{
    client_invoices, in_period, overlapping_budgets, split, sum_actualized, sum_actualized_by,
    sum_pending, supplier_invoices,
};
use crate::health::{milestone_health, project_health, HealthScore, MilestoneHealth};
use crate::recompute::CostBreakdown;
use crate::schema::{Building, Project, ProjectStatus};
use crate::source::{AccessScope, FinancialDataSource, RecordQuery};
use crate::utils::{average, percentage, variance_percentage, DateRange};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Aggregation boundary of one rollup call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Portfolio,
    Building(String),
    Project(String),
}

/// Revenue, expenses and the two figures derived from them. Holds for every scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_operating_income: f64,
    /// Percent of revenue; 0 when there is no revenue.
    pub profit_margin: f64,
}

impl FinancialSummary {
    pub fn from_totals(total_revenue: f64, total_expenses: f64) -> Self {
        let net_operating_income = total_revenue - total_expenses;
        Self {
            total_revenue,
            total_expenses,
            net_operating_income,
            profit_margin: if total_revenue > 0.0 {
                percentage(net_operating_income, total_revenue)
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomeBreakdown {
    pub rental_income: f64,
    pub other_income: f64,
}

impl IncomeBreakdown {
    pub fn total(&self) -> f64 {
        self.rental_income + self.other_income
    }
}

impl AddAssign for IncomeBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        self.rental_income += rhs.rental_income;
        self.other_income += rhs.other_income;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBreakdown {
    pub budget_expenses: f64,
    pub contractor_payments: f64,
    pub order_materials: f64,
    pub order_labour: f64,
    pub operational_expenses: f64,
}

impl ExpenseBreakdown {
    pub fn total(&self) -> f64 {
        self.budget_expenses
            + self.contractor_payments
            + self.order_materials
            + self.order_labour
            + self.operational_expenses
    }
}

impl AddAssign for ExpenseBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        self.budget_expenses += rhs.budget_expenses;
        self.contractor_payments += rhs.contractor_payments;
        self.order_materials += rhs.order_materials;
        self.order_labour += rhs.order_labour;
        self.operational_expenses += rhs.operational_expenses;
    }
}

/// Money that has not moved yet. Reported for visibility, never part of totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingTotals {
    pub pending_income: f64,
    pub pending_expenses: f64,
}

impl AddAssign for PendingTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.pending_income += rhs.pending_income;
        self.pending_expenses += rhs.pending_expenses;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyMetrics {
    pub total_units: u32,
    pub occupied_units: u32,
    pub occupancy_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RentCollection {
    pub amount_due: f64,
    pub amount_paid: f64,
    pub collection_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUtilization {
    pub total_budget: f64,
    pub spent: f64,
    pub remaining: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildingMetrics {
    pub building_id: String,
    pub building_name: String,
    pub period: DateRange,
    pub income: IncomeBreakdown,
    pub expenses: ExpenseBreakdown,
    pub summary: FinancialSummary,
    pub occupancy: OccupancyMetrics,
    pub rent: RentCollection,
    pub budget: BudgetUtilization,
    pub pending: PendingTotals,
}

/// Org-level money not attributed to any building; kept out of the building sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnallocatedFlows {
    pub other_income: f64,
    pub operational_expenses: f64,
    pub pending: PendingTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub period: DateRange,
    pub building_count: usize,
    pub income: IncomeBreakdown,
    pub expenses: ExpenseBreakdown,
    pub summary: FinancialSummary,
    pub total_units: u32,
    pub occupied_units: u32,
    pub rent_amount_due: f64,
    pub rent_amount_paid: f64,
    pub total_budget: f64,
    pub budget_spent: f64,
    /// Unweighted mean of the per-building rates.
    pub occupancy_rate: f64,
    /// Unweighted mean of the per-building rates.
    pub rent_collection_rate: f64,
    /// Unweighted mean of the per-building rates.
    pub budget_utilization: f64,
    pub pending: PendingTotals,
    pub unallocated: UnallocatedFlows,
    pub buildings: Vec<BuildingMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfitVariance {
    /// revenue - estimated budget
    pub expected_profit: f64,
    /// revenue - actual cost
    pub actual_profit: f64,
    /// actual - expected
    pub variance: f64,
    pub variance_percentage: f64,
}

impl ProfitVariance {
    pub fn new(revenue: f64, estimated_budget: f64, actual_cost: f64) -> Self {
        let expected_profit = revenue - estimated_budget;
        let actual_profit = revenue - actual_cost;
        let variance = actual_profit - expected_profit;
        Self {
            expected_profit,
            actual_profit,
            variance,
            variance_percentage: variance_percentage(variance, expected_profit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    pub project_id: String,
    pub project_name: String,
    pub status: ProjectStatus,
    pub period: DateRange,
    pub revenue: f64,
    pub costs: CostBreakdown,
    pub summary: FinancialSummary,
    pub profit: ProfitVariance,
    pub milestones: Vec<MilestoneHealth>,
    pub health: HealthScore,
    pub pending: PendingTotals,
}

/// Rollup output, tagged by the scope it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "scope", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeMetrics {
    Portfolio(PortfolioMetrics),
    Building(BuildingMetrics),
    Project(ProjectMetrics),
}

impl ScopeMetrics {
    pub fn summary(&self) -> &FinancialSummary {
        match self {
            Self::Portfolio(m) => &m.summary,
            Self::Building(m) => &m.summary,
            Self::Project(m) => &m.summary,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ScopeMetrics)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Pure read-and-sum over a data source. Never writes.
pub struct RollupEngine<'a, D: FinancialDataSource + ?Sized> {
    source: &'a D,
    config: RollupConfig,
    access: AccessScope,
}

impl<'a, D: FinancialDataSource + ?Sized> RollupEngine<'a, D> {
    pub fn new(source: &'a D, config: RollupConfig) -> Self {
        Self {
            source,
            config,
            access: AccessScope::Unrestricted,
        }
    }

    pub fn with_access(mut self, access: AccessScope) -> Self {
        self.access = access;
        self
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessScope {
        &self.access
    }

    pub fn source(&self) -> &'a D {
        self.source
    }

    pub fn compute(&self, scope: &Scope, period: &DateRange) -> Result<ScopeMetrics> {
        info!(
            "Computing {:?} rollup for {} to {}",
            scope, period.start, period.end
        );

        match scope {
            Scope::Portfolio => self.portfolio_metrics(period).map(ScopeMetrics::Portfolio),
            Scope::Building(id) => self.building_metrics(id, period).map(ScopeMetrics::Building),
            Scope::Project(id) => self.project_metrics(id, period).map(ScopeMetrics::Project),
        }
    }

    pub fn building_metrics(
        &self,
        building_id: &str,
        period: &DateRange,
    ) -> Result<BuildingMetrics> {
        let building = self
            .source
            .building(&self.access, building_id)?
            .ok_or_else(|| RollupError::building_not_found(building_id))?;
        self.metrics_for_building(&building, period)
    }

    fn metrics_for_building(
        &self,
        building: &Building,
        period: &DateRange,
    ) -> Result<BuildingMetrics> {
        let access = &self.access;
        let query = RecordQuery::building(building.id.clone(), Some(*period));

        let rent = self.source.rent_payments(access, &query)?;
        let other = self.source.alternative_revenues(access, &query)?;
        let budgets = self.source.budgets(access, &query)?;
        let payments = self.source.payment_requests(access, &query)?;
        let orders = self.source.orders(access, &query)?;
        let operational = self.source.operational_expenses(access, &query)?;

        let rent_split = split(&rent, period);
        let other_split = split(&other, period);
        let payment_split = split(&payments, period);
        let order_split = split(&orders, period);
        let operational_split = split(&operational, period);

        let income = IncomeBreakdown {
            rental_income: rent_split.actualized,
            other_income: other_split.actualized,
        };

        let mut total_budget = 0.0;
        let mut budget_spent = 0.0;
        let mut budget_pending = 0.0;
        for budget in overlapping_budgets(&budgets, period) {
            let spent = split(&budget.expenses, period);
            total_budget += budget.total_budget;
            budget_spent += spent.actualized;
            budget_pending += spent.pending;
        }

        let expenses = ExpenseBreakdown {
            budget_expenses: budget_spent,
            contractor_payments: payment_split.actualized,
            order_materials: sum_actualized_by(&orders, period, |o| o.material_cost),
            order_labour: sum_actualized_by(&orders, period, |o| o.labour_cost),
            operational_expenses: operational_split.actualized,
        };

        let amount_due: f64 = in_period(&rent, period).map(|r| r.amount).sum();
        let amount_paid = income.rental_income;
        let rent_outstanding: f64 = in_period(&rent, period).map(|r| r.outstanding()).sum();

        let pending = PendingTotals {
            pending_income: rent_outstanding + other_split.pending,
            pending_expenses: budget_pending
                + payment_split.pending
                + order_split.pending
                + operational_split.pending,
        };

        let metrics = BuildingMetrics {
            building_id: building.id.clone(),
            building_name: building.name.clone(),
            period: *period,
            summary: FinancialSummary::from_totals(income.total(), expenses.total()),
            income,
            expenses,
            occupancy: OccupancyMetrics {
                total_units: building.total_units,
                occupied_units: building.occupied_units,
                occupancy_rate: percentage(
                    building.occupied_units as f64,
                    building.total_units as f64,
                ),
            },
            rent: RentCollection {
                amount_due,
                amount_paid,
                collection_rate: percentage(amount_paid, amount_due),
            },
            budget: BudgetUtilization {
                total_budget,
                spent: budget_spent,
                remaining: total_budget - budget_spent,
                utilization: percentage(budget_spent, total_budget),
            },
            pending,
        };

        debug!(
            "Building {}: revenue {} expenses {} NOI {}",
            metrics.building_id,
            metrics.summary.total_revenue,
            metrics.summary.total_expenses,
            metrics.summary.net_operating_income
        );

        Ok(metrics)
    }

    /// Every visible building computed on its own, then summed (absolute
    /// figures) or averaged without weighting (rates).
    pub fn portfolio_metrics(&self, period: &DateRange) -> Result<PortfolioMetrics> {
        let buildings = self.source.buildings(&self.access)?;
        let per_building = buildings
            .iter()
            .map(|b| self.metrics_for_building(b, period))
            .collect::<Result<Vec<_>>>()?;

        let mut income = IncomeBreakdown::default();
        let mut expenses = ExpenseBreakdown::default();
        let mut pending = PendingTotals::default();
        let mut total_revenue = 0.0;
        let mut total_expenses = 0.0;
        let mut total_units = 0;
        let mut occupied_units = 0;
        let mut rent_amount_due = 0.0;
        let mut rent_amount_paid = 0.0;
        let mut total_budget = 0.0;
        let mut budget_spent = 0.0;

        for m in &per_building {
            income += m.income;
            expenses += m.expenses;
            pending += m.pending;
            total_revenue += m.summary.total_revenue;
            total_expenses += m.summary.total_expenses;
            total_units += m.occupancy.total_units;
            occupied_units += m.occupancy.occupied_units;
            rent_amount_due += m.rent.amount_due;
            rent_amount_paid += m.rent.amount_paid;
            total_budget += m.budget.total_budget;
            budget_spent += m.budget.spent;
        }

        let rates = |f: fn(&BuildingMetrics) -> f64| -> f64 {
            average(&per_building.iter().map(f).collect::<Vec<_>>())
        };

        let metrics = PortfolioMetrics {
            period: *period,
            building_count: per_building.len(),
            income,
            expenses,
            summary: FinancialSummary::from_totals(total_revenue, total_expenses),
            total_units,
            occupied_units,
            rent_amount_due,
            rent_amount_paid,
            total_budget,
            budget_spent,
            occupancy_rate: rates(|m| m.occupancy.occupancy_rate),
            rent_collection_rate: rates(|m| m.rent.collection_rate),
            budget_utilization: rates(|m| m.budget.utilization),
            pending,
            unallocated: self.unallocated_flows(period)?,
            buildings: per_building,
        };

        info!(
            "Portfolio rollup over {} buildings: revenue {} expenses {}",
            metrics.building_count, metrics.summary.total_revenue, metrics.summary.total_expenses
        );

        Ok(metrics)
    }

    fn unallocated_flows(&self, period: &DateRange) -> Result<UnallocatedFlows> {
        let query = RecordQuery::unallocated(Some(*period));
        let other = split(&self.source.alternative_revenues(&self.access, &query)?, period);
        let operational = split(&self.source.operational_expenses(&self.access, &query)?, period);

        Ok(UnallocatedFlows {
            other_income: other.actualized,
            operational_expenses: operational.actualized,
            pending: PendingTotals {
                pending_income: other.pending,
                pending_expenses: operational.pending,
            },
        })
    }

    pub fn project_metrics(&self, project_id: &str, period: &DateRange) -> Result<ProjectMetrics> {
        let project = self
            .source
            .project(&self.access, project_id)?
            .ok_or_else(|| RollupError::project_not_found(project_id))?;
        self.metrics_for_project(&project, period)
    }

    pub(crate) fn metrics_for_project(
        &self,
        project: &Project,
        period: &DateRange,
    ) -> Result<ProjectMetrics> {
        let access = &self.access;
        let query = RecordQuery::project(project.id.clone(), Some(*period));

        let invoices = self.source.invoices(access, &query)?;
        let quotations = self.source.quotations(access, &query)?;
        let milestones = self.source.milestones(access, &project.id)?;
        let risks = self.source.risks(access, &project.id)?;

        let client = client_invoices(&invoices);
        let supplier = supplier_invoices(&invoices);

        let revenue = sum_actualized(&client, period);
        let costs = CostBreakdown::within(project, &quotations, &invoices, &milestones, period);
        let as_of = period.end;

        let metrics = ProjectMetrics {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            status: project.status,
            period: *period,
            revenue,
            summary: FinancialSummary::from_totals(revenue, costs.total),
            profit: ProfitVariance::new(revenue, project.estimated_budget, costs.total),
            milestones: milestones.iter().map(|m| milestone_health(m, as_of)).collect(),
            health: project_health(&self.config, project, costs.total, &milestones, &risks, as_of),
            pending: PendingTotals {
                pending_income: sum_pending(&client, period),
                pending_expenses: sum_pending(&supplier, period)
                    + sum_pending(&quotations, period),
            },
            costs,
        };

        debug!(
            "Project {}: revenue {} cost {} health {:.1}",
            metrics.project_id, metrics.revenue, metrics.costs.total, metrics.health.score
        );

        Ok(metrics)
    }
}
