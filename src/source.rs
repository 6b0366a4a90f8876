//! The data-access collaborator the rollup reads through.
//!
//! Authorization scoping is an explicit [`AccessScope`] argument on every
//! query, so the engine itself never branches on who is asking.

use crate::error::Result;
use crate::filters::Dated;
use crate::schema::*;
use crate::utils::DateRange;
use serde::{Deserialize, Serialize};

/// Which records the caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessScope {
    #[default]
    Unrestricted,
    /// Only the listed buildings and records attributed to them.
    PropertyManager { building_ids: Vec<String> },
    /// Only records the contractor issued or is paid for.
    Contractor { contractor_id: String },
}

impl AccessScope {
    pub fn allows_building(&self, building_id: &str) -> bool {
        match self {
            Self::PropertyManager { building_ids } => building_ids.iter().any(|b| b == building_id),
            Self::Unrestricted | Self::Contractor { .. } => true,
        }
    }

    fn allows<T: Attributed>(&self, record: &T) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::PropertyManager { building_ids } => record
                .building_id()
                .is_some_and(|id| building_ids.iter().any(|b| b == id)),
            Self::Contractor { contractor_id } => {
                record.contractor_id() == Some(contractor_id.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Building(String),
    Project(String),
    /// Records tied to neither a building nor a project.
    Unallocated,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub owner: Owner,
    /// Sources may pre-filter by this window; the engine re-applies it regardless.
    pub period: Option<DateRange>,
}

impl RecordQuery {
    pub fn building(id: impl Into<String>, period: Option<DateRange>) -> Self {
        Self {
            owner: Owner::Building(id.into()),
            period,
        }
    }

    pub fn project(id: impl Into<String>, period: Option<DateRange>) -> Self {
        Self {
            owner: Owner::Project(id.into()),
            period,
        }
    }

    pub fn unallocated(period: Option<DateRange>) -> Self {
        Self {
            owner: Owner::Unallocated,
            period,
        }
    }

    pub fn any(period: Option<DateRange>) -> Self {
        Self {
            owner: Owner::Any,
            period,
        }
    }

    fn matches_owner<T: Attributed>(&self, record: &T) -> bool {
        match &self.owner {
            Owner::Building(id) => record.building_id() == Some(id.as_str()),
            Owner::Project(id) => record.project_id() == Some(id.as_str()),
            Owner::Unallocated => record.building_id().is_none() && record.project_id().is_none(),
            Owner::Any => true,
        }
    }
}

/// Read-only queries over the entity collections. Every result is already
/// restricted to what `access` may see.
pub trait FinancialDataSource {
    fn buildings(&self, access: &AccessScope) -> Result<Vec<Building>>;

    fn building(&self, access: &AccessScope, id: &str) -> Result<Option<Building>> {
        Ok(self.buildings(access)?.into_iter().find(|b| b.id == id))
    }

    fn projects(&self, access: &AccessScope) -> Result<Vec<Project>>;

    fn project(&self, access: &AccessScope, id: &str) -> Result<Option<Project>> {
        Ok(self.projects(access)?.into_iter().find(|p| p.id == id))
    }

    fn milestones(&self, access: &AccessScope, project_id: &str) -> Result<Vec<Milestone>>;

    fn risks(&self, access: &AccessScope, project_id: &str) -> Result<Vec<ProjectRisk>>;

    fn invoices(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Invoice>>;

    fn quotations(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Quotation>>;

    fn payment_requests(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<PaymentRequest>>;

    fn orders(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Order>>;

    fn operational_expenses(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<OperationalExpense>>;

    fn alternative_revenues(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<AlternativeRevenue>>;

    fn rent_payments(&self, access: &AccessScope, query: &RecordQuery)
        -> Result<Vec<RentPayment>>;

    fn budgets(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Budget>>;
}

/// Ownership links used for scope and access filtering.
pub trait Attributed {
    fn building_id(&self) -> Option<&str>;

    fn project_id(&self) -> Option<&str> {
        None
    }

    fn contractor_id(&self) -> Option<&str> {
        None
    }
}

impl Attributed for Invoice {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
    fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
    fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }
}

impl Attributed for Quotation {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
    fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
    fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }
}

impl Attributed for PaymentRequest {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
    fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
    fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }
}

impl Attributed for Order {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
    fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }
}

impl Attributed for OperationalExpense {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
}

impl Attributed for AlternativeRevenue {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
}

impl Attributed for RentPayment {
    fn building_id(&self) -> Option<&str> {
        Some(&self.building_id)
    }
}

impl Attributed for Budget {
    fn building_id(&self) -> Option<&str> {
        Some(&self.building_id)
    }
}

impl Attributed for Project {
    fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }
}

/// Collections held in memory. Used for fixtures and for callers that have
/// already loaded a tenant's records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InMemoryDataSource {
    pub buildings: Vec<Building>,
    pub projects: Vec<Project>,
    pub milestones: Vec<Milestone>,
    pub risks: Vec<ProjectRisk>,
    pub invoices: Vec<Invoice>,
    pub quotations: Vec<Quotation>,
    pub payment_requests: Vec<PaymentRequest>,
    pub orders: Vec<Order>,
    pub operational_expenses: Vec<OperationalExpense>,
    pub alternative_revenues: Vec<AlternativeRevenue>,
    pub rent_payments: Vec<RentPayment>,
    pub budgets: Vec<Budget>,
}

impl InMemoryDataSource {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn project_visible(&self, access: &AccessScope, project_id: &str) -> bool {
        self.projects
            .iter()
            .any(|p| p.id == project_id && project_allowed(access, p))
    }
}

fn project_allowed(access: &AccessScope, project: &Project) -> bool {
    match access {
        AccessScope::PropertyManager { .. } => access.allows(project),
        AccessScope::Unrestricted | AccessScope::Contractor { .. } => true,
    }
}

fn select_dated<T>(records: &[T], access: &AccessScope, query: &RecordQuery) -> Vec<T>
where
    T: Attributed + Dated + Clone,
{
    records
        .iter()
        .filter(|r| access.allows(*r) && query.matches_owner(*r))
        .filter(|r| query.period.map_or(true, |p| p.contains(r.relevant_date())))
        .cloned()
        .collect()
}

impl FinancialDataSource for InMemoryDataSource {
    fn buildings(&self, access: &AccessScope) -> Result<Vec<Building>> {
        Ok(self
            .buildings
            .iter()
            .filter(|b| access.allows_building(&b.id))
            .cloned()
            .collect())
    }

    fn projects(&self, access: &AccessScope) -> Result<Vec<Project>> {
        Ok(self
            .projects
            .iter()
            .filter(|p| project_allowed(access, p))
            .cloned()
            .collect())
    }

    fn milestones(&self, access: &AccessScope, project_id: &str) -> Result<Vec<Milestone>> {
        if !self.project_visible(access, project_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .milestones
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect())
    }

    fn risks(&self, access: &AccessScope, project_id: &str) -> Result<Vec<ProjectRisk>> {
        if !self.project_visible(access, project_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .risks
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    fn invoices(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Invoice>> {
        Ok(select_dated(&self.invoices, access, query))
    }

    fn quotations(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Quotation>> {
        Ok(select_dated(&self.quotations, access, query))
    }

    fn payment_requests(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<PaymentRequest>> {
        Ok(select_dated(&self.payment_requests, access, query))
    }

    fn orders(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Order>> {
        Ok(select_dated(&self.orders, access, query))
    }

    fn operational_expenses(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<OperationalExpense>> {
        Ok(select_dated(&self.operational_expenses, access, query))
    }

    fn alternative_revenues(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<AlternativeRevenue>> {
        Ok(select_dated(&self.alternative_revenues, access, query))
    }

    fn rent_payments(
        &self,
        access: &AccessScope,
        query: &RecordQuery,
    ) -> Result<Vec<RentPayment>> {
        Ok(select_dated(&self.rent_payments, access, query))
    }

    fn budgets(&self, access: &AccessScope, query: &RecordQuery) -> Result<Vec<Budget>> {
        Ok(self
            .budgets
            .iter()
            .filter(|b| access.allows(*b) && query.matches_owner(*b))
            .filter(|b| {
                query
                    .period
                    .map_or(true, |p| p.overlaps(b.period_start, b.period_end))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(id: &str, building: Option<&str>, contractor: Option<&str>) -> Order {
        Order {
            id: id.to_string(),
            building_id: building.map(str::to_string),
            contractor_id: contractor.map(str::to_string),
            material_cost: 10.0,
            labour_cost: 5.0,
            status: OrderStatus::Completed,
            created_at: date(2024, 3, 1),
            completed_date: Some(date(2024, 3, 3)),
        }
    }

    fn source() -> InMemoryDataSource {
        InMemoryDataSource {
            buildings: vec![
                Building {
                    id: "b1".to_string(),
                    name: "Harbour View".to_string(),
                    total_units: 10,
                    occupied_units: 7,
                },
                Building {
                    id: "b2".to_string(),
                    name: "Parkside".to_string(),
                    total_units: 4,
                    occupied_units: 4,
                },
            ],
            orders: vec![
                order("o1", Some("b1"), Some("c1")),
                order("o2", Some("b2"), Some("c2")),
                order("o3", None, Some("c1")),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_property_manager_sees_only_assigned_buildings() {
        let access = AccessScope::PropertyManager {
            building_ids: vec!["b2".to_string()],
        };
        let data = source();

        let buildings = data.buildings(&access).unwrap();
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].id, "b2");
        assert!(data.building(&access, "b1").unwrap().is_none());

        let orders = data.orders(&access, &RecordQuery::any(None)).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "o2");
    }

    #[test]
    fn test_contractor_sees_only_own_records() {
        let access = AccessScope::Contractor {
            contractor_id: "c1".to_string(),
        };
        let orders = source().orders(&access, &RecordQuery::any(None)).unwrap();
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o3"]);
    }

    #[test]
    fn test_owner_and_period_filters() {
        let data = source();
        let access = AccessScope::Unrestricted;

        let b1 = data.orders(&access, &RecordQuery::building("b1", None)).unwrap();
        assert_eq!(b1.len(), 1);

        let loose = data.orders(&access, &RecordQuery::unallocated(None)).unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].id, "o3");

        let april = DateRange::month_of(date(2024, 4, 1)).unwrap();
        let none = data
            .orders(&access, &RecordQuery::any(Some(april)))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_access_scope_wire_format() {
        let access: AccessScope =
            serde_json::from_str(r#"{ "role": "CONTRACTOR", "contractor_id": "c9" }"#).unwrap();
        assert_eq!(
            access,
            AccessScope::Contractor {
                contractor_id: "c9".to_string()
            }
        );
    }
}
