use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    NotStarted,
    InProgress,
    Completed,
    Delayed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn is_actualized(self) -> bool {
        self == Self::Paid
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceKind {
    #[schemars(description = "Billed to a client; a paid client invoice is revenue")]
    Client,

    #[schemars(description = "Billed by a contractor or supplier; a paid supplier invoice is cost")]
    Supplier,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl QuotationStatus {
    pub fn is_actualized(self) -> bool {
        self == Self::Approved
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentRequestStatus {
    Pending,
    Paid,
    Rejected,
}

impl PaymentRequestStatus {
    pub fn is_actualized(self) -> bool {
        self == Self::Paid
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_actualized(self) -> bool {
        self == Self::Completed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentPaymentStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl RentPaymentStatus {
    pub fn is_actualized(self) -> bool {
        matches!(self, Self::Paid | Self::PartiallyPaid)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl ExpenseStatus {
    pub fn is_actualized(self) -> bool {
        matches!(self, Self::Approved | Self::Paid)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Open,
    Mitigated,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: String,
    pub name: String,
    pub total_units: u32,
    pub occupied_units: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub building_id: Option<String>,
    pub estimated_budget: f64,
    #[schemars(description = "Derived by the cost recompute; never edited by hand")]
    pub actual_cost: f64,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub budget_allocated: f64,
    pub actual_cost: f64,
    pub expected_profit: f64,
    pub status: MilestoneStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRisk {
    pub id: String,
    pub project_id: String,
    pub severity: RiskSeverity,
    pub status: RiskStatus,
}

impl ProjectRisk {
    pub fn is_open_high(&self) -> bool {
        self.status == RiskStatus::Open && self.severity >= RiskSeverity::High
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub kind: InvoiceKind,
    pub project_id: Option<String>,
    pub building_id: Option<String>,
    pub contractor_id: Option<String>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub id: String,
    pub project_id: Option<String>,
    pub building_id: Option<String>,
    pub contractor_id: Option<String>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub status: QuotationStatus,
    pub created_at: NaiveDate,
    pub approved_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: String,
    pub project_id: Option<String>,
    pub building_id: Option<String>,
    #[schemars(description = "Artisan or contractor claiming the labour payment")]
    pub contractor_id: Option<String>,
    pub calculated_amount: f64,
    pub status: PaymentRequestStatus,
    pub created_at: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub building_id: Option<String>,
    pub contractor_id: Option<String>,
    pub material_cost: f64,
    pub labour_cost: f64,
    pub status: OrderStatus,
    pub created_at: NaiveDate,
    pub completed_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationalExpense {
    pub id: String,
    pub building_id: Option<String>,
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeRevenue {
    pub id: String,
    pub building_id: Option<String>,
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RentPayment {
    pub id: String,
    pub building_id: String,
    pub unit_id: Option<String>,
    #[schemars(description = "Amount due for the rent period")]
    pub amount: f64,
    pub amount_paid: f64,
    pub status: RentPaymentStatus,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

impl RentPayment {
    /// What is still owed on this row. Only actualized payments reduce it,
    /// and an overpayment never offsets another tenant's arrears.
    pub fn outstanding(&self) -> f64 {
        let received = if self.status.is_actualized() {
            self.amount_paid
        } else {
            0.0
        };
        (self.amount - received).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetExpense {
    pub id: String,
    pub amount: f64,
    pub category: String,
    pub status: ExpenseStatus,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub building_id: String,
    pub total_budget: f64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[serde(default)]
    pub expenses: Vec<BudgetExpense>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actualized_status_sets() {
        assert!(InvoiceStatus::Paid.is_actualized());
        assert!(!InvoiceStatus::Draft.is_actualized());
        assert!(!InvoiceStatus::Sent.is_actualized());
        assert!(QuotationStatus::Approved.is_actualized());
        assert!(!QuotationStatus::Draft.is_actualized());
        assert!(PaymentRequestStatus::Paid.is_actualized());
        assert!(!PaymentRequestStatus::Pending.is_actualized());
        assert!(OrderStatus::Completed.is_actualized());
        assert!(!OrderStatus::InProgress.is_actualized());
        assert!(RentPaymentStatus::PartiallyPaid.is_actualized());
        assert!(!RentPaymentStatus::Overdue.is_actualized());
        assert!(ExpenseStatus::Approved.is_actualized());
        assert!(!ExpenseStatus::Pending.is_actualized());
    }

    #[test]
    fn test_high_risk_requires_open_status() {
        let mut risk = ProjectRisk {
            id: "r1".to_string(),
            project_id: "p1".to_string(),
            severity: RiskSeverity::Critical,
            status: RiskStatus::Open,
        };
        assert!(risk.is_open_high());

        risk.status = RiskStatus::Mitigated;
        assert!(!risk.is_open_high());

        risk.status = RiskStatus::Open;
        risk.severity = RiskSeverity::Medium;
        assert!(!risk.is_open_high());
    }

    #[test]
    fn test_wire_format_uses_upper_case_statuses() {
        let json = r#"{
            "id": "inv-1",
            "kind": "CLIENT",
            "projectId": "p1",
            "buildingId": null,
            "contractorId": null,
            "subtotal": 100.0,
            "tax": 15.0,
            "total": 115.0,
            "status": "PAID",
            "dueDate": "2024-03-01",
            "paidDate": "2024-03-05"
        }"#;

        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.kind, InvoiceKind::Client);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.paid_date, NaiveDate::from_ymd_opt(2024, 3, 5));
    }
}
