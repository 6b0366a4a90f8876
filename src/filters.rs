//! Shared period and status filters applied to every entity collection
//! before any figure is summed.

use crate::schema::*;
use crate::utils::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The date that decides whether a record falls inside a rollup window.
pub trait Dated {
    fn relevant_date(&self) -> NaiveDate;
}

/// A money movement that is either actualized or still pending.
pub trait Monetary {
    fn amount(&self) -> f64;
    fn is_actualized(&self) -> bool;
}

impl Dated for Invoice {
    fn relevant_date(&self) -> NaiveDate {
        self.paid_date.unwrap_or(self.due_date)
    }
}

impl Monetary for Invoice {
    fn amount(&self) -> f64 {
        self.total
    }

    fn is_actualized(&self) -> bool {
        self.status.is_actualized()
    }
}

impl Dated for Quotation {
    fn relevant_date(&self) -> NaiveDate {
        self.approved_date.unwrap_or(self.created_at)
    }
}

impl Monetary for Quotation {
    fn amount(&self) -> f64 {
        self.total
    }

    fn is_actualized(&self) -> bool {
        self.status.is_actualized()
    }
}

impl Dated for PaymentRequest {
    fn relevant_date(&self) -> NaiveDate {
        self.paid_date.unwrap_or(self.created_at)
    }
}

impl Monetary for PaymentRequest {
    fn amount(&self) -> f64 {
        self.calculated_amount
    }

    fn is_actualized(&self) -> bool {
        self.status.is_actualized()
    }
}

impl Dated for Order {
    fn relevant_date(&self) -> NaiveDate {
        self.completed_date.unwrap_or(self.created_at)
    }
}

impl Monetary for Order {
    fn amount(&self) -> f64 {
        self.material_cost + self.labour_cost
    }

    fn is_actualized(&self) -> bool {
        self.status.is_actualized()
    }
}

impl Dated for OperationalExpense {
    fn relevant_date(&self) -> NaiveDate {
        self.date
    }
}

impl Monetary for OperationalExpense {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn is_actualized(&self) -> bool {
        self.is_approved
    }
}

impl Dated for AlternativeRevenue {
    fn relevant_date(&self) -> NaiveDate {
        self.date
    }
}

impl Monetary for AlternativeRevenue {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn is_actualized(&self) -> bool {
        self.is_approved
    }
}

impl Dated for RentPayment {
    fn relevant_date(&self) -> NaiveDate {
        self.due_date
    }
}

impl Monetary for RentPayment {
    fn amount(&self) -> f64 {
        self.amount_paid
    }

    fn is_actualized(&self) -> bool {
        self.status.is_actualized()
    }
}

impl Dated for BudgetExpense {
    fn relevant_date(&self) -> NaiveDate {
        self.date
    }
}

impl Monetary for BudgetExpense {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn is_actualized(&self) -> bool {
        self.status.is_actualized()
    }
}

/// Actualized and pending sums of one collection inside a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoneySplit {
    pub actualized: f64,
    pub pending: f64,
}

pub fn in_period<'a, T: Dated>(
    records: &'a [T],
    period: &'a DateRange,
) -> impl Iterator<Item = &'a T> + 'a {
    records
        .iter()
        .filter(move |r| period.contains(r.relevant_date()))
}

pub fn sum_actualized<T: Dated + Monetary>(records: &[T], period: &DateRange) -> f64 {
    sum_actualized_by(records, period, T::amount)
}

/// Sums one field of the actualized records in `period`.
pub fn sum_actualized_by<T, F>(records: &[T], period: &DateRange, field: F) -> f64
where
    T: Dated + Monetary,
    F: Fn(&T) -> f64,
{
    in_period(records, period)
        .filter(|r| r.is_actualized())
        .map(field)
        .sum()
}

pub fn sum_pending<T: Dated + Monetary>(records: &[T], period: &DateRange) -> f64 {
    in_period(records, period)
        .filter(|r| !r.is_actualized())
        .map(|r| r.amount())
        .sum()
}

pub fn split<T: Dated + Monetary>(records: &[T], period: &DateRange) -> MoneySplit {
    in_period(records, period).fold(MoneySplit::default(), |mut acc, r| {
        if r.is_actualized() {
            acc.actualized += r.amount();
        } else {
            acc.pending += r.amount();
        }
        acc
    })
}

/// Lifetime sum of actualized records, ignoring dates.
pub fn sum_actualized_all<T: Monetary>(records: &[T]) -> f64 {
    records
        .iter()
        .filter(|r| r.is_actualized())
        .map(|r| r.amount())
        .sum()
}

/// Budgets count when their period shares any day with the window.
pub fn overlapping_budgets<'a>(
    budgets: &'a [Budget],
    period: &'a DateRange,
) -> impl Iterator<Item = &'a Budget> + 'a {
    budgets
        .iter()
        .filter(move |b| period.overlaps(b.period_start, b.period_end))
}

/// Milestones without dates are always attributed; dated ones when their span overlaps.
pub fn milestone_in_period(milestone: &Milestone, period: &DateRange) -> bool {
    match (milestone.start_date, milestone.due_date) {
        (None, None) => true,
        (Some(start), None) => start <= period.end,
        (None, Some(due)) => due >= period.start,
        (Some(start), Some(due)) => period.overlaps(start, due),
    }
}

/// The one day inside `period` a milestone's cost is booked on when the
/// window is split into sub-windows. Undated milestones land on the last day.
pub fn milestone_booking_date(milestone: &Milestone, period: &DateRange) -> Option<NaiveDate> {
    if !milestone_in_period(milestone, period) {
        return None;
    }
    let date = milestone
        .due_date
        .or(milestone.start_date)
        .unwrap_or(period.end);
    Some(date.clamp(period.start, period.end))
}

pub fn client_invoices(invoices: &[Invoice]) -> Vec<Invoice> {
    of_kind(invoices, InvoiceKind::Client)
}

pub fn supplier_invoices(invoices: &[Invoice]) -> Vec<Invoice> {
    of_kind(invoices, InvoiceKind::Supplier)
}

fn of_kind(invoices: &[Invoice], kind: InvoiceKind) -> Vec<Invoice> {
    invoices.iter().filter(|i| i.kind == kind).cloned().collect()
}
