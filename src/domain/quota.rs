use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoEnumIterator, IntoStaticStr};
use utoipa::ToSchema;

use crate::domain::period::Period;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};

/// Window over which approved leave is debited.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum QuotaPeriod {
    #[default]
    Annual,
    Monthly,
}

/// Allowance in days per leave type. Types missing from the table have no quota.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveAllocation {
    totals: BTreeMap<LeaveType, f64>,
}

impl Default for LeaveAllocation {
    fn default() -> Self {
        let totals = BTreeMap::from([
            (LeaveType::Casual, 1.0),
            (LeaveType::Sick, 2.0),
            (LeaveType::Earned, 0.0),
            (LeaveType::WorkFromHome, 4.0),
            (LeaveType::Maternity, 0.0),
            (LeaveType::Paternity, 0.0),
        ]);
        Self { totals }
    }
}

impl LeaveAllocation {
    pub fn with_total(mut self, leave_type: LeaveType, total: f64) -> Self {
        if leave_type.has_quota() {
            self.totals.insert(leave_type, total.max(0.0));
        }
        self
    }

    pub fn total_for(&self, leave_type: LeaveType) -> Option<f64> {
        self.totals.get(&leave_type).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct LeaveBalance {
    pub total: f64,
    pub used: f64,
    pub remaining: f64,
}

impl LeaveBalance {
    pub fn new(total: f64, used: f64) -> Self {
        Self {
            total,
            used,
            remaining: (total - used).max(0.0),
        }
    }
}

/// Debit for one request inside `period`: overlapping days times duration weight.
pub fn debited_days(request: &LeaveRequest, period: &Period) -> f64 {
    period
        .intersect(request.start_date, request.end_date)
        .map(|overlap| overlap.len_days() as f64 * request.leave_duration.weight())
        .unwrap_or(0.0)
}

/// Balances for every allocated leave type. Only approved requests count.
pub fn compute_quotas(
    allocation: &LeaveAllocation,
    requests: &[LeaveRequest],
    period: &Period,
) -> BTreeMap<LeaveType, LeaveBalance> {
    LeaveType::iter()
        .filter_map(|leave_type| {
            let total = allocation.total_for(leave_type)?;
            let used: f64 = requests
                .iter()
                .filter(|r| r.status == LeaveStatus::Approved && r.leave_type == leave_type)
                .map(|r| debited_days(r, period))
                .sum();
            Some((leave_type, LeaveBalance::new(total, used)))
        })
        .collect()
}

/// Distinct days inside `period` covered by approved leave, ascending.
pub fn leave_days(requests: &[LeaveRequest], period: &Period) -> Vec<NaiveDate> {
    requests
        .iter()
        .filter(|r| r.status == LeaveStatus::Approved)
        .filter_map(|r| period.intersect(r.start_date, r.end_date))
        .flat_map(|overlap| overlap.days().collect::<Vec<_>>())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
