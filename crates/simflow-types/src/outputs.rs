//! Computed results written back by the compute API.
//!
//! These are the values that move a record's `result` column from null to
//! set. Money is always [`Decimal`]; it serializes as a string.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Country, Variable};

/// Output of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationResult {
    /// Country model that produced this result.
    pub country: Country,
    /// Resolved model version (never "latest").
    pub model_version: String,
    /// Per-household outputs, in input order.
    pub households: Vec<HouseholdOutput>,
    /// Weighted totals across all households.
    pub totals: SimulationTotals,
}

/// Computed variables for one household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HouseholdOutput {
    /// Household identifier from the input.
    pub id: String,
    /// Survey weight from the input.
    #[ts(as = "String")]
    pub weight: Decimal,
    /// Number of people, from the input.
    pub members: u32,
    /// Gross employment income, from the input.
    #[ts(as = "String")]
    pub employment_income: Decimal,
    /// Income tax owed.
    #[ts(as = "String")]
    pub income_tax: Decimal,
    /// Benefits received.
    #[ts(as = "String")]
    pub benefits: Decimal,
    /// Employment income minus tax plus benefits.
    #[ts(as = "String")]
    pub net_income: Decimal,
}

impl HouseholdOutput {
    /// The value of `variable` for this household.
    pub fn value(&self, variable: Variable) -> Decimal {
        match variable {
            Variable::EmploymentIncome => self.employment_income,
            Variable::IncomeTax => self.income_tax,
            Variable::Benefits => self.benefits,
            Variable::NetIncome => self.net_income,
            Variable::Members => Decimal::from(self.members),
        }
    }
}

/// Weighted totals of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationTotals {
    /// Sum of household weights.
    #[ts(as = "String")]
    pub households: Decimal,
    /// Weighted employment income.
    #[ts(as = "String")]
    pub employment_income: Decimal,
    /// Weighted income tax revenue.
    #[ts(as = "String")]
    pub income_tax: Decimal,
    /// Weighted benefit spending.
    #[ts(as = "String")]
    pub benefits: Decimal,
    /// Weighted net income.
    #[ts(as = "String")]
    pub net_income: Decimal,
}

/// Output of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AggregateOutput {
    /// The aggregated value.
    #[ts(as = "String")]
    pub value: Decimal,
}

/// Output of an aggregate change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AggregateChangeOutput {
    /// Aggregate over the baseline simulation.
    #[ts(as = "String")]
    pub baseline_value: Decimal,
    /// Aggregate over the comparison simulation.
    #[ts(as = "String")]
    pub comparison_value: Decimal,
    /// `comparison_value - baseline_value`.
    #[ts(as = "String")]
    pub change: Decimal,
    /// `change / baseline_value`; absent when the baseline is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub relative_change: Option<Decimal>,
}
