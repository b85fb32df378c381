//! Input specifications for the three unit-of-work entities.
//!
//! A spec is stored verbatim in the record's `spec` column when the
//! creation API accepts it, and read back by the compute API. Validation
//! happens once, at creation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::{Validate, ValidationError};

use crate::enums::{AggregateFunction, Country, Variable};
use crate::ids::SimulationId;

/// Maximum number of households accepted in a single simulation spec.
pub const MAX_HOUSEHOLDS: u64 = 100_000;

/// Specification of a simulation: which model, which policy, which data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationSpec {
    /// Country whose tax-benefit model runs the simulation.
    pub country: Country,
    /// Requested model version; `None` resolves to the country's latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64))]
    pub model_version: Option<String>,
    /// Policy parameter overrides by name (reform). Empty means baseline.
    #[serde(default)]
    #[ts(type = "Record<string, string>")]
    pub policy: BTreeMap<String, Decimal>,
    /// Household microdata the model is applied to.
    #[validate(length(min = 1, max = MAX_HOUSEHOLDS), nested)]
    pub households: Vec<Household>,
}

/// One household row of microdata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct Household {
    /// Caller-supplied identifier, echoed in the output.
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    /// Survey weight: how many real households this row represents.
    #[serde(default = "default_weight")]
    #[validate(custom(function = "non_negative"))]
    #[ts(as = "String")]
    pub weight: Decimal,
    /// Annual gross employment income.
    #[validate(custom(function = "non_negative"))]
    #[ts(as = "String")]
    pub employment_income: Decimal,
    /// Number of people in the household.
    #[serde(default = "default_members")]
    #[validate(range(min = 1, max = 64))]
    pub members: u32,
}

const fn default_weight() -> Decimal {
    Decimal::ONE
}

const fn default_members() -> u32 {
    1
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

/// Restricts aggregation to households whose `variable` lies in
/// `[min, max]` (either bound optional, both inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[validate(schema(function = "ordered_bounds"))]
#[ts(export, export_to = "bindings/")]
pub struct RangeFilter {
    /// Variable the bounds apply to.
    pub variable: Variable,
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub min: Option<Decimal>,
    /// Inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub max: Option<Decimal>,
}

fn ordered_bounds(filter: &RangeFilter) -> Result<(), ValidationError> {
    match (filter.min, filter.max) {
        (Some(min), Some(max)) if min > max => Err(ValidationError::new("min_exceeds_max")),
        _ => Ok(()),
    }
}

impl RangeFilter {
    /// Whether `value` satisfies both bounds.
    pub fn contains(&self, value: Decimal) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Specification of an aggregate over one simulation's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct AggregateSpec {
    /// The simulation whose household output is aggregated.
    pub simulation_id: SimulationId,
    /// Variable to aggregate.
    pub variable: Variable,
    /// Aggregation function.
    pub function: AggregateFunction,
    /// Optional household filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub filter: Option<RangeFilter>,
}

/// Specification of the change in one aggregate between two simulations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[validate(schema(function = "distinct_simulations"))]
#[ts(export, export_to = "bindings/")]
pub struct AggregateChangeSpec {
    /// Baseline simulation.
    pub baseline_simulation_id: SimulationId,
    /// Comparison (reform) simulation.
    pub comparison_simulation_id: SimulationId,
    /// Variable to aggregate in both.
    pub variable: Variable,
    /// Aggregation function.
    pub function: AggregateFunction,
    /// Optional household filter, applied to both simulations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub filter: Option<RangeFilter>,
}

fn distinct_simulations(spec: &AggregateChangeSpec) -> Result<(), ValidationError> {
    if spec.baseline_simulation_id == spec.comparison_simulation_id {
        return Err(ValidationError::new("same_simulation"));
    }
    Ok(())
}

impl AggregateChangeSpec {
    /// The aggregate spec for one side of the comparison.
    pub fn side(&self, simulation_id: SimulationId) -> AggregateSpec {
        AggregateSpec {
            simulation_id,
            variable: self.variable,
            function: self.function,
            filter: self.filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn household(id: &str, income: Decimal) -> Household {
        Household {
            id: id.to_owned(),
            weight: Decimal::ONE,
            employment_income: income,
            members: 1,
        }
    }

    #[test]
    fn household_defaults_apply() {
        let parsed: Result<Household, _> =
            serde_json::from_str(r#"{"id":"h1","employment_income":"30000"}"#);
        let Ok(h) = parsed else {
            panic!("household should parse");
        };
        assert_eq!(h.weight, Decimal::ONE);
        assert_eq!(h.members, 1);
        assert_eq!(h.employment_income, dec!(30000));
    }

    #[test]
    fn empty_households_rejected() {
        let spec = SimulationSpec {
            country: Country::Uk,
            model_version: None,
            policy: BTreeMap::new(),
            households: Vec::new(),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn negative_income_rejected() {
        let spec = SimulationSpec {
            country: Country::Us,
            model_version: None,
            policy: BTreeMap::new(),
            households: vec![household("h1", dec!(-1))],
        };
        assert!(spec.validate().is_err());

        let ok = SimulationSpec {
            households: vec![household("h1", Decimal::ZERO)],
            ..spec
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn filter_bounds_must_be_ordered() {
        let filter = RangeFilter {
            variable: Variable::NetIncome,
            min: Some(dec!(10)),
            max: Some(dec!(5)),
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn filter_contains_is_inclusive() {
        let filter = RangeFilter {
            variable: Variable::EmploymentIncome,
            min: Some(dec!(10)),
            max: None,
        };
        assert!(filter.contains(dec!(10)));
        assert!(filter.contains(dec!(1000000)));
        assert!(!filter.contains(dec!(9.99)));
    }

    #[test]
    fn change_requires_two_distinct_simulations() {
        let id = SimulationId::new();
        let spec = AggregateChangeSpec {
            baseline_simulation_id: id,
            comparison_simulation_id: id,
            variable: Variable::IncomeTax,
            function: AggregateFunction::Sum,
            filter: None,
        };
        assert!(spec.validate().is_err());
    }
}
