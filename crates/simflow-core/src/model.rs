//! Reference flat tax-benefit model.
//!
//! Each household pays a flat rate on income above a personal allowance and
//! receives a per-member benefit that is withdrawn at a taper rate on the
//! same taxable income:
//!
//! ```text
//! taxable  = max(0, income - allowance)
//! tax      = round2(taxable * rate)
//! benefit  = round2(max(0, basic_amount * members - taxable * taper_rate))
//! net      = income - tax + benefit
//! ```
//!
//! The model is deterministic: the same spec and version always produce the
//! same result, which is what lets the compute API be re-run safely.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use simflow_types::{
    Country, Household, HouseholdOutput, SimulationResult, SimulationSpec, SimulationTotals,
};

use crate::error::ModelError;

/// Parameter name: marginal income tax rate, in `[0, 1]`.
pub const INCOME_TAX_RATE: &str = "income_tax.rate";
/// Parameter name: income exempt from tax.
pub const PERSONAL_ALLOWANCE: &str = "income_tax.personal_allowance";
/// Parameter name: benefit per household member before withdrawal.
pub const BENEFIT_BASIC_AMOUNT: &str = "benefit.basic_amount";
/// Parameter name: benefit withdrawal rate on taxable income, in `[0, 1]`.
pub const BENEFIT_TAPER_RATE: &str = "benefit.taper_rate";

/// Decimal places money values are rounded to.
const MONEY_DP: u32 = 2;

/// The full parameter set of the reference model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyParameters {
    /// Flat income tax rate.
    pub income_tax_rate: Decimal,
    /// Income exempt from tax.
    pub personal_allowance: Decimal,
    /// Benefit per household member.
    pub benefit_basic_amount: Decimal,
    /// Benefit withdrawal rate.
    pub benefit_taper_rate: Decimal,
}

impl PolicyParameters {
    /// Current-law parameters for `country`.
    pub fn baseline(country: Country) -> Self {
        let personal_allowance = match country {
            Country::Us => Decimal::from(14_600),
            Country::Uk => Decimal::from(12_570),
        };
        Self {
            income_tax_rate: Decimal::new(20, 2),
            personal_allowance,
            benefit_basic_amount: Decimal::ZERO,
            benefit_taper_rate: Decimal::ZERO,
        }
    }

    /// Baseline parameters with `overrides` applied.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownParameter`] for a name the model does not have,
    /// [`ModelError::InvalidParameter`] for a negative amount or a rate
    /// outside `[0, 1]`.
    pub fn with_overrides(
        country: Country,
        overrides: &BTreeMap<String, Decimal>,
    ) -> Result<Self, ModelError> {
        let mut params = Self::baseline(country);
        for (name, value) in overrides {
            let value = *value;
            match name.as_str() {
                INCOME_TAX_RATE => params.income_tax_rate = check_rate(name, value)?,
                PERSONAL_ALLOWANCE => params.personal_allowance = check_amount(name, value)?,
                BENEFIT_BASIC_AMOUNT => params.benefit_basic_amount = check_amount(name, value)?,
                BENEFIT_TAPER_RATE => params.benefit_taper_rate = check_rate(name, value)?,
                other => return Err(ModelError::UnknownParameter(other.to_owned())),
            }
        }
        Ok(params)
    }
}

fn check_rate(name: &str, value: Decimal) -> Result<Decimal, ModelError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ModelError::InvalidParameter {
            name: name.to_owned(),
            reason: format!("rate {value} is outside [0, 1]"),
        });
    }
    Ok(value)
}

fn check_amount(name: &str, value: Decimal) -> Result<Decimal, ModelError> {
    if value < Decimal::ZERO {
        return Err(ModelError::InvalidParameter {
            name: name.to_owned(),
            reason: format!("amount {value} is negative"),
        });
    }
    Ok(value)
}

/// The in-process model used by the compute API's reference backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceModel;

impl ReferenceModel {
    /// Create the model.
    pub const fn new() -> Self {
        Self
    }

    /// Run the model over every household in `spec`.
    ///
    /// `version` is the already-resolved model version; it is recorded in
    /// the result but does not change the arithmetic.
    ///
    /// # Errors
    ///
    /// Any [`ModelError`] from parameter validation, or
    /// [`ModelError::Overflow`] if a value leaves the decimal range.
    pub fn simulate(
        &self,
        spec: &SimulationSpec,
        version: &str,
    ) -> Result<SimulationResult, ModelError> {
        let params = PolicyParameters::with_overrides(spec.country, &spec.policy)?;

        let households = spec
            .households
            .iter()
            .map(|household| compute_household(&params, household))
            .collect::<Result<Vec<_>, _>>()?;

        let totals = weighted_totals(&households)?;

        Ok(SimulationResult {
            country: spec.country,
            model_version: version.to_owned(),
            households,
            totals,
        })
    }
}

fn compute_household(
    params: &PolicyParameters,
    household: &Household,
) -> Result<HouseholdOutput, ModelError> {
    let income = household.employment_income;

    let taxable = income
        .checked_sub(params.personal_allowance)
        .ok_or(ModelError::Overflow("taxable income"))?
        .max(Decimal::ZERO);

    let income_tax = taxable
        .checked_mul(params.income_tax_rate)
        .ok_or(ModelError::Overflow("income tax"))?
        .round_dp(MONEY_DP);

    let entitlement = params
        .benefit_basic_amount
        .checked_mul(Decimal::from(household.members))
        .ok_or(ModelError::Overflow("benefit entitlement"))?;
    let withdrawal = taxable
        .checked_mul(params.benefit_taper_rate)
        .ok_or(ModelError::Overflow("benefit withdrawal"))?;
    let benefits = entitlement
        .checked_sub(withdrawal)
        .ok_or(ModelError::Overflow("benefits"))?
        .max(Decimal::ZERO)
        .round_dp(MONEY_DP);

    let net_income = income
        .checked_sub(income_tax)
        .and_then(|v| v.checked_add(benefits))
        .ok_or(ModelError::Overflow("net income"))?;

    Ok(HouseholdOutput {
        id: household.id.clone(),
        weight: household.weight,
        members: household.members,
        employment_income: income,
        income_tax,
        benefits,
        net_income,
    })
}

fn weighted_totals(households: &[HouseholdOutput]) -> Result<SimulationTotals, ModelError> {
    households
        .iter()
        .try_fold(SimulationTotals::default(), |acc, h| {
            Ok(SimulationTotals {
                households: add(acc.households, h.weight, "household count")?,
                employment_income: add_weighted(
                    acc.employment_income,
                    h.weight,
                    h.employment_income,
                )?,
                income_tax: add_weighted(acc.income_tax, h.weight, h.income_tax)?,
                benefits: add_weighted(acc.benefits, h.weight, h.benefits)?,
                net_income: add_weighted(acc.net_income, h.weight, h.net_income)?,
            })
        })
}

fn add(acc: Decimal, value: Decimal, what: &'static str) -> Result<Decimal, ModelError> {
    acc.checked_add(value).ok_or(ModelError::Overflow(what))
}

fn add_weighted(acc: Decimal, weight: Decimal, value: Decimal) -> Result<Decimal, ModelError> {
    weight
        .checked_mul(value)
        .and_then(|v| acc.checked_add(v))
        .ok_or(ModelError::Overflow("weighted total"))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn household(id: &str, income: Decimal, members: u32) -> Household {
        Household {
            id: id.to_owned(),
            weight: Decimal::ONE,
            employment_income: income,
            members,
        }
    }

    fn spec(country: Country, households: Vec<Household>) -> SimulationSpec {
        SimulationSpec {
            country,
            model_version: None,
            policy: BTreeMap::new(),
            households,
        }
    }

    #[test]
    fn baseline_uk_household() {
        let spec = spec(Country::Uk, vec![household("h1", dec!(30000), 1)]);
        let result = ReferenceModel::new().simulate(&spec, "2.22.8");
        let Ok(result) = result else {
            panic!("simulation should succeed");
        };

        assert_eq!(result.model_version, "2.22.8");
        let h = &result.households[0];
        // (30000 - 12570) * 0.20
        assert_eq!(h.income_tax, dec!(3486.00));
        assert_eq!(h.benefits, dec!(0));
        assert_eq!(h.net_income, dec!(26514.00));
    }

    #[test]
    fn income_below_allowance_pays_no_tax() {
        let spec = spec(Country::Us, vec![household("h1", dec!(10000), 2)]);
        let result = ReferenceModel::new().simulate(&spec, "1.370.2");
        assert_eq!(
            result.ok().map(|r| r.households[0].income_tax),
            Some(dec!(0))
        );
    }

    #[test]
    fn reform_benefit_is_tapered_and_floored() {
        let mut spec = spec(
            Country::Uk,
            vec![
                household("low", dec!(12570), 2),
                household("high", dec!(112570), 1),
            ],
        );
        spec.policy.insert(BENEFIT_BASIC_AMOUNT.to_owned(), dec!(1000));
        spec.policy.insert(BENEFIT_TAPER_RATE.to_owned(), dec!(0.5));

        let Ok(result) = ReferenceModel::new().simulate(&spec, "2.22.8") else {
            panic!("simulation should succeed");
        };

        assert_eq!(result.households[0].benefits, dec!(2000));
        assert_eq!(result.households[1].benefits, dec!(0));
        assert_eq!(result.totals.benefits, dec!(2000));
    }

    #[test]
    fn totals_are_weighted() {
        let mut heavy = household("h1", dec!(22570), 1);
        heavy.weight = dec!(2.5);
        let spec = spec(Country::Uk, vec![heavy, household("h2", dec!(0), 1)]);

        let Ok(result) = ReferenceModel::new().simulate(&spec, "2.22.8") else {
            panic!("simulation should succeed");
        };

        assert_eq!(result.totals.households, dec!(3.5));
        // 10000 * 0.2 * 2.5
        assert_eq!(result.totals.income_tax, dec!(5000.000));
    }

    #[test]
    fn simulation_is_deterministic() {
        let spec = spec(Country::Us, vec![household("h1", dec!(55123.45), 3)]);
        let model = ReferenceModel::new();
        assert_eq!(
            model.simulate(&spec, "1.370.2"),
            model.simulate(&spec, "1.370.2")
        );
    }

    #[test]
    fn unknown_parameter_rejected() {
        let mut spec = spec(Country::Us, vec![household("h1", dec!(1), 1)]);
        spec.policy.insert("vat.rate".to_owned(), dec!(0.2));
        assert_eq!(
            ReferenceModel::new().simulate(&spec, "1.370.2"),
            Err(ModelError::UnknownParameter("vat.rate".to_owned()))
        );
    }

    #[test]
    fn out_of_range_rate_rejected() {
        let overrides = BTreeMap::from([(INCOME_TAX_RATE.to_owned(), dec!(1.5))]);
        assert!(matches!(
            PolicyParameters::with_overrides(Country::Uk, &overrides),
            Err(ModelError::InvalidParameter { .. })
        ));
    }
}
