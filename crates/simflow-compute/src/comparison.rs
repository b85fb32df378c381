//! Stateless baseline-versus-reform economy comparison.
//!
//! Nothing is stored: both sides are run through the model backend and the
//! difference of their weighted totals is returned directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simflow_types::{SimulationSpec, SimulationTotals};
use ts_rs::TS;
use validator::Validate;

use crate::error::ComputeError;
use crate::service::ComputeService;

/// Body of `POST /simulate/economy/comparison`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct ComparisonRequest {
    /// Current-law side.
    #[validate(nested)]
    pub baseline: SimulationSpec,
    /// Reformed side. Must be for the same country as the baseline.
    #[validate(nested)]
    pub reform: SimulationSpec,
}

/// Weighted totals of both sides and the headline differences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ComparisonResponse {
    /// Model version the baseline ran under.
    pub model_version: String,
    /// Baseline totals.
    pub baseline: SimulationTotals,
    /// Reform totals.
    pub reform: SimulationTotals,
    /// Change in net government revenue (tax minus benefits), reform minus
    /// baseline.
    #[ts(as = "String")]
    pub budget_change: Decimal,
    /// Change in total net income, reform minus baseline.
    #[ts(as = "String")]
    pub net_income_change: Decimal,
}

/// Run both sides of `request` and compare them.
///
/// # Errors
///
/// [`ComputeError::InvalidSpec`] if the sides are for different countries
/// or a total overflows, otherwise whatever the model returns.
pub async fn compare(
    service: &ComputeService,
    request: &ComparisonRequest,
) -> Result<ComparisonResponse, ComputeError> {
    if request.baseline.country != request.reform.country {
        return Err(ComputeError::InvalidSpec(format!(
            "baseline is for {} but reform is for {}",
            request.baseline.country, request.reform.country
        )));
    }

    let (baseline, reform) = tokio::try_join!(
        service.simulate(&request.baseline),
        service.simulate(&request.reform)
    )?;

    let budget_change = revenue(&reform.totals)
        .zip(revenue(&baseline.totals))
        .and_then(|(after, before)| after.checked_sub(before))
        .ok_or_else(|| overflow("budget change"))?;
    let net_income_change = reform
        .totals
        .net_income
        .checked_sub(baseline.totals.net_income)
        .ok_or_else(|| overflow("net income change"))?;

    Ok(ComparisonResponse {
        model_version: baseline.model_version,
        baseline: baseline.totals,
        reform: reform.totals,
        budget_change,
        net_income_change,
    })
}

fn revenue(totals: &SimulationTotals) -> Option<Decimal> {
    totals.income_tax.checked_sub(totals.benefits)
}

fn overflow(what: &str) -> ComputeError {
    ComputeError::InvalidSpec(format!("{what} is out of range"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal_macros::dec;
    use simflow_core::ModelRegistry;
    use simflow_db::JobRepository;
    use simflow_types::{Country, Household};

    use super::*;
    use crate::backend::ModelBackend;

    fn service() -> ComputeService {
        ComputeService::new(
            JobRepository::memory(),
            ModelRegistry::default(),
            ModelBackend::default(),
        )
    }

    fn side(country: Country, policy: BTreeMap<String, Decimal>) -> SimulationSpec {
        SimulationSpec {
            country,
            model_version: None,
            policy,
            households: vec![Household {
                id: "h".to_owned(),
                weight: dec!(10),
                employment_income: dec!(22570),
                members: 1,
            }],
        }
    }

    #[tokio::test]
    async fn rate_rise_increases_revenue() {
        let request = ComparisonRequest {
            baseline: side(Country::Uk, BTreeMap::new()),
            reform: side(
                Country::Uk,
                BTreeMap::from([("income_tax.rate".to_owned(), dec!(0.3))]),
            ),
        };
        let Ok(response) = compare(&service(), &request).await else {
            panic!("comparison should succeed");
        };
        // 10 households × 10000 taxable × 0.1 extra rate
        assert_eq!(response.budget_change, dec!(10000));
        assert_eq!(response.net_income_change, dec!(-10000));
        assert_eq!(response.model_version, "2.22.8");
    }

    #[tokio::test]
    async fn mixed_countries_rejected() {
        let request = ComparisonRequest {
            baseline: side(Country::Uk, BTreeMap::new()),
            reform: side(Country::Us, BTreeMap::new()),
        };
        let err = compare(&service(), &request).await.err();
        assert!(matches!(err, Some(ComputeError::InvalidSpec(_))));
    }
}
