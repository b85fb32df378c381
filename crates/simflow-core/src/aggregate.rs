//! Weighted aggregation over simulation output.

use rust_decimal::Decimal;
use simflow_types::{
    AggregateChangeOutput, AggregateFunction, AggregateOutput, RangeFilter, SimulationResult,
    Variable,
};

use crate::error::ModelError;

/// Decimal places a mean or relative change is rounded to.
const RATIO_DP: u32 = 6;

/// Aggregate `variable` over the households of `result` that pass `filter`.
///
/// - `Sum`: `Σ weight × value`
/// - `Mean`: `Σ weight × value / Σ weight`, zero when no weight remains
/// - `Count`: `Σ weight`
///
/// # Errors
///
/// [`ModelError::Overflow`] if a partial sum or the mean leaves the decimal
/// range.
pub fn aggregate(
    result: &SimulationResult,
    variable: Variable,
    function: AggregateFunction,
    filter: Option<&RangeFilter>,
) -> Result<AggregateOutput, ModelError> {
    let (weight_sum, weighted_sum) = result
        .households
        .iter()
        .filter(|h| filter.is_none_or(|f| f.contains(h.value(f.variable))))
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(weights, total), h| {
            let weights = weights
                .checked_add(h.weight)
                .ok_or(ModelError::Overflow("weight sum"))?;
            let total = h
                .weight
                .checked_mul(h.value(variable))
                .and_then(|v| total.checked_add(v))
                .ok_or(ModelError::Overflow("weighted sum"))?;
            Ok::<_, ModelError>((weights, total))
        })?;

    let value = match function {
        AggregateFunction::Sum => weighted_sum,
        AggregateFunction::Count => weight_sum,
        AggregateFunction::Mean if weight_sum.is_zero() => Decimal::ZERO,
        AggregateFunction::Mean => weighted_sum
            .checked_div(weight_sum)
            .ok_or(ModelError::Overflow("mean"))?
            .round_dp(RATIO_DP)
            .normalize(),
    };

    Ok(AggregateOutput { value })
}

/// Combine the two sides of an aggregate change.
///
/// # Errors
///
/// [`ModelError::Overflow`] if the difference leaves the decimal range.
pub fn aggregate_change(
    baseline: &AggregateOutput,
    comparison: &AggregateOutput,
) -> Result<AggregateChangeOutput, ModelError> {
    let change = comparison
        .value
        .checked_sub(baseline.value)
        .ok_or(ModelError::Overflow("aggregate change"))?;

    let relative_change = if baseline.value.is_zero() {
        None
    } else {
        change
            .checked_div(baseline.value)
            .map(|ratio| ratio.round_dp(RATIO_DP).normalize())
    };

    Ok(AggregateChangeOutput {
        baseline_value: baseline.value,
        comparison_value: comparison.value,
        change,
        relative_change,
    })
}
