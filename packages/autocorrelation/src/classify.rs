//! LISA cluster classification.

use crate::{AutocorrelationError, ClusterLabel, Inference, LocalMoran, Quadrant};

/// Conventional significance level.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Classifies one unit from its standardized value, standardized lag, and
/// p-value.
///
/// A unit is significant when `p_value <= alpha`. A value or lag of exactly
/// zero counts as low.
#[must_use]
pub fn classify(value_std: f64, lag_std: f64, p_value: f64, alpha: f64) -> ClusterLabel {
    match (p_value > alpha, value_std > 0.0, lag_std > 0.0) {
        (true, _, _) => ClusterLabel::NonSignificant,
        (false, true, true) => ClusterLabel::HighHigh,
        (false, false, false) => ClusterLabel::LowLow,
        (false, true, false) => ClusterLabel::HighLow,
        (false, false, true) => ClusterLabel::LowHigh,
    }
}

/// Moran scatterplot quadrant, with zero on the low side.
#[must_use]
pub fn quadrant(value_std: f64, lag_std: f64) -> Quadrant {
    match (value_std > 0.0, lag_std > 0.0) {
        (true, true) => Quadrant::HighHigh,
        (false, true) => Quadrant::LowHigh,
        (false, false) => Quadrant::LowLow,
        (true, false) => Quadrant::HighLow,
    }
}

/// Classifies every unit of a local result, in unit order.
///
/// Isolated units, and units without a p-value for the chosen inference,
/// get `None`.
///
/// # Errors
///
/// Returns [`AutocorrelationError::InvalidParameter`] unless
/// `0 < alpha <= 1`.
pub fn classify_all(
    local: &LocalMoran,
    inference: Inference,
    alpha: f64,
) -> Result<Vec<Option<ClusterLabel>>, AutocorrelationError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(AutocorrelationError::InvalidParameter {
            message: format!("significance level must be in (0, 1], got {alpha}"),
        });
    }

    let mut labels = vec![None; local.n];
    for stat in &local.statistics {
        labels[stat.index] = stat
            .p_for(inference)
            .map(|p| classify(stat.value_std, stat.lag_std, p, alpha));
    }

    let significant = labels.iter().flatten().filter(|l| l.is_significant()).count();
    log::info!(
        "{significant} of {} units significant at alpha = {alpha} ({inference} p-values)",
        local.statistics.len()
    );

    Ok(labels)
}
