//! Trade prioritization by dollar drift.

use crate::drift::DriftRecord;

/// Drop records whose `|drift_usd|` is below `min_order_usd` and rank the rest
/// by `|drift_usd|`, largest first.
///
/// The sort is stable, so equal magnitudes keep their input (alphabetical)
/// order. Index 0 is the highest priority; the tail is trimmed first under
/// leverage pressure. Records with a non-finite drift are dropped.
pub fn prioritize_by_drift(records: &[DriftRecord], min_order_usd: f64) -> Vec<DriftRecord> {
    let mut ranked: Vec<DriftRecord> = records
        .iter()
        .filter(|r| r.drift_usd.is_finite() && r.abs_drift_usd() >= min_order_usd)
        .cloned()
        .collect();
    ranked.sort_by(|a, b| b.abs_drift_usd().total_cmp(&a.abs_drift_usd()));
    ranked
}
