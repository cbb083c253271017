//! Percentile and weighted-average-life helpers shared by the Monte Carlo
//! aggregation step (§4.5).

/// The five percentiles the result objects carry (§3).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Linear-interpolation percentile on a **sorted** slice (§4.5, grounded on
/// the same formula used for generic corporate-finance Monte Carlo
/// summaries). Empty input is a [`crate::error::ValuationError::NumericError`]
/// at the call site, not here — this helper assumes a non-empty slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Computes {p5, p25, p50, p75, p95} on `values`, sorting a local copy.
pub fn percentiles_of(values: &[f64]) -> Percentiles {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Percentiles {
        p5: percentile_sorted(&sorted, 5.0),
        p25: percentile_sorted(&sorted, 25.0),
        p50: percentile_sorted(&sorted, 50.0),
        p75: percentile_sorted(&sorted, 75.0),
        p95: percentile_sorted(&sorted, 95.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_ordering_holds() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let p = percentiles_of(&values);
        assert!(p.p5 <= p.p25);
        assert!(p.p25 <= p.p50);
        assert!(p.p50 <= p.p75);
        assert!(p.p75 <= p.p95);
    }

    #[test]
    fn test_percentile_single_value() {
        let p = percentiles_of(&[42.0]);
        assert_eq!(p.p5, 42.0);
        assert_eq!(p.p95, 42.0);
    }

    #[test]
    fn test_percentile_median_of_evens() {
        let p = percentiles_of(&[1.0, 2.0, 3.0, 4.0]);
        assert!((p.p50 - 2.5).abs() < 1e-9);
    }
}
