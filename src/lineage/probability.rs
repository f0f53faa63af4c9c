//! Probability helpers shared by propagation and investigation

/// Probability that at least one of two independent events occurs
pub fn union(a: f64, b: f64) -> f64 {
    a + b - a * b
}

/// Floor applied to path probabilities before taking logs
pub const LOG_FLOOR: f64 = 1e-10;

/// Geometric mean of probabilities, each floored at [`LOG_FLOOR`]
///
/// Returns 0.0 for an empty slice.
pub fn geometric_mean(probabilities: &[f64]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let log_sum: f64 = probabilities.iter().map(|p| p.max(LOG_FLOOR).ln()).sum();
    (log_sum / probabilities.len() as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_dominates_both_inputs() {
        let grid = [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0];
        for &a in &grid {
            for &b in &grid {
                let u = union(a, b);
                assert!(u >= a.max(b) - 1e-12, "union({a}, {b}) = {u}");
                assert!(u <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn union_with_zero_is_identity() {
        for &a in &[0.0, 0.3, 0.7, 1.0] {
            assert_eq!(union(a, 0.0), a);
        }
    }

    #[test]
    fn union_with_certainty_is_certain() {
        assert_eq!(union(0.2, 1.0), 1.0);
    }

    #[test]
    fn geometric_mean_of_equal_values() {
        let gm = geometric_mean(&[0.5, 0.5, 0.5]);
        assert!((gm - 0.5).abs() < 1e-12);
    }

    #[test]
    fn geometric_mean_floors_zero() {
        let gm = geometric_mean(&[0.0]);
        assert!((gm - LOG_FLOOR).abs() < 1e-20);
    }

    #[test]
    fn geometric_mean_of_nothing_is_zero() {
        assert_eq!(geometric_mean(&[]), 0.0);
    }
}
