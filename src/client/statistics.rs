//! Pure reductions over sample sequences
//!
//! Every function returns `None` for an empty slice. Mean and variance use
//! Welford's single-pass update so long series of large values do not lose
//! precision to a running sum.

/// Running mean and sum of squared deviations
fn welford(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }

    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (i, &x) in samples.iter().enumerate() {
        let delta = x - mean;
        mean += delta / (i + 1) as f64;
        m2 += delta * (x - mean);
    }
    Some((mean, m2))
}

/// Arithmetic mean
pub fn mean(samples: &[f64]) -> Option<f64> {
    welford(samples).map(|(mean, _)| mean)
}

/// Population variance (divides by `n`)
pub fn population_variance(samples: &[f64]) -> Option<f64> {
    welford(samples).map(|(_, m2)| (m2 / samples.len() as f64).max(0.0))
}

/// Population variance about a caller-supplied center instead of the mean
pub fn variance_about(samples: &[f64], center: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum_sq: f64 = samples.iter().map(|&x| (x - center).powi(2)).sum();
    Some(sum_sq / samples.len() as f64)
}

/// Population standard deviation
pub fn standard_deviation(samples: &[f64]) -> Option<f64> {
    population_variance(samples).map(f64::sqrt)
}

/// Smallest and largest sample, in that order
pub fn min_max(samples: &[f64]) -> Option<(f64, f64)> {
    let first = *samples.first()?;
    Some(
        samples
            .iter()
            .fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value for non-empty input");
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_statistics_calculation() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];

        assert_close(mean(&samples), 5.0);
        assert_close(population_variance(&samples), 4.0);
        assert_close(standard_deviation(&samples), 2.0);
        assert_eq!(min_max(&samples), Some((2.0, 9.0)));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(mean(&[]), None);
        assert_eq!(population_variance(&[]), None);
        assert_eq!(variance_about(&[], 1.0), None);
        assert_eq!(standard_deviation(&[]), None);
        assert_eq!(min_max(&[]), None);
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(mean(&[42.0]), Some(42.0));
        assert_eq!(standard_deviation(&[42.0]), Some(0.0));
        assert_eq!(min_max(&[42.0]), Some((42.0, 42.0)));
    }

    #[test]
    fn test_variance_about_center() {
        let samples = [1.0, 2.0];
        // mean is 1.5, a truncated center of 1.0 inflates the spread
        assert_eq!(variance_about(&samples, 1.5), Some(0.25));
        assert_eq!(variance_about(&samples, 1.0), Some(0.5));
    }

    #[test]
    fn test_large_offset_is_stable() {
        let base = 1.0e9;
        let samples: Vec<f64> = [4.0, 7.0, 13.0, 16.0].iter().map(|x| base + x).collect();
        let variance = population_variance(&samples).unwrap();
        assert!((variance - 22.5).abs() < 1e-6, "variance = {}", variance);
    }
}
