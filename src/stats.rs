//! Descriptive statistics over score samples
//!
//! Percentiles use linear interpolation between nearest ranks. Standard
//! deviation is the sample (n − 1) deviation, 0 for fewer than two samples.

use serde::{Deserialize, Serialize};

/// z-score for a two-sided 95% normal interval.
pub const Z_95: f64 = 1.96;

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Sample standard deviation, `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn std_dev(samples: &[f64]) -> Option<f64> {
    let mean = mean(samples)?;
    if samples.len() < 2 {
        return Some(0.0);
    }
    let squared: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
    Some((squared / (samples.len() - 1) as f64).sqrt())
}

/// Percentile `p` (0..=100) of the samples.
///
/// # Example
///
/// ```
/// use combo_eval::stats::percentile;
///
/// let data = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile(&data, 50.0), Some(3.0));
/// assert_eq!(percentile(&data, 25.0), Some(2.0));
/// ```
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        Some(sorted[lower])
    } else {
        let fraction = rank - lower as f64;
        Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
    }
}

/// Two-sided normal-approximation confidence interval around a mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Confidence level (e.g. 0.95)
    pub level: f64,
}

impl ConfidenceInterval {
    /// 95% interval `mean ± 1.96·sd/√n`, `None` for an empty slice.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let mean = mean(samples)?;
        let sd = std_dev(samples)?;
        let margin = Z_95 * sd / (samples.len() as f64).sqrt();
        Some(Self {
            lower: mean - margin,
            upper: mean + margin,
            level: 0.95,
        })
    }

    /// Half-width of the interval.
    #[must_use]
    pub fn margin(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data).unwrap() - 5.0).abs() < 1e-12);
        // sample std dev of this set is sqrt(32/7)
        assert!((std_dev(&data).unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[3.0]), Some(0.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [10.0, 20.0, 30.0, 40.0];
        assert!((percentile(&data, 50.0).unwrap() - 25.0).abs() < 1e-12);
        assert!((percentile(&data, 25.0).unwrap() - 17.5).abs() < 1e-12);
        assert!((percentile(&data, 75.0).unwrap() - 32.5).abs() < 1e-12);
        assert_eq!(percentile(&data, 101.0), None);
    }

    #[test]
    fn test_percentile_single_element() {
        assert_eq!(percentile(&[0.7], 25.0), Some(0.7));
        assert_eq!(percentile(&[0.7], 75.0), Some(0.7));
    }

    #[test]
    fn test_confidence_interval() {
        let ci = ConfidenceInterval::from_samples(&[0.5, 0.5, 0.5]).unwrap();
        assert!((ci.lower - 0.5).abs() < 1e-12);
        assert!((ci.upper - 0.5).abs() < 1e-12);

        let wide = ConfidenceInterval::from_samples(&[0.0, 1.0]).unwrap();
        assert!(wide.lower < 0.5 && wide.upper > 0.5);
        assert!(wide.margin() > 0.0);
        assert!(ConfidenceInterval::from_samples(&[]).is_none());
    }
}
