use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("cannot compute statistics of an empty array")]
    Empty,
    #[error("array contains no finite values")]
    NoFiniteValues,
    #[error("percentile {0} is outside [0, 100]")]
    InvalidPercentile(f64),
    #[error("lower percentile {lower} is above upper percentile {upper}")]
    InvertedRange { lower: f64, upper: f64 },
}

// ---------------------------------------------------------------------------
// Percentiles
// ---------------------------------------------------------------------------

/// Sort the finite values of `values` ascending, dropping NaN and infinities.
fn sorted_finite<'a>(values: impl IntoIterator<Item = &'a f64>) -> Result<Vec<f64>, StatsError> {
    let mut seen_any = false;
    let mut finite: Vec<f64> = values
        .into_iter()
        .inspect(|_| seen_any = true)
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if !seen_any {
        return Err(StatsError::Empty);
    }
    if finite.is_empty() {
        return Err(StatsError::NoFiniteValues);
    }
    finite.sort_by(f64::total_cmp);
    Ok(finite)
}

/// Percentile `q` (0–100) of an already sorted, non-empty slice using linear
/// interpolation between the two closest ranks.
fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn check_percentile(q: f64) -> Result<(), StatsError> {
    if (0.0..=100.0).contains(&q) {
        Ok(())
    } else {
        Err(StatsError::InvalidPercentile(q))
    }
}

/// The `q`-th percentile (0–100) of the finite values, linearly interpolated.
pub fn percentile<'a>(values: impl IntoIterator<Item = &'a f64>, q: f64) -> Result<f64, StatsError> {
    check_percentile(q)?;
    let sorted = sorted_finite(values)?;
    Ok(percentile_of_sorted(&sorted, q))
}

// ---------------------------------------------------------------------------
// Display range
// ---------------------------------------------------------------------------

/// Intensity bounds used to stretch an image for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub vmin: f64,
    pub vmax: f64,
}

impl DisplayRange {
    /// Map `value` into `[0, 1]`, clamping values outside the range.
    /// A zero-width range maps everything to 0.
    pub fn scale(&self, value: f64) -> f32 {
        let width = self.vmax - self.vmin;
        if !value.is_finite() || width <= 0.0 {
            return 0.0;
        }
        ((value - self.vmin) / width).clamp(0.0, 1.0) as f32
    }
}

/// Compute display bounds as the `lower`/`upper` percentiles of `values`.
///
/// Sorting happens once for both bounds.
pub fn display_range<'a>(
    values: impl IntoIterator<Item = &'a f64>,
    lower: f64,
    upper: f64,
) -> Result<DisplayRange, StatsError> {
    check_percentile(lower)?;
    check_percentile(upper)?;
    if lower > upper {
        return Err(StatsError::InvertedRange { lower, upper });
    }
    let sorted = sorted_finite(values)?;
    Ok(DisplayRange {
        vmin: percentile_of_sorted(&sorted, lower),
        vmax: percentile_of_sorted(&sorted, upper),
    })
}

// ---------------------------------------------------------------------------
// Flux normalisation
// ---------------------------------------------------------------------------

/// Median of the finite values, ignoring NaN.
pub fn nan_median(values: &[f64]) -> Result<f64, StatsError> {
    let sorted = sorted_finite(values)?;
    Ok(percentile_of_sorted(&sorted, 50.0))
}

/// Divide a flux series by its NaN-median and add `offset`, so several series
/// can be stacked on one axis. NaN cadences stay NaN.
pub fn normalize(values: &[f64], offset: f64) -> Result<Vec<f64>, StatsError> {
    let median = nan_median(values)?;
    Ok(values.iter().map(|v| v / median + offset).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ramp_percentiles_match_linear_interpolation() {
        let ramp: Vec<f64> = (1..=100).map(f64::from).collect();
        let range = display_range(&ramp, 4.0, 98.0).unwrap();
        assert_relative_eq!(range.vmin, 4.96, epsilon = 1e-9);
        assert_relative_eq!(range.vmax, 98.02, epsilon = 1e-9);
    }

    #[test]
    fn test_percentile_ignores_input_order() {
        let values = [9.0, 1.0, 5.0, 3.0, 7.0];
        assert_relative_eq!(percentile(&values, 50.0).unwrap(), 5.0);
        assert_relative_eq!(percentile(&values, 25.0).unwrap(), 3.0);
        assert_relative_eq!(percentile(&values, 10.0).unwrap(), 1.8, epsilon = 1e-12);
        assert_relative_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&values, 100.0).unwrap(), 9.0);
    }

    #[test]
    fn test_constant_array_collapses_range() {
        let values = vec![42.5; 37];
        let range = display_range(&values, 4.0, 98.0).unwrap();
        assert_eq!(range.vmin, 42.5);
        assert_eq!(range.vmax, 42.5);
        assert_eq!(range.scale(42.5), 0.0);
    }

    #[test]
    fn test_lower_never_exceeds_upper() {
        let samples: [&[f64]; 4] = [
            &[3.0],
            &[-1.0, 1.0],
            &[1e9, -1e9, 0.0, 12.0, 12.0],
            &[0.5, 0.25, 0.125, 0.0625, 100.0, -3.0],
        ];
        for values in samples {
            let range = display_range(values, 4.0, 98.0).unwrap();
            assert!(range.vmin <= range.vmax, "{values:?} gave {range:?}");
        }
    }

    #[test]
    fn test_nan_pixels_are_skipped() {
        let values = [f64::NAN, 1.0, 2.0, f64::NAN, 3.0];
        assert_relative_eq!(percentile(&values, 50.0).unwrap(), 2.0);
    }

    #[test]
    fn test_degenerate_inputs_are_errors() {
        let empty: [f64; 0] = [];
        assert_eq!(display_range(&empty, 4.0, 98.0), Err(StatsError::Empty));
        assert_eq!(
            display_range(&[f64::NAN, f64::NAN], 4.0, 98.0),
            Err(StatsError::NoFiniteValues)
        );
        assert_eq!(
            percentile(&[1.0], 101.0),
            Err(StatsError::InvalidPercentile(101.0))
        );
        assert!(matches!(
            display_range(&[1.0, 2.0], 98.0, 4.0),
            Err(StatsError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_scale_clamps_to_unit_interval() {
        let range = DisplayRange { vmin: 10.0, vmax: 20.0 };
        assert_eq!(range.scale(5.0), 0.0);
        assert_relative_eq!(range.scale(15.0), 0.5);
        assert_eq!(range.scale(25.0), 1.0);
        assert_eq!(range.scale(f64::NAN), 0.0);
    }

    #[test]
    fn test_normalize_divides_by_nan_median() {
        let flux = [100.0, f64::NAN, 300.0, 200.0];
        let normalized = normalize(&flux, 0.06).unwrap();
        assert_relative_eq!(normalized[0], 0.56, epsilon = 1e-12);
        assert!(normalized[1].is_nan());
        assert_relative_eq!(normalized[2], 1.56, epsilon = 1e-12);
        assert_relative_eq!(normalized[3], 1.06, epsilon = 1e-12);
    }
}
