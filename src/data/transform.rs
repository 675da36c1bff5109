use ndarray::Array2;

// ---------------------------------------------------------------------------
// Input transforms applied after a catalog is fully read
// ---------------------------------------------------------------------------

/// Per-feature transform selected by `TRANSFORM_INPUTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTransform {
    None,
    FluxToLuptitude,
}

impl InputTransform {
    /// Map a selector spelling; `None` for anything outside the closed set.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "" | "none" | "no" => Some(InputTransform::None),
            "flux_to_luptitude" => Some(InputTransform::FluxToLuptitude),
            _ => None,
        }
    }

    pub fn apply(self, input: &mut Array2<f64>, input_error: Option<&mut Array2<f64>>) {
        match self {
            InputTransform::None => {}
            InputTransform::FluxToLuptitude => flux_to_luptitude(input, input_error),
        }
    }
}

/// Convert fluxes to asinh magnitudes ("luptitudes").
///
/// For each column the softening scale `b` is the median of the finite
/// errors, or of the finite positive fluxes when there are no errors. Then
/// `x = f / 2b`, `σ' = 2.5/ln10 · σ / sqrt(1 + x²) / 2b` and
/// `μ = -2.5/ln10 · (asinh(x) + ln b)`. NaN cells stay NaN.
pub fn flux_to_luptitude(input: &mut Array2<f64>, mut input_error: Option<&mut Array2<f64>>) {
    let pogson = 2.5 / std::f64::consts::LN_10;

    for j in 0..input.ncols() {
        let scale = match input_error.as_deref() {
            Some(errors) => median(errors.column(j).iter().copied().filter(|v| v.is_finite())),
            None => median(
                input
                    .column(j)
                    .iter()
                    .copied()
                    .filter(|v| v.is_finite() && *v > 0.0),
            ),
        };

        if !(scale.is_finite() && scale > 0.0) {
            log::warn!("feature {j}: no usable values to set the luptitude scale, column will be flagged");
        }

        for i in 0..input.nrows() {
            let x = input[[i, j]] / (2.0 * scale);
            if let Some(errors) = input_error.as_deref_mut() {
                errors[[i, j]] = pogson * errors[[i, j]] / (1.0 + x * x).sqrt() / (2.0 * scale);
            }
            input[[i, j]] = -pogson * (x.asinh() + scale.ln());
        }
    }
}

/// Median of the values; NaN when there are none.
fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median([3.0, 1.0, 2.0].into_iter()), 2.0);
        assert_eq!(median([4.0, 1.0, 3.0, 2.0].into_iter()), 2.5);
        assert!(median(std::iter::empty()).is_nan());
    }

    #[test]
    fn luptitude_uses_error_median_as_scale() {
        let mut input = array![[10.0], [f64::NAN], [40.0]];
        let mut errors = array![[1.0], [f64::NAN], [3.0]];
        flux_to_luptitude(&mut input, Some(&mut errors));

        let b: f64 = 2.0;
        let k = 2.5 / std::f64::consts::LN_10;
        let x: f64 = 10.0 / (2.0 * b);
        assert_relative_eq!(input[[0, 0]], -k * (x.asinh() + b.ln()), epsilon = 1e-12);
        assert_relative_eq!(errors[[0, 0]], k * 1.0 / (1.0 + x * x).sqrt() / (2.0 * b), epsilon = 1e-12);
        assert!(input[[1, 0]].is_nan());
        assert!(errors[[1, 0]].is_nan());
    }

    #[test]
    fn luptitude_without_errors_uses_positive_fluxes() {
        let mut input = array![[-5.0], [2.0], [4.0], [6.0]];
        flux_to_luptitude(&mut input, None);

        let b: f64 = 4.0;
        let k = 2.5 / std::f64::consts::LN_10;
        let x: f64 = -5.0 / (2.0 * b);
        assert_relative_eq!(input[[0, 0]], -k * (x.asinh() + b.ln()), epsilon = 1e-12);
    }

    #[test]
    fn large_fluxes_approach_magnitudes() {
        let mut input = array![[1.0e6], [1.0], [1.0]];
        flux_to_luptitude(&mut input, None);
        let mag = -2.5 * 1.0e6_f64.log10();
        assert_relative_eq!(input[[0, 0]], mag, epsilon = 1e-6);
    }

    #[test]
    fn selector_set_is_closed() {
        assert_eq!(InputTransform::from_selector("no"), Some(InputTransform::None));
        assert_eq!(
            InputTransform::from_selector("flux_to_luptitude"),
            Some(InputTransform::FluxToLuptitude)
        );
        assert_eq!(InputTransform::from_selector("Flux_To_Luptitude"), None);
    }
}
