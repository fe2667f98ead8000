/// A pure per-cell function. No state is carried between cells or rows.
pub trait CellTransform {
    fn apply(&self, value: f64) -> f64;

    /// Apply to a whole row. `input` and `output` must have equal length.
    fn apply_row(&self, input: &[f64], output: &mut [f64]) {
        debug_assert_eq!(input.len(), output.len());
        for (dst, &src) in output.iter_mut().zip(input) {
            *dst = self.apply(src);
        }
    }
}

/// `f(x) = 2x`. No-data (`NaN`) stays no-data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Double;

impl CellTransform for Double {
    #[inline]
    fn apply(&self, value: f64) -> f64 {
        value * 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_row() {
        let input = [-1.0, 0.0, 5.5];
        let mut output = [0.0; 3];
        Double.apply_row(&input, &mut output);
        assert_eq!(output, [-2.0, 0.0, 11.0]);
    }

    #[test]
    fn test_double_passes_nan_through() {
        assert!(Double.apply(f64::NAN).is_nan());
    }

    #[test]
    fn test_double_infinities() {
        assert_eq!(Double.apply(f64::INFINITY), f64::INFINITY);
        assert_eq!(Double.apply(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn test_double_keeps_negative_zero_sign() {
        assert!(Double.apply(-0.0).is_sign_negative());
    }
}
