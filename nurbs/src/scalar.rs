use num_complex::Complex64;
use num_traits::NumAssign;
use std::fmt::Debug;

/// Scalar type accepted as a curve or surface parameter.
///
/// Evaluation runs through the same code path for real and complex
/// parameters. The knot search only ever looks at the real part, while the
/// recurrences carry the full value, so `value(u + i h)` is the analytic
/// continuation of the spline segment containing `u`. This is what makes the
/// complex-step derivative work.
pub trait Param: NumAssign + Copy + Debug + PartialEq + Send + Sync + 'static {
    fn lift(x: f64) -> Self;
    fn re(self) -> f64;
    fn im(self) -> f64;

    /// Returns a copy with the real part replaced
    fn with_re(self, re: f64) -> Self;
}

impl Param for f64 {
    fn lift(x: f64) -> Self {
        x
    }
    fn re(self) -> f64 {
        self
    }
    fn im(self) -> f64 {
        0.0
    }
    fn with_re(self, re: f64) -> Self {
        re
    }
}

impl Param for Complex64 {
    fn lift(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }
    fn re(self) -> f64 {
        self.re
    }
    fn im(self) -> f64 {
        self.im
    }
    fn with_re(self, re: f64) -> Self {
        Complex64::new(re, self.im)
    }
}

/// `num / den`, where a zero denominator (from a repeated knot) contributes
/// nothing instead of producing an infinity or NaN.
pub(crate) fn ratio<T: Param>(num: T, den: f64) -> T {
    if den == 0.0 {
        T::zero()
    } else {
        num / T::lift(den)
    }
}

/// Same rule as [`ratio`], for the purely real knot coefficients.
pub(crate) fn ratio_real(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
