use crate::{
    error::{Error, Result},
    scalar::{ratio, ratio_real, Param},
    VecF,
};
use smallvec::{smallvec, SmallVec};

/// Non-decreasing sequence of knots, validated on construction.
///
/// Knot vectors never change once built, and every basis evaluation below is
/// a pure function of `(knots, degree, u)` with per-call scratch buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct KnotVector(Vec<f64>);

/// Derivatives of the `p + 1` nonzero basis functions at one parameter.
///
/// Row `k` holds `N^(k)_{span - p + j, p}(u)` for `j in 0..=p`.
#[derive(Clone, Debug)]
pub struct BasisDerivatives<T> {
    width: usize,
    values: SmallVec<[T; 32]>,
}

impl<T: Param> BasisDerivatives<T> {
    pub fn order(&self) -> usize {
        self.values.len() / self.width - 1
    }
    pub fn row(&self, k: usize) -> &[T] {
        &self.values[k * self.width..(k + 1) * self.width]
    }
    fn row_mut(&mut self, k: usize) -> &mut [T] {
        &mut self.values[k * self.width..(k + 1) * self.width]
    }
}

impl KnotVector {
    pub fn new(knots: Vec<f64>) -> Result<Self> {
        if knots.len() < 2 {
            return Err(Error::KnotCount {
                expected: 2,
                actual: knots.len(),
            });
        }
        for (i, k) in knots.iter().enumerate() {
            if !k.is_finite() {
                return Err(Error::NonFiniteKnot { index: i });
            }
            if i > 0 && *k < knots[i - 1] {
                return Err(Error::KnotsNotMonotonic { index: i });
            }
        }
        if knots[0] == knots[knots.len() - 1] {
            return Err(Error::DegenerateKnotDomain);
        }
        Ok(Self(knots))
    }

    /// Builds the clamped knot vector on `[0, 1]`: `degree + 1` zeros,
    /// `n_ctrl - degree - 1` equispaced interior knots and `degree + 1` ones.
    ///
    /// # Panics
    /// If `degree >= n_ctrl`
    pub fn clamped_uniform(n_ctrl: usize, degree: usize) -> Self {
        assert!(degree < n_ctrl, "degree must be below the control count");
        let segments = n_ctrl - degree;
        let mut knots = Vec::with_capacity(n_ctrl + degree + 1);
        knots.extend(std::iter::repeat(0.0).take(degree));
        knots.extend((0..=segments).map(|i| i as f64 / segments as f64));
        knots.extend(std::iter::repeat(1.0).take(degree));
        Self(knots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of times `knot` appears in the vector
    pub fn multiplicity(&self, knot: f64) -> usize {
        self.0.iter().filter(|k| **k == knot).count()
    }

    /// Checks the knot vector against a degree and control point count.
    ///
    /// The first and last knot values may repeat `p + 1` times; interior
    /// knots at most `p` times (once for `p = 0`), which keeps the spline
    /// continuous across every interior knot.
    pub(crate) fn check(&self, n_ctrl: usize, p: usize) -> Result<()> {
        let expected = n_ctrl + p + 1;
        if self.len() != expected {
            return Err(Error::KnotCount {
                expected,
                actual: self.len(),
            });
        }
        let mut i = 0;
        while i < self.0.len() {
            let knot = self.0[i];
            let multiplicity = self.0[i..].iter().take_while(|k| **k == knot).count();
            let at_end = i == 0 || i + multiplicity == self.0.len();
            let max = if at_end { p + 1 } else { p.max(1) };
            if multiplicity > max {
                return Err(Error::KnotMultiplicity {
                    knot,
                    multiplicity,
                    max,
                });
            }
            i += multiplicity;
        }
        let (lo, hi) = self.domain(p);
        if lo >= hi {
            return Err(Error::DegenerateKnotDomain);
        }
        Ok(())
    }

    /// Valid parameter domain `[U_p, U_{n+1}]` for a spline of degree `p`.
    /// For a clamped knot vector this is `[first knot, last knot]`.
    ///
    /// # Panics
    /// If the vector has fewer than `p + 1` knots
    pub fn domain(&self, p: usize) -> (f64, f64) {
        let m = self.0.len() - 1;
        (self.0[p], self.0[m - p])
    }

    /// Clamps the real part of `u` into the domain, keeping any imaginary part.
    ///
    /// Evaluation never rejects a parameter: values outside the domain are
    /// evaluated at the nearest boundary, consistently with the closed
    /// right-hand end of the last knot span.
    pub fn clamp<T: Param>(&self, u: T, p: usize) -> T {
        let (lo, hi) = self.domain(p);
        let re = u.re();
        if re < lo || re > hi {
            log::trace!("clamping parameter {re} into [{lo}, {hi}]");
            u.with_re(re.clamp(lo, hi))
        } else {
            u
        }
    }

    /// Determine the knot span index for a spline of degree `p` with control
    /// points `0..=n`.
    ///
    /// The last span is closed on the right, so `u = U_{n+1}` resolves to the
    /// last span with nonzero length.
    ///
    /// Algorithm A2.1
    pub fn find_span(&self, n: usize, p: usize, u: f64) -> usize {
        let U = &self.0;
        if u >= U[n + 1] {
            let mut i = n;
            while i > p && U[i] == U[i + 1] {
                i -= 1;
            }
            return i;
        }
        if u <= U[p] {
            let mut i = p;
            while i < n && U[i + 1] <= u {
                i += 1;
            }
            return i;
        }
        let mut low = p;
        let mut high = n + 1;
        let mut mid = (low + high) / 2;
        while u < U[mid] || u >= U[mid + 1] {
            if u < U[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = (low + high) / 2;
            if next == mid {
                break;
            }
            mid = next;
        }
        mid
    }

    /// Builds the triangular table of the Cox-de Boor recursion.
    ///
    /// `ndu[r][j]` (for `r <= j`) holds the degree-`j` basis functions, and
    /// `den[j][r]` (for `r < j`) the knot differences they were divided by.
    fn triangle<T: Param>(
        &self,
        i: usize,
        u: T,
        p: usize,
    ) -> (SmallVec<[T; 64]>, SmallVec<[f64; 64]>) {
        let U = &self.0;
        let w = p + 1;
        let mut ndu: SmallVec<[T; 64]> = smallvec![T::zero(); w * w];
        let mut den: SmallVec<[f64; 64]> = smallvec![0.0; w * w];
        let mut left: VecF<T> = smallvec![T::zero(); w];
        let mut right: VecF<T> = smallvec![T::zero(); w];

        ndu[0] = T::one();
        for j in 1..=p {
            left[j] = u - T::lift(U[i + 1 - j]);
            right[j] = T::lift(U[i + j]) - u;
            let mut saved = T::zero();
            for r in 0..j {
                // Knot difference U[i + r + 1] - U[i + 1 + r - j], zero at
                // repeated knots, in which case the term drops out entirely.
                den[j * w + r] = U[i + r + 1] - U[i + 1 + r - j];
                let temp = ratio(ndu[r * w + j - 1], den[j * w + r]);
                ndu[r * w + j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j * w + j] = saved;
        }
        (ndu, den)
    }

    /// Computes the `p + 1` nonvanishing basis functions at `u` in span `i`.
    ///
    /// Algorithm A2.2
    pub fn basis_funs<T: Param>(&self, i: usize, u: T, p: usize) -> VecF<T> {
        let (ndu, _) = self.triangle(i, u, p);
        (0..=p).map(|j| ndu[j * (p + 1) + p]).collect()
    }

    /// Computes the nonvanishing basis functions and their derivatives up to
    /// order `n`. Orders above `p` are identically zero.
    ///
    /// Algorithm A2.3
    pub fn ders_basis_funs<T: Param>(
        &self,
        i: usize,
        u: T,
        p: usize,
        n: usize,
    ) -> BasisDerivatives<T> {
        let w = p + 1;
        let (ndu, den) = self.triangle(i, u, p);
        let mut ders = BasisDerivatives {
            width: w,
            values: smallvec![T::zero(); (n + 1) * w],
        };
        for j in 0..=p {
            ders.row_mut(0)[j] = ndu[j * w + p];
        }

        // The coefficients a[k][j] depend only on the knots
        let mut a: SmallVec<[f64; 16]> = smallvec![0.0; 2 * w];
        let top = n.min(p);
        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a.iter_mut().for_each(|v| *v = 0.0);
            a[0] = 1.0;
            for k in 1..=top {
                let mut d = T::zero();
                let rk = r as isize - k as isize;
                let pk = p - k;
                if rk >= 0 {
                    let rk = rk as usize;
                    a[s2 * w] = ratio_real(a[s1 * w], den[(pk + 1) * w + rk]);
                    d = T::lift(a[s2 * w]) * ndu[rk * w + pk];
                }
                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r <= pk + 1 { k - 1 } else { p - r };
                for j in j1..=j2 {
                    let idx = (rk + j as isize) as usize;
                    a[s2 * w + j] = ratio_real(
                        a[s1 * w + j] - a[s1 * w + j - 1],
                        den[(pk + 1) * w + idx],
                    );
                    d += T::lift(a[s2 * w + j]) * ndu[idx * w + pk];
                }
                if r <= pk {
                    a[s2 * w + k] = ratio_real(-a[s1 * w + k - 1], den[(pk + 1) * w + r]);
                    d += T::lift(a[s2 * w + k]) * ndu[r * w + pk];
                }
                ders.row_mut(k)[r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        // Multiply through by p! / (p - k)!
        let mut factor = p as f64;
        for k in 1..=top {
            for v in ders.row_mut(k) {
                *v *= T::lift(factor);
            }
            factor *= (p - k) as f64;
        }
        ders
    }

    /// Evaluates every basis function `N_{i,p}` (not just the nonzero ones)
    /// and its derivatives up to `order` at `u`.
    ///
    /// Returns one row per derivative order, each with one entry per control
    /// point.
    ///
    /// # Panics
    /// If the vector has fewer than `p + 2` knots
    pub fn basis_functions<T: Param>(&self, u: T, p: usize, order: usize) -> Vec<Vec<T>> {
        let n = self.len() - p - 2;
        let u = self.clamp(u, p);
        let span = self.find_span(n, p, u.re());
        let ders = self.ders_basis_funs(span, u, p, order);
        (0..=order)
            .map(|k| {
                let mut row = vec![T::zero(); n + 1];
                row[span - p..=span].copy_from_slice(ders.row(k));
                row
            })
            .collect()
    }
}
