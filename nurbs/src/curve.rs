use crate::{
    error::{Error, Result},
    knot_vector::KnotVector,
    scalar::Param,
};
use nalgebra_glm::TVec;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Rational B-spline curve in `D`-dimensional space.
///
/// The curve is immutable once built; every evaluation allocates its own
/// scratch space, so a shared `&NurbsCurve` can be evaluated from any number
/// of threads.
#[derive(Clone, Debug)]
pub struct NurbsCurve<const D: usize> {
    control_points: Vec<TVec<f64, D>>,
    /// Control points premultiplied by their weight (the spatial part of the
    /// homogeneous control points)
    weighted: Vec<TVec<f64, D>>,
    weights: Vec<f64>,
    degree: usize,
    knots: KnotVector,
}

/// Collects the optional construction arguments of a [`NurbsCurve`].
///
/// Missing weights default to one, a missing degree to `n - 1` (a Bezier
/// curve) or to whatever the knot count implies, and missing knots to the
/// clamped uniform vector on `[0, 1]`.
#[derive(Clone, Debug)]
pub struct NurbsCurveBuilder<const D: usize> {
    control_points: Vec<TVec<f64, D>>,
    weights: Option<Vec<f64>>,
    degree: Option<usize>,
    knots: Option<Vec<f64>>,
}

impl<const D: usize> NurbsCurveBuilder<D> {
    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn degree(mut self, degree: usize) -> Self {
        self.degree = Some(degree);
        self
    }

    pub fn knots(mut self, knots: Vec<f64>) -> Self {
        self.knots = Some(knots);
        self
    }

    pub fn build(self) -> Result<NurbsCurve<D>> {
        let n_ctrl = self.control_points.len();
        if n_ctrl == 0 {
            return Err(Error::EmptyControlPoints);
        }

        let degree = match (self.degree, &self.knots) {
            (Some(p), _) => p,
            (None, Some(knots)) => {
                knots
                    .len()
                    .checked_sub(n_ctrl + 1)
                    .ok_or(Error::KnotCount {
                        expected: n_ctrl + 1,
                        actual: knots.len(),
                    })?
            }
            (None, None) => n_ctrl - 1,
        };
        if degree >= n_ctrl {
            return Err(Error::DegreeOutOfRange {
                degree,
                max: n_ctrl - 1,
            });
        }

        let weights = check_weights(self.weights, n_ctrl)?;
        let knots = match self.knots {
            Some(k) => {
                if k.len() != n_ctrl + degree + 1 {
                    return Err(Error::KnotCount {
                        expected: n_ctrl + degree + 1,
                        actual: k.len(),
                    });
                }
                let k = KnotVector::new(k)?;
                k.check(n_ctrl, degree)?;
                k
            }
            None => KnotVector::clamped_uniform(n_ctrl, degree),
        };

        let weighted = self
            .control_points
            .iter()
            .zip(&weights)
            .map(|(p, w)| p * *w)
            .collect();
        log::debug!(
            "built {}-d curve: {n_ctrl} control points, degree {degree}, {} knots",
            D,
            knots.len()
        );
        Ok(NurbsCurve {
            control_points: self.control_points,
            weighted,
            weights,
            degree,
            knots,
        })
    }
}

/// Fills in default weights and checks caller-supplied ones.
pub(crate) fn check_weights(weights: Option<Vec<f64>>, n: usize) -> Result<Vec<f64>> {
    let weights = weights.unwrap_or_else(|| vec![1.0; n]);
    if weights.len() != n {
        return Err(Error::WeightCount {
            expected: n,
            actual: weights.len(),
        });
    }
    if let Some((index, &weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !(w.is_finite() && **w > 0.0))
    {
        return Err(Error::NonPositiveWeight { index, weight });
    }
    Ok(weights)
}

/// `acc += c * p`, lifting the real point into the parameter's field
pub(crate) fn axpy<T: Param, const D: usize>(acc: &mut TVec<T, D>, c: T, p: &TVec<f64, D>) {
    for (a, x) in acc.iter_mut().zip(p.iter()) {
        *a += c * T::lift(*x);
    }
}

impl<const D: usize> NurbsCurve<D> {
    pub fn builder(control_points: Vec<TVec<f64, D>>) -> NurbsCurveBuilder<D> {
        NurbsCurveBuilder {
            control_points,
            weights: None,
            degree: None,
            knots: None,
        }
    }

    /// Non-rational Bezier curve through the given control points
    pub fn bezier(control_points: Vec<TVec<f64, D>>) -> Result<Self> {
        Self::builder(control_points).build()
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
    pub fn knots(&self) -> &KnotVector {
        &self.knots
    }
    pub fn control_points(&self) -> &[TVec<f64, D>] {
        &self.control_points
    }
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Parameter interval the curve is defined on
    pub fn domain(&self) -> (f64, f64) {
        self.knots.domain(self.degree)
    }

    /// Clamps `u` into the domain and finds its knot span
    fn locate<T: Param>(&self, u: T) -> (usize, T) {
        let u = self.knots.clamp(u, self.degree);
        let span = self
            .knots
            .find_span(self.control_points.len() - 1, self.degree, u.re());
        (span, u)
    }

    /// Evaluates the curve at `u`.
    ///
    /// A real part outside [`domain`](Self::domain) is clamped into it. For
    /// a knot vector that is not clamped the domain is `[U_p, U_{n+1}]`,
    /// which is narrower than the full knot range.
    ///
    /// Algorithm A4.1
    pub fn value<T: Param>(&self, u: T) -> TVec<T, D> {
        let p = self.degree;
        let (span, u) = self.locate(u);
        let N = self.knots.basis_funs(span, u, p);
        let mut num = TVec::<T, D>::zeros();
        let mut den = T::zero();
        for j in 0..=p {
            let i = span - p + j;
            axpy(&mut num, N[j], &self.weighted[i]);
            den += N[j] * T::lift(self.weights[i]);
        }
        num / den
    }

    /// Derivatives `0..=order` of the weighted numerator `sum N_i w_i P_i`
    /// and of the denominator `sum N_i w_i`.
    ///
    /// Algorithm A3.2, applied to homogeneous control points.
    pub fn homogeneous_derivatives<T: Param>(
        &self,
        u: T,
        order: usize,
    ) -> (Vec<TVec<T, D>>, Vec<T>) {
        let p = self.degree;
        let (span, u) = self.locate(u);
        let ders = self.knots.ders_basis_funs(span, u, p, order);
        let mut Aders = vec![TVec::<T, D>::zeros(); order + 1];
        let mut wders = vec![T::zero(); order + 1];
        for k in 0..=order.min(p) {
            let row = ders.row(k);
            for j in 0..=p {
                let i = span - p + j;
                axpy(&mut Aders[k], row[j], &self.weighted[i]);
                wders[k] += row[j] * T::lift(self.weights[i]);
            }
        }
        (Aders, wders)
    }

    /// Computes the derivatives of the curve of order up to and including
    /// `order` at location `u`.
    ///
    /// Algorithm A4.2
    pub fn derivatives<T: Param>(&self, u: T, order: usize) -> Vec<TVec<T, D>> {
        let (Aders, wders) = self.homogeneous_derivatives(u, order);
        let mut CK: Vec<TVec<T, D>> = Vec::with_capacity(order + 1);
        for k in 0..=order {
            let mut v = Aders[k];
            for i in 1..=k {
                let b = num_integer::binomial(k, i) as f64;
                v -= CK[k - i] * (T::lift(b) * wders[i]);
            }
            CK.push(v / wders[0]);
        }
        CK
    }

    /// `order`-th derivative of the curve with respect to `u`.
    /// Order zero is the curve point itself.
    pub fn derivative<T: Param>(&self, u: T, order: usize) -> TVec<T, D> {
        self.derivatives(u, order)[order]
    }

    /// Evaluates the curve at every parameter in `us`
    pub fn values<T: Param>(&self, us: &[T]) -> Vec<TVec<T, D>> {
        #[cfg(feature = "rayon")]
        let iter = us.par_iter();
        #[cfg(not(feature = "rayon"))]
        let iter = us.iter();
        iter.map(|u| self.value(*u)).collect()
    }

    /// `order`-th derivative at every parameter in `us`
    pub fn derivatives_at<T: Param>(&self, us: &[T], order: usize) -> Vec<TVec<T, D>> {
        #[cfg(feature = "rayon")]
        let iter = us.par_iter();
        #[cfg(not(feature = "rayon"))]
        let iter = us.iter();
        iter.map(|u| self.derivative(*u, order)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm::{DVec2, DVec3};
    use num_complex::Complex64;

    #[test]
    fn bezier_defaults() {
        let c = NurbsCurve::bezier(vec![DVec2::new(0.0, 0.0), DVec2::new(1.0, 1.0)]).unwrap();
        assert_eq!(c.degree(), 1);
        assert_eq!(c.knots().as_slice(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(c.weights(), &[1.0, 1.0]);
        assert_eq!(c.domain(), (0.0, 1.0));
        let p = c.value(0.5);
        assert!((p - DVec2::new(0.5, 0.5)).norm() < 1e-14);
    }

    #[test]
    fn degree_inferred_from_knots() {
        let pts = vec![DVec2::zeros(); 4];
        let c = NurbsCurve::builder(pts)
            .knots(vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0])
            .build()
            .unwrap();
        assert_eq!(c.degree(), 2);
    }

    #[test]
    fn unclamped_knots_clamp_to_inner_domain() {
        let c = NurbsCurve::builder(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(2.0, 0.0),
        ])
        .knots(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
        .build()
        .unwrap();
        assert_eq!(c.degree(), 2);
        assert_eq!(c.domain(), (2.0, 3.0));
        assert_eq!(c.value(0.0), c.value(2.0));
        assert_eq!(c.value(5.0), c.value(3.0));
    }

    #[test]
    fn construction_errors() {
        let pts = || vec![DVec3::zeros(); 4];
        assert_eq!(
            NurbsCurve::<3>::builder(vec![]).build().unwrap_err(),
            Error::EmptyControlPoints
        );
        assert_eq!(
            NurbsCurve::builder(pts()).degree(4).build().unwrap_err(),
            Error::DegreeOutOfRange { degree: 4, max: 3 }
        );
        assert_eq!(
            NurbsCurve::builder(pts())
                .degree(2)
                .knots(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0])
                .build()
                .unwrap_err(),
            Error::KnotCount {
                expected: 7,
                actual: 6
            }
        );
        assert_eq!(
            NurbsCurve::builder(pts())
                .weights(vec![1.0, 0.0, 1.0, 1.0])
                .build()
                .unwrap_err(),
            Error::NonPositiveWeight {
                index: 1,
                weight: 0.0
            }
        );
        assert_eq!(
            NurbsCurve::builder(pts())
                .weights(vec![1.0, 1.0])
                .build()
                .unwrap_err(),
            Error::WeightCount {
                expected: 4,
                actual: 2
            }
        );
        assert_eq!(
            NurbsCurve::builder(pts())
                .degree(2)
                .knots(vec![0.0, 0.0, 0.0, 0.7, 0.5, 1.0, 1.0])
                .build()
                .unwrap_err(),
            Error::KnotsNotMonotonic { index: 4 }
        );
    }

    #[test]
    fn single_point_curve_is_constant() {
        let c = NurbsCurve::bezier(vec![DVec3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(c.degree(), 0);
        assert_eq!(c.value(0.3), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(c.value(1.0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(c.derivative(0.3, 1), DVec3::zeros());
    }

    #[test]
    fn zeroth_derivative_is_value() {
        let c = NurbsCurve::builder(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(3.0, 1.0),
            DVec2::new(4.0, 3.0),
        ])
        .weights(vec![1.0, 2.0, 0.5, 1.0])
        .degree(2)
        .build()
        .unwrap();
        for i in 0..=20 {
            let u = i as f64 / 20.0;
            assert_eq!(c.derivative(u, 0), c.value(u));
        }
    }

    #[test]
    fn high_orders_of_polynomial_vanish() {
        let c = NurbsCurve::bezier(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(2.0, 0.0),
        ])
        .unwrap();
        let d = c.derivatives(0.25, 4);
        assert_eq!(d.len(), 5);
        // C(u) = (2u, 4u(1 - u))
        assert!((d[1] - DVec2::new(2.0, 2.0)).norm() < 1e-13);
        assert!((d[2] - DVec2::new(0.0, -8.0)).norm() < 1e-13);
        assert!(d[3].norm() < 1e-13);
        assert!(d[4].norm() < 1e-13);
    }

    #[test]
    fn batch_matches_scalar() {
        let c = NurbsCurve::bezier(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 2.0, 0.5),
            DVec3::new(2.0, 0.0, 1.0),
        ])
        .unwrap();
        let us: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        let values = c.values(&us);
        let ders = c.derivatives_at(&us, 1);
        for (i, u) in us.iter().enumerate() {
            assert_eq!(values[i], c.value(*u));
            assert_eq!(ders[i], c.derivative(*u, 1));
        }
    }

    #[test]
    fn real_and_complex_agree_on_real_axis() {
        let c = NurbsCurve::builder(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(3.0, 1.0),
            DVec2::new(4.0, 3.0),
        ])
        .weights(vec![1.0, 2.0, 0.5, 1.0])
        .degree(3)
        .build()
        .unwrap();
        for &u in &[0.0, 0.2, 0.5, 1.0] {
            let r = c.value(u);
            let z = c.value(Complex64::new(u, 0.0));
            for k in 0..2 {
                assert!((z[k].re - r[k]).abs() < 1e-15);
                assert_eq!(z[k].im, 0.0);
            }
        }
    }
}
