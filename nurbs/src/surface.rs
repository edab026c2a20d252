use crate::{
    curve::{axpy, check_weights},
    error::{Error, Result},
    knot_vector::KnotVector,
    scalar::Param,
};
use nalgebra_glm::{DVec3, TVec};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Tensor-product rational B-spline surface in `D`-dimensional space.
///
/// Control points are stored row-major: index `(i, j)` lives at
/// `i * n_v + j`, where `i` runs along `u` and `j` along `v`.
#[derive(Clone, Debug)]
pub struct NurbsSurface<const D: usize> {
    control_points: Vec<TVec<f64, D>>,
    weighted: Vec<TVec<f64, D>>,
    weights: Vec<f64>,
    shape: (usize, usize),
    degree_u: usize,
    degree_v: usize,
    knots_u: KnotVector,
    knots_v: KnotVector,
}

/// Gaussian and mean curvature at a surface point
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfaceCurvature {
    pub gaussian: f64,
    /// Sign follows the orientation of [`NurbsSurface::unit_normal`]
    pub mean: f64,
}

#[derive(Clone, Debug)]
pub struct NurbsSurfaceBuilder<const D: usize> {
    control_points: Vec<Vec<TVec<f64, D>>>,
    weights: Option<Vec<Vec<f64>>>,
    degree_u: Option<usize>,
    degree_v: Option<usize>,
    knots_u: Option<Vec<f64>>,
    knots_v: Option<Vec<f64>>,
}

/// Resolves the degree and knot vector of one parametric direction, with the
/// same defaulting rules as curves.
fn direction(
    n: usize,
    degree: Option<usize>,
    knots: Option<Vec<f64>>,
) -> Result<(usize, KnotVector)> {
    let p = match (degree, &knots) {
        (Some(p), _) => p,
        (None, Some(k)) => k.len().checked_sub(n + 1).ok_or(Error::KnotCount {
            expected: n + 1,
            actual: k.len(),
        })?,
        (None, None) => n - 1,
    };
    if p >= n {
        return Err(Error::DegreeOutOfRange {
            degree: p,
            max: n - 1,
        });
    }
    let knots = match knots {
        Some(k) => {
            if k.len() != n + p + 1 {
                return Err(Error::KnotCount {
                    expected: n + p + 1,
                    actual: k.len(),
                });
            }
            let k = KnotVector::new(k)?;
            k.check(n, p)?;
            k
        }
        None => KnotVector::clamped_uniform(n, p),
    };
    Ok((p, knots))
}

impl<const D: usize> NurbsSurfaceBuilder<D> {
    /// Weight grid, indexed like the control point grid
    pub fn weights(mut self, weights: Vec<Vec<f64>>) -> Self {
        self.weights = Some(weights);
        self
    }
    pub fn degrees(mut self, degree_u: usize, degree_v: usize) -> Self {
        self.degree_u = Some(degree_u);
        self.degree_v = Some(degree_v);
        self
    }
    pub fn knots_u(mut self, knots: Vec<f64>) -> Self {
        self.knots_u = Some(knots);
        self
    }
    pub fn knots_v(mut self, knots: Vec<f64>) -> Self {
        self.knots_v = Some(knots);
        self
    }

    pub fn build(self) -> Result<NurbsSurface<D>> {
        let n_u = self.control_points.len();
        let n_v = self.control_points.first().map_or(0, Vec::len);
        if n_u == 0 || n_v == 0 {
            return Err(Error::EmptyControlPoints);
        }
        if let Some(row) = self.control_points.iter().find(|r| r.len() != n_v) {
            return Err(Error::GridShape {
                expected: (n_u, n_v),
                actual: (n_u, row.len()),
            });
        }
        let weights = match self.weights {
            Some(w) => {
                if w.len() != n_u {
                    return Err(Error::GridShape {
                        expected: (n_u, n_v),
                        actual: (w.len(), w.first().map_or(0, Vec::len)),
                    });
                }
                if let Some(row) = w.iter().find(|r| r.len() != n_v) {
                    return Err(Error::GridShape {
                        expected: (n_u, n_v),
                        actual: (n_u, row.len()),
                    });
                }
                Some(w.into_iter().flatten().collect())
            }
            None => None,
        };
        let weights = check_weights(weights, n_u * n_v)?;
        let (degree_u, knots_u) = direction(n_u, self.degree_u, self.knots_u)?;
        let (degree_v, knots_v) = direction(n_v, self.degree_v, self.knots_v)?;

        let control_points: Vec<_> = self.control_points.into_iter().flatten().collect();
        let weighted = control_points
            .iter()
            .zip(&weights)
            .map(|(p, w)| p * *w)
            .collect();
        log::debug!(
            "built {}-d surface: {n_u}x{n_v} control points, degrees ({degree_u}, {degree_v})",
            D
        );
        Ok(NurbsSurface {
            control_points,
            weighted,
            weights,
            shape: (n_u, n_v),
            degree_u,
            degree_v,
            knots_u,
            knots_v,
        })
    }
}

impl<const D: usize> NurbsSurface<D> {
    /// Starts a surface from a grid of control points, `grid[i][j]` with `i`
    /// along `u` and `j` along `v`.
    pub fn builder(grid: Vec<Vec<TVec<f64, D>>>) -> NurbsSurfaceBuilder<D> {
        NurbsSurfaceBuilder {
            control_points: grid,
            weights: None,
            degree_u: None,
            degree_v: None,
            knots_u: None,
            knots_v: None,
        }
    }

    /// Non-rational Bezier patch
    pub fn bezier(grid: Vec<Vec<TVec<f64, D>>>) -> Result<Self> {
        Self::builder(grid).build()
    }

    pub fn degrees(&self) -> (usize, usize) {
        (self.degree_u, self.degree_v)
    }
    pub fn knots_u(&self) -> &KnotVector {
        &self.knots_u
    }
    pub fn knots_v(&self) -> &KnotVector {
        &self.knots_v
    }
    /// Number of control points along `u` and `v`
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }
    pub fn control_point(&self, i: usize, j: usize) -> &TVec<f64, D> {
        &self.control_points[i * self.shape.1 + j]
    }
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[i * self.shape.1 + j]
    }

    /// Parameter domains along `u` and `v`
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            self.knots_u.domain(self.degree_u),
            self.knots_v.domain(self.degree_v),
        )
    }

    fn locate<T: Param>(&self, u: T, v: T) -> (usize, T, usize, T) {
        let u = self.knots_u.clamp(u, self.degree_u);
        let v = self.knots_v.clamp(v, self.degree_v);
        let su = self
            .knots_u
            .find_span(self.shape.0 - 1, self.degree_u, u.re());
        let sv = self
            .knots_v
            .find_span(self.shape.1 - 1, self.degree_v, v.re());
        (su, u, sv, v)
    }

    /// Evaluates the surface at `(u, v)`.
    ///
    /// Each real part outside [`domain`](Self::domain) is clamped into it;
    /// for knot vectors that are not clamped that is `[U_p, U_{n+1}]` per
    /// direction, not the full knot range.
    ///
    /// Algorithm A4.3
    pub fn value<T: Param>(&self, u: T, v: T) -> TVec<T, D> {
        let (p, q) = (self.degree_u, self.degree_v);
        let (su, u, sv, v) = self.locate(u, v);
        let Nu = self.knots_u.basis_funs(su, u, p);
        let Nv = self.knots_v.basis_funs(sv, v, q);

        let mut num = TVec::<T, D>::zeros();
        let mut den = T::zero();
        for l in 0..=q {
            let mut temp = TVec::<T, D>::zeros();
            let mut temp_w = T::zero();
            for k in 0..=p {
                let idx = (su - p + k) * self.shape.1 + sv - q + l;
                axpy(&mut temp, Nu[k], &self.weighted[idx]);
                temp_w += Nu[k] * T::lift(self.weights[idx]);
            }
            num += temp * Nv[l];
            den += temp_w * Nv[l];
        }
        num / den
    }

    /// Mixed partial derivatives of the weighted numerator and of the
    /// denominator, `[k][l]` being `k` times along `u` and `l` times along `v`.
    ///
    /// Algorithm A3.6, applied to homogeneous control points.
    #[allow(clippy::type_complexity)]
    pub fn homogeneous_derivatives<T: Param>(
        &self,
        u: T,
        v: T,
        order_u: usize,
        order_v: usize,
    ) -> (Vec<Vec<TVec<T, D>>>, Vec<Vec<T>>) {
        let (p, q) = (self.degree_u, self.degree_v);
        let (su, u, sv, v) = self.locate(u, v);
        let Nu = self.knots_u.ders_basis_funs(su, u, p, order_u);
        let Nv = self.knots_v.ders_basis_funs(sv, v, q, order_v);

        let mut Aders = vec![vec![TVec::<T, D>::zeros(); order_v + 1]; order_u + 1];
        let mut wders = vec![vec![T::zero(); order_v + 1]; order_u + 1];
        for k in 0..=order_u.min(p) {
            let row_u = Nu.row(k);
            for s in 0..=q {
                let mut temp = TVec::<T, D>::zeros();
                let mut temp_w = T::zero();
                for r in 0..=p {
                    let idx = (su - p + r) * self.shape.1 + sv - q + s;
                    axpy(&mut temp, row_u[r], &self.weighted[idx]);
                    temp_w += row_u[r] * T::lift(self.weights[idx]);
                }
                for l in 0..=order_v.min(q) {
                    let n = Nv.row(l)[s];
                    Aders[k][l] += temp * n;
                    wders[k][l] += temp_w * n;
                }
            }
        }
        (Aders, wders)
    }

    /// Computes the mixed partial derivatives `S_{u^k v^l}` for
    /// `k <= order_u`, `l <= order_v` at `(u, v)`.
    ///
    /// Algorithm A4.4
    pub fn derivatives<T: Param>(
        &self,
        u: T,
        v: T,
        order_u: usize,
        order_v: usize,
    ) -> Vec<Vec<TVec<T, D>>> {
        let (Aders, wders) = self.homogeneous_derivatives(u, v, order_u, order_v);
        let bin = |a, b| T::lift(num_integer::binomial(a, b) as f64);
        let mut SKL = vec![vec![TVec::<T, D>::zeros(); order_v + 1]; order_u + 1];
        for k in 0..=order_u {
            for l in 0..=order_v {
                let mut v = Aders[k][l];
                for j in 1..=l {
                    v -= SKL[k][l - j] * (bin(l, j) * wders[0][j]);
                }
                for i in 1..=k {
                    v -= SKL[k - i][l] * (bin(k, i) * wders[i][0]);
                    let mut v2 = TVec::<T, D>::zeros();
                    for j in 1..=l {
                        v2 += SKL[k - i][l - j] * (bin(l, j) * wders[i][j]);
                    }
                    v -= v2 * bin(k, i);
                }
                SKL[k][l] = v / wders[0][0];
            }
        }
        SKL
    }

    /// Mixed partial derivative, `order_u` times along `u` and `order_v`
    /// times along `v`. Orders `(0, 0)` give the surface point.
    pub fn partial_derivative<T: Param>(
        &self,
        u: T,
        v: T,
        order_u: usize,
        order_v: usize,
    ) -> TVec<T, D> {
        self.derivatives(u, v, order_u, order_v)[order_u][order_v]
    }

    /// Evaluates the surface on the tensor grid `us x vs`; the result is
    /// indexed `[i][j]` for `us[i]`, `vs[j]`.
    pub fn values_grid<T: Param>(&self, us: &[T], vs: &[T]) -> Vec<Vec<TVec<T, D>>> {
        #[cfg(feature = "rayon")]
        let iter = us.par_iter();
        #[cfg(not(feature = "rayon"))]
        let iter = us.iter();
        iter.map(|u| vs.iter().map(|v| self.value(*u, *v)).collect::<Vec<_>>())
            .collect()
    }
}

impl NurbsSurface<3> {
    /// Unit normal `S_u x S_v / |S_u x S_v|`
    pub fn unit_normal(&self, u: f64, v: f64) -> Result<DVec3> {
        let d = self.derivatives(u, v, 1, 1);
        let n = nalgebra_glm::cross(&d[1][0], &d[0][1]);
        let len = n.norm();
        if len <= 1e-12 * d[1][0].norm() * d[0][1].norm() || !len.is_finite() {
            return Err(Error::UndefinedOnSurface {
                quantity: "normal",
                u,
                v,
            });
        }
        Ok(n / len)
    }

    /// Gaussian and mean curvature from the first and second fundamental
    /// forms.
    pub fn curvature(&self, u: f64, v: f64) -> Result<SurfaceCurvature> {
        let d = self.derivatives(u, v, 2, 2);
        let n = self.unit_normal(u, v)?;
        let (su, sv) = (d[1][0], d[0][1]);
        let E = su.dot(&su);
        let F = su.dot(&sv);
        let G = sv.dot(&sv);
        let L = d[2][0].dot(&n);
        let M = d[1][1].dot(&n);
        let N = d[0][2].dot(&n);
        let det = E * G - F * F;
        Ok(SurfaceCurvature {
            gaussian: (L * N - M * M) / det,
            mean: (E * N - 2.0 * F * M + G * L) / (2.0 * det),
        })
    }
}
