use crate::{
    curve::NurbsCurve,
    error::{Error, Result},
};
use nalgebra_glm::{DVec3, TVec};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Relative size below which a vector is treated as vanishing
const DEGENERATE_EPS: f64 = 1e-12;

/// Tangent, normal and binormal of a space curve at one parameter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrenetFrame {
    pub tangent: DVec3,
    pub normal: DVec3,
    pub binormal: DVec3,
}

/// Magnitude of the wedge product `a ^ b`, which is `|a x b|` in 3-D and
/// `|a_x b_y - a_y b_x|` in 2-D.
///
/// Summing the squared 2x2 minors avoids the cancellation in
/// `|a|^2 |b|^2 - (a . b)^2`.
pub(crate) fn wedge_norm<const D: usize>(a: &TVec<f64, D>, b: &TVec<f64, D>) -> f64 {
    let mut sum = 0.0;
    for i in 0..D {
        for j in (i + 1)..D {
            let m = a[i] * b[j] - a[j] * b[i];
            sum += m * m;
        }
    }
    sum.sqrt()
}

impl<const D: usize> NurbsCurve<D> {
    /// Unit tangent vector at `u`
    pub fn tangent(&self, u: f64) -> Result<TVec<f64, D>> {
        let d = self.derivative(u, 1);
        let speed = d.norm();
        if speed == 0.0 || !speed.is_finite() {
            return Err(Error::Undefined {
                quantity: "tangent",
                u,
            });
        }
        Ok(d / speed)
    }

    /// Unit normal at `u`, pointing towards the center of curvature.
    ///
    /// This is the component of the second derivative orthogonal to the
    /// tangent, normalized. It is undefined where the curve is locally
    /// straight.
    pub fn normal(&self, u: f64) -> Result<TVec<f64, D>> {
        let d = self.derivatives(u, 2);
        let t = self.tangent(u)?;
        let a = d[2];
        let perp = a - t * a.dot(&t);
        let scale = a.norm().max(d[1].norm_squared());
        let len = perp.norm();
        if len <= DEGENERATE_EPS * scale || !len.is_finite() {
            return Err(Error::Undefined {
                quantity: "normal",
                u,
            });
        }
        Ok(perp / len)
    }

    /// Curvature `|C' ^ C''| / |C'|^3` at `u`
    pub fn curvature(&self, u: f64) -> Result<f64> {
        let d = self.derivatives(u, 2);
        let speed = d[1].norm();
        if speed == 0.0 || !speed.is_finite() {
            return Err(Error::Undefined {
                quantity: "curvature",
                u,
            });
        }
        Ok(wedge_norm(&d[1], &d[2]) / speed.powi(3))
    }

    /// Curvature at every parameter in `us`
    pub fn curvatures(&self, us: &[f64]) -> Result<Vec<f64>> {
        #[cfg(feature = "rayon")]
        let iter = us.par_iter();
        #[cfg(not(feature = "rayon"))]
        let iter = us.iter();
        iter.map(|u| self.curvature(*u)).collect()
    }
}

impl NurbsCurve<3> {
    /// Unit binormal `T x N` at `u`
    pub fn binormal(&self, u: f64) -> Result<DVec3> {
        Ok(self.frenet_frame(u)?.binormal)
    }

    pub fn frenet_frame(&self, u: f64) -> Result<FrenetFrame> {
        let tangent = self.tangent(u)?;
        let normal = self.normal(u)?;
        let binormal = nalgebra_glm::cross(&tangent, &normal);
        Ok(FrenetFrame {
            tangent,
            normal,
            binormal,
        })
    }

    /// Torsion `(C' x C'') . C''' / |C' x C''|^2` at `u`
    pub fn torsion(&self, u: f64) -> Result<f64> {
        let d = self.derivatives(u, 3);
        let c = nalgebra_glm::cross(&d[1], &d[2]);
        let len2 = c.norm_squared();
        if len2 <= (DEGENERATE_EPS * d[1].norm() * d[2].norm()).powi(2) || !len2.is_finite() {
            return Err(Error::Undefined {
                quantity: "torsion",
                u,
            });
        }
        Ok(c.dot(&d[3]) / len2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm::DVec2;

    #[test]
    fn wedge_matches_cross() {
        let a = DVec3::new(1.0, 2.0, 3.0);
        let b = DVec3::new(-2.0, 0.5, 4.0);
        let c = nalgebra_glm::cross(&a, &b).norm();
        assert!((wedge_norm(&a, &b) - c).abs() < 1e-12);
        let a = DVec2::new(1.0, 2.0);
        let b = DVec2::new(3.0, -1.0);
        assert!((wedge_norm(&a, &b) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn straight_line_has_no_normal() {
        let c = NurbsCurve::bezier(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(3.0, 3.0, 3.0),
        ])
        .unwrap();
        assert_eq!(c.curvature(0.5).unwrap(), 0.0);
        let t = c.tangent(0.5).unwrap();
        assert!((t - DVec3::new(1.0, 1.0, 1.0).normalize()).norm() < 1e-14);
        assert!(matches!(
            c.normal(0.5),
            Err(Error::Undefined {
                quantity: "normal",
                ..
            })
        ));
        assert!(c.torsion(0.5).is_err());
    }

    #[test]
    fn stationary_point_has_no_tangent() {
        let c = NurbsCurve::bezier(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 1.0),
        ])
        .unwrap();
        assert_eq!(
            c.tangent(0.0),
            Err(Error::Undefined {
                quantity: "tangent",
                u: 0.0
            })
        );
        assert!(c.curvature(0.0).is_err());
        assert!(c.tangent(0.5).is_ok());
    }

    #[test]
    fn parabola_curvature() {
        // C(u) = (2u, 4u(1 - u)) on [0, 1], i.e. y = 2x - x^2
        let c = NurbsCurve::bezier(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(2.0, 0.0),
        ])
        .unwrap();
        // At the apex, y'' = -2 and y' = 0, so the curvature is 2
        assert!((c.curvature(0.5).unwrap() - 2.0).abs() < 1e-12);
        let n = c.normal(0.5).unwrap();
        assert!((n - DVec2::new(0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn helix_like_cubic_torsion_sign() {
        // A twisted cubic (u, u^2, u^3) as a Bezier curve
        let c = NurbsCurve::bezier(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0 / 3.0, 0.0, 0.0),
            DVec3::new(2.0 / 3.0, 1.0 / 3.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
        ])
        .unwrap();
        // For (t, t^2, t^3), torsion = 3 / (1 + 9t^2 + 9t^4)
        for &u in &[0.0_f64, 0.3, 0.7, 1.0] {
            let expected = 3.0 / (1.0 + 9.0 * u * u + 9.0 * u.powi(4));
            assert!((c.torsion(u).unwrap() - expected).abs() < 1e-10);
        }
        let frame = c.frenet_frame(0.4).unwrap();
        assert!(frame.tangent.dot(&frame.normal).abs() < 1e-12);
        assert!((frame.binormal.norm() - 1.0).abs() < 1e-12);
    }
}
