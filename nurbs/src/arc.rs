use crate::{
    curve::NurbsCurve,
    error::{Error, Result},
};
use nalgebra_glm::TVec;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Slack on the segment-count thresholds, so that e.g. a half circle built
/// from `0..PI` uses two segments rather than three.
const ANGLE_EPS: f64 = 1e-12;

/// Exact circular arc as a piecewise rational quadratic curve.
///
/// The arc lies in the plane spanned by `x_dir` and `y_dir` through `center`,
/// and runs from angle `theta_start` to `theta_end` (counter-clockwise when
/// `theta_end > theta_start`).
#[derive(Clone, Debug)]
pub struct CircularArc<const D: usize> {
    pub center: TVec<f64, D>,
    pub x_dir: TVec<f64, D>,
    pub y_dir: TVec<f64, D>,
    pub radius: f64,
    pub theta_start: f64,
    pub theta_end: f64,
    curve: NurbsCurve<D>,
}

impl<const D: usize> CircularArc<D> {
    /// Builds the arc. `x_dir` is normalized and `y_dir` is made orthonormal
    /// to it before use.
    ///
    /// Algorithm A7.1
    pub fn new(
        center: TVec<f64, D>,
        x_dir: TVec<f64, D>,
        y_dir: TVec<f64, D>,
        radius: f64,
        theta_start: f64,
        theta_end: f64,
    ) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::InvalidArc(format!("radius must be positive, got {radius}")));
        }
        let span = theta_end - theta_start;
        if !span.is_finite() || span == 0.0 || span.abs() > TAU + ANGLE_EPS {
            return Err(Error::InvalidArc(format!(
                "angular span must be nonzero and at most 2 pi, got {span}"
            )));
        }
        let x_len = x_dir.norm();
        if x_len == 0.0 || !x_len.is_finite() {
            return Err(Error::InvalidArc("x direction has zero length".to_owned()));
        }
        let X = x_dir / x_len;
        let Y = y_dir - X * y_dir.dot(&X);
        let y_len = Y.norm();
        if y_len <= 1e-12 * y_dir.norm() || !y_len.is_finite() {
            return Err(Error::InvalidArc(
                "y direction is zero or parallel to x direction".to_owned(),
            ));
        }
        let Y = Y / y_len;

        let narcs = if span.abs() <= FRAC_PI_2 + ANGLE_EPS {
            1
        } else if span.abs() <= PI + ANGLE_EPS {
            2
        } else if span.abs() <= 3.0 * FRAC_PI_2 + ANGLE_EPS {
            3
        } else {
            4
        };
        let dtheta = span / narcs as f64;
        let w1 = (0.5 * dtheta).cos();
        let on_circle = |angle: f64, r: f64| center + X * (r * angle.cos()) + Y * (r * angle.sin());

        let mut points = Vec::with_capacity(2 * narcs + 1);
        let mut weights = Vec::with_capacity(2 * narcs + 1);
        points.push(on_circle(theta_start, radius));
        weights.push(1.0);
        for i in 1..=narcs {
            let end = theta_start + i as f64 * dtheta;
            // The middle control point sits where the end tangents meet
            points.push(on_circle(end - 0.5 * dtheta, radius / w1));
            weights.push(w1);
            points.push(on_circle(end, radius));
            weights.push(1.0);
        }

        let mut knots = vec![0.0; 3];
        for i in 1..narcs {
            let k = i as f64 / narcs as f64;
            knots.extend([k, k]);
        }
        knots.extend([1.0; 3]);

        let curve = NurbsCurve::builder(points)
            .weights(weights)
            .degree(2)
            .knots(knots)
            .build()?;
        log::debug!("built circular arc of radius {radius} from {narcs} segment(s)");
        Ok(Self {
            center,
            x_dir: X,
            y_dir: Y,
            radius,
            theta_start,
            theta_end,
            curve,
        })
    }

    /// Full circle, made of four quarter arcs
    pub fn circle(
        center: TVec<f64, D>,
        x_dir: TVec<f64, D>,
        y_dir: TVec<f64, D>,
        radius: f64,
    ) -> Result<Self> {
        Self::new(center, x_dir, y_dir, radius, 0.0, TAU)
    }

    pub fn curve(&self) -> &NurbsCurve<D> {
        &self.curve
    }

    pub fn into_curve(self) -> NurbsCurve<D> {
        self.curve
    }
}
