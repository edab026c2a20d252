use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("at least one control point is required")]
    EmptyControlPoints,

    #[error("knot vector has {actual} entries, expected {expected}")]
    KnotCount { expected: usize, actual: usize },

    #[error("knot {index} is smaller than the knot before it")]
    KnotsNotMonotonic { index: usize },

    #[error("knot {index} is not finite")]
    NonFiniteKnot { index: usize },

    /// End knots may repeat `degree + 1` times, interior knots `degree`
    /// times.
    #[error("knot {knot} is repeated {multiplicity} times (at most {max} allowed)")]
    KnotMultiplicity {
        knot: f64,
        multiplicity: usize,
        max: usize,
    },

    #[error("knot vector spans an empty parameter domain")]
    DegenerateKnotDomain,

    #[error("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },

    #[error("weight {index} must be positive and finite, got {weight}")]
    NonPositiveWeight { index: usize, weight: f64 },

    #[error("degree {degree} is out of range (at most {max})")]
    DegreeOutOfRange { degree: usize, max: usize },

    #[error("control grid is {actual:?}, expected {expected:?}")]
    GridShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid circular arc: {0}")]
    InvalidArc(String),

    /// The geometry is degenerate at this parameter, e.g. the tangent of a
    /// curve with a stationary point.
    #[error("{quantity} is undefined at u = {u}")]
    Undefined { quantity: &'static str, u: f64 },

    #[error("{quantity} is undefined at (u, v) = ({u}, {v})")]
    UndefinedOnSurface {
        quantity: &'static str,
        u: f64,
        v: f64,
    },
}
