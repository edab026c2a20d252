#![allow(clippy::needless_range_loop)]
// The evaluation routines follow the algorithms of The NURBS Book, which use
// single-character and capitalized names everywhere, so we're matching their
// convention.
#![allow(non_snake_case)]

mod arc;
mod arclength;
mod curve;
mod error;
mod frenet;
mod knot_vector;
mod scalar;
mod surface;

use smallvec::SmallVec;
type VecF<T> = SmallVec<[T; 8]>;

pub use crate::arc::CircularArc;
pub use crate::arclength::Quadrature;
pub use crate::curve::{NurbsCurve, NurbsCurveBuilder};
pub use crate::error::{Error, Result};
pub use crate::frenet::FrenetFrame;
pub use crate::knot_vector::{BasisDerivatives, KnotVector};
pub use crate::scalar::Param;
pub use crate::surface::{NurbsSurface, NurbsSurfaceBuilder, SurfaceCurvature};

pub use num_complex::Complex64;
