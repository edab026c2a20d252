use crate::curve::NurbsCurve;

/// Settings for the adaptive Gauss-Legendre quadrature behind
/// [`NurbsCurve::arclength_with`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quadrature {
    /// Absolute error target for the whole integral
    pub tolerance: f64,
    /// Gauss-Legendre nodes per panel
    pub nodes: usize,
    /// Maximum number of times a panel may be bisected
    pub max_depth: usize,
}

impl Default for Quadrature {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            nodes: 16,
            max_depth: 20,
        }
    }
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`
pub(crate) struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Finds the roots of the Legendre polynomial `P_n` by Newton iteration,
    /// starting from the Chebyshev approximation.
    pub(crate) fn new(n: usize) -> Self {
        let n = n.max(1);
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        for i in 0..n.div_ceil(2) {
            let mut z = ((i as f64 + 0.75) / (n as f64 + 0.5) * std::f64::consts::PI).cos();
            for _ in 0..100 {
                let (p, dp) = legendre(n, z);
                let step = p / dp;
                z -= step;
                if step.abs() < 1e-15 {
                    break;
                }
            }
            let (_, dp) = legendre(n, z);
            let w = 2.0 / ((1.0 - z * z) * dp * dp);
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }
        Self { nodes, weights }
    }

    /// Integrates `f` over `[a, b]` with a single panel
    pub(crate) fn apply<F: Fn(f64) -> f64>(&self, f: &F, a: f64, b: f64) -> f64 {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        half * self
            .nodes
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| w * f(mid + half * x))
            .sum::<f64>()
    }

    /// Integrates `f` over `[a, b]`, bisecting until the two halves agree
    /// with the whole panel. Returns the integral and whether the tolerance
    /// was met everywhere.
    pub(crate) fn adaptive<F: Fn(f64) -> f64>(
        &self,
        f: &F,
        a: f64,
        b: f64,
        tol: f64,
        depth: usize,
    ) -> (f64, bool) {
        let whole = self.apply(f, a, b);
        self.refine(f, a, b, whole, tol, depth)
    }

    fn refine<F: Fn(f64) -> f64>(
        &self,
        f: &F,
        a: f64,
        b: f64,
        whole: f64,
        tol: f64,
        depth: usize,
    ) -> (f64, bool) {
        let m = 0.5 * (a + b);
        let left = self.apply(f, a, m);
        let right = self.apply(f, m, b);
        let sum = left + right;
        if (sum - whole).abs() <= tol {
            return (sum, true);
        }
        if depth == 0 {
            return (sum, false);
        }
        let (l, l_ok) = self.refine(f, a, m, left, 0.5 * tol, depth - 1);
        let (r, r_ok) = self.refine(f, m, b, right, 0.5 * tol, depth - 1);
        (l + r, l_ok && r_ok)
    }
}

/// Evaluates `P_n(x)` and its derivative
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let next = ((2 * k - 1) as f64 * x * p - (k - 1) as f64 * p_prev) / k as f64;
        p_prev = p;
        p = next;
    }
    if n == 1 {
        return (x, 1.0);
    }
    (p, n as f64 * (x * p - p_prev) / (x * x - 1.0))
}

impl<const D: usize> NurbsCurve<D> {
    /// Length of the curve between `u_start` and `u_end`, using the default
    /// [`Quadrature`] settings.
    ///
    /// The sign follows the direction of integration.
    pub fn arclength(&self, u_start: f64, u_end: f64) -> f64 {
        self.arclength_with(u_start, u_end, &Quadrature::default())
    }

    /// Length of the whole curve
    pub fn total_arclength(&self) -> f64 {
        let (lo, hi) = self.domain();
        self.arclength(lo, hi)
    }

    /// Integrates the speed `|C'(u)|` from `u_start` to `u_end`.
    ///
    /// The interval is first split at the knots, where the speed may have a
    /// kink, and each piece is integrated adaptively.
    pub fn arclength_with(&self, u_start: f64, u_end: f64, quad: &Quadrature) -> f64 {
        let (lo, hi) = self.domain();
        let a = u_start.clamp(lo, hi);
        let b = u_end.clamp(lo, hi);
        if a == b {
            return 0.0;
        }
        let (a, b, sign) = if a < b { (a, b, 1.0) } else { (b, a, -1.0) };

        let mut breaks = vec![a];
        for k in self.knots().as_slice() {
            if *k > a && *k < b && breaks.last() != Some(k) {
                breaks.push(*k);
            }
        }
        breaks.push(b);

        let rule = GaussLegendre::new(quad.nodes);
        let speed = |u: f64| self.derivative(u, 1).norm();
        let pieces = (breaks.len() - 1) as f64;
        let mut total = 0.0;
        let mut converged = true;
        for w in breaks.windows(2) {
            let (len, ok) = rule.adaptive(&speed, w[0], w[1], quad.tolerance / pieces, quad.max_depth);
            total += len;
            converged &= ok;
        }
        if !converged {
            log::warn!(
                "arc length on [{a}, {b}] did not reach tolerance {} within depth {}",
                quad.tolerance,
                quad.max_depth
            );
        }
        sign * total
    }
}
