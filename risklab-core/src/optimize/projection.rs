//! Euclidean projection onto bounds, budget and one linear equality.
//!
//! The projection of `v` onto `{l ≤ x ≤ u, Σx = s, a·x = t}` is
//! `clamp(v − τ − λa, l, u)` for the multipliers τ and λ that restore both
//! equalities. For a fixed λ the sum is non-increasing in τ, and with τ
//! re-solved `a·x` is non-increasing in λ, so each multiplier is a root of a
//! monotone piecewise-linear function. Either equality may be absent.

use super::problem::{dot, Bounds, ConstrainedProblem, Constraint};
use super::solver::SolverError;

const ROOT_STEPS: usize = 200;
const ROOT_TOLERANCE: f64 = 1e-14;
const BRACKET_DOUBLINGS: usize = 64;

/// The linear equality enforced by projection.
#[derive(Debug, Clone)]
struct Equality<'p> {
    index: usize,
    coefficients: &'p [f64],
    rhs: f64,
}

/// Projects points onto `{l ≤ x ≤ u}`, intersected with `{Σx = budget}` and
/// the problem's first linear equality when present.
#[derive(Debug, Clone)]
pub(crate) struct Projector<'p> {
    bounds: &'p [Bounds],
    budget: Option<f64>,
    equality: Option<Equality<'p>>,
}

impl<'p> Projector<'p> {
    /// Fails with `Infeasible` when the budget or the equality cannot be met
    /// inside the bounds.
    pub(crate) fn new(problem: &'p ConstrainedProblem<'_>) -> Result<Self, SolverError> {
        let bounds = problem.bounds();
        let budget = problem.budget();
        if let Some(total) = budget {
            let lo: f64 = bounds.iter().map(|b| b.lower).sum();
            let hi: f64 = bounds.iter().map(|b| b.upper).sum();
            let slack = 1e-12 * (1.0 + total.abs());
            if total < lo - slack || total > hi + slack {
                return Err(SolverError::Infeasible {
                    reason: format!("budget {total} outside achievable range [{lo}, {hi}]"),
                });
            }
        }

        let first_equality = problem
            .constraints()
            .iter()
            .enumerate()
            .find_map(|(index, c)| match c {
                Constraint::LinearEquality { coefficients, rhs } => {
                    Some((index, coefficients.as_slice(), *rhs))
                }
                _ => None,
            });
        let equality = match first_equality {
            Some((index, coefficients, rhs)) => {
                let (lo, hi) = attainable_range(coefficients, bounds, budget);
                let slack = 1e-12 * (1.0 + rhs.abs());
                if rhs < lo - slack || rhs > hi + slack {
                    return Err(SolverError::Infeasible {
                        reason: format!(
                            "linear equality rhs {rhs} outside achievable range [{lo}, {hi}]"
                        ),
                    });
                }
                Some(Equality {
                    index,
                    coefficients,
                    rhs: rhs.clamp(lo, hi),
                })
            }
            None => None,
        };

        Ok(Self {
            bounds,
            budget,
            equality,
        })
    }

    /// Position in the problem's constraint list of the equality enforced here.
    pub(crate) fn equality_index(&self) -> Option<usize> {
        self.equality.as_ref().map(|e| e.index)
    }

    pub(crate) fn project(&self, v: &[f64], out: &mut [f64]) {
        let Some(eq) = &self.equality else {
            self.project_tilted(v, 0.0, out);
            return;
        };
        let tolerance = ROOT_TOLERANCE * (1.0 + eq.rhs.abs());
        let lambda = {
            let mut attained = |lambda: f64| {
                self.project_tilted(v, lambda, out);
                dot(eq.coefficients, out)
            };
            let (lo, hi) = bracket(&mut attained, eq.rhs, tolerance);
            refine(&mut attained, eq.rhs, lo, hi, tolerance)
        };
        self.project_tilted(v, lambda, out);
    }

    /// Projection of `v − λa` onto the bounds and budget only.
    fn project_tilted(&self, v: &[f64], lambda: f64, out: &mut [f64]) {
        match &self.equality {
            Some(eq) => {
                for ((o, x), a) in out.iter_mut().zip(v).zip(eq.coefficients) {
                    *o = x - lambda * a;
                }
            }
            None => out.copy_from_slice(v),
        }
        match self.budget {
            Some(total) => shift_onto_budget(out, self.bounds, total),
            None => clamp_box(out, self.bounds),
        }
    }
}

// ─── One-dimensional pieces ─────────────────────────────────────────

fn clamp_box(w: &mut [f64], bounds: &[Bounds]) {
    for (x, b) in w.iter_mut().zip(bounds) {
        *x = x.clamp(b.lower, b.upper);
    }
}

/// Replace `w` by `clamp(w − τ, l, u)` with τ chosen so the sum is `total`.
fn shift_onto_budget(w: &mut [f64], bounds: &[Bounds], total: f64) {
    let tau = {
        let values: &[f64] = w;
        let sum_at = |tau: f64| -> f64 {
            values
                .iter()
                .zip(bounds)
                .map(|(x, b)| (x - tau).clamp(b.lower, b.upper))
                .sum()
        };
        // At lo every coordinate sits at its upper bound, at hi at its lower.
        let lo = values
            .iter()
            .zip(bounds)
            .map(|(x, b)| x - b.upper)
            .fold(f64::INFINITY, f64::min);
        let hi = values
            .iter()
            .zip(bounds)
            .map(|(x, b)| x - b.lower)
            .fold(f64::NEG_INFINITY, f64::max);
        refine(sum_at, total, lo, hi, ROOT_TOLERANCE * (1.0 + total.abs()))
    };
    for (x, b) in w.iter_mut().zip(bounds) {
        *x = (*x - tau).clamp(b.lower, b.upper);
    }
}

/// Interval `[lo, hi]` with `f(lo) ≥ target ≥ f(hi)` for a non-increasing
/// `f`, grown by doubling away from zero.
fn bracket(mut f: impl FnMut(f64) -> f64, target: f64, tolerance: f64) -> (f64, f64) {
    let at_zero = f(0.0);
    if (at_zero - target).abs() <= tolerance {
        return (0.0, 0.0);
    }
    let mut step = 1.0;
    if at_zero > target {
        let mut lo = 0.0;
        for _ in 0..BRACKET_DOUBLINGS {
            if f(step) <= target + tolerance {
                return (lo, step);
            }
            lo = step;
            step *= 2.0;
        }
        (lo, lo)
    } else {
        let mut hi = 0.0;
        for _ in 0..BRACKET_DOUBLINGS {
            if f(-step) >= target - tolerance {
                return (-step, hi);
            }
            hi = -step;
            step *= 2.0;
        }
        (hi, hi)
    }
}

/// Root of a non-increasing `f` inside `[lo, hi]`.
///
/// Alternates secant and bisection steps. On a piecewise-linear `f` the
/// secant step lands on the root once the bracket spans a single piece.
fn refine(
    mut f: impl FnMut(f64) -> f64,
    target: f64,
    mut lo: f64,
    mut hi: f64,
    tolerance: f64,
) -> f64 {
    let (mut f_lo, mut f_hi) = (f(lo), f(hi));
    for step in 0..ROOT_STEPS {
        if f_lo - target <= tolerance {
            return lo;
        }
        if target - f_hi <= tolerance {
            return hi;
        }
        let mid = 0.5 * (lo + hi);
        let secant = lo + (f_lo - target) / (f_lo - f_hi) * (hi - lo);
        let x = if step % 2 == 0 && secant > lo && secant < hi {
            secant
        } else {
            mid
        };
        if x <= lo || x >= hi {
            break;
        }
        let fx = f(x);
        if fx >= target {
            lo = x;
            f_lo = fx;
        } else {
            hi = x;
            f_hi = fx;
        }
    }
    if (f_lo - target).abs() <= (target - f_hi).abs() {
        lo
    } else {
        hi
    }
}

/// Smallest and largest `a·x` over the bounds, and the budget when present.
fn attainable_range(a: &[f64], bounds: &[Bounds], budget: Option<f64>) -> (f64, f64) {
    let Some(total) = budget else {
        return a.iter().zip(bounds).fold((0.0, 0.0), |(lo, hi), (c, b)| {
            let (p, q) = (c * b.lower, c * b.upper);
            (lo + p.min(q), hi + p.max(q))
        });
    };

    // Fill from the lower bounds, spending the remaining budget on the
    // cheapest (or dearest) coefficients first.
    let fill = |descending: bool| -> f64 {
        let mut order: Vec<usize> = (0..a.len()).collect();
        order.sort_by(|&i, &j| a[i].total_cmp(&a[j]));
        if descending {
            order.reverse();
        }
        let mut remaining = total - bounds.iter().map(|b| b.lower).sum::<f64>();
        let mut value: f64 = a.iter().zip(bounds).map(|(c, b)| c * b.lower).sum();
        for i in order {
            let add = remaining.min(bounds[i].upper - bounds[i].lower).max(0.0);
            value += a[i] * add;
            remaining -= add;
        }
        value
    };
    (fill(false), fill(true))
}
