//! Explicit Runge-Kutta integrators for real or complex state vectors.
//!
//! Solutions are stored with time along the last axis. Neither integrator
//! renormalizes the state; conservation laws are left to the generator.

use ndarray as nd;
use ndarray_linalg::Scalar;
use serde::{ Deserialize, Serialize };
use tracing::debug;
use crate::error::{ IntegrationError, Result, SetupError };

/// Choice of integration scheme.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Integrator {
    /// Classical fourth-order Runge-Kutta with fixed step size `dt`.
    ///
    /// Steps are shortened uniformly where needed to land on evaluation
    /// times.
    Rk4 {
        dt: f64,
    },
    /// Adaptive Dormand-Prince 5(4) with error control
    /// `|err_i| <= atol + rtol * |y_i|` (RMS norm).
    Rk45 {
        rtol: f64,
        atol: f64,
        #[serde(default)]
        first_step: Option<f64>,
        #[serde(default)]
        max_step: Option<f64>,
        #[serde(default = "default_max_steps")]
        max_steps: usize,
    },
}

fn default_max_steps() -> usize { 1_000_000 }

impl Default for Integrator {
    fn default() -> Self { Self::rk45(1e-6, 1e-8) }
}

impl Integrator {
    pub fn rk4(dt: f64) -> Self { Self::Rk4 { dt } }

    pub fn rk45(rtol: f64, atol: f64) -> Self {
        Self::Rk45 {
            rtol,
            atol,
            first_step: None,
            max_step: None,
            max_steps: default_max_steps(),
        }
    }

    /// Set the step limit of an adaptive integrator; no-op for fixed step.
    pub fn with_max_steps(mut self, n: usize) -> Self {
        if let Self::Rk45 { max_steps, .. } = &mut self { *max_steps = n; }
        self
    }

    /// Set the maximum step size of an adaptive integrator; no-op for fixed
    /// step.
    pub fn with_max_step(mut self, h: f64) -> Self {
        if let Self::Rk45 { max_step, .. } = &mut self { *max_step = Some(h); }
        self
    }

    /// Set the first trial step of an adaptive integrator; no-op for fixed
    /// step.
    pub fn with_first_step(mut self, h: f64) -> Self {
        if let Self::Rk45 { first_step, .. } = &mut self { *first_step = Some(h); }
        self
    }

    pub(crate) fn check(&self) -> std::result::Result<(), IntegrationError> {
        match *self {
            Self::Rk4 { dt } => IntegrationError::check_positive("dt", dt),
            Self::Rk45 { rtol, atol, first_step, max_step, max_steps } => {
                IntegrationError::check_positive("rtol", rtol)?;
                IntegrationError::check_positive("atol", atol)?;
                if let Some(h) = first_step {
                    IntegrationError::check_positive("first_step", h)?;
                }
                if let Some(h) = max_step {
                    IntegrationError::check_positive("max_step", h)?;
                }
                IntegrationError::check_positive("max_steps", max_steps as f64)
            },
        }
    }
}

/// Counters collected during one integration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OdeStats {
    pub steps: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

/// Output of [`solve`]: times `t` and states `y` of shape `(n_var, n_t)`.
#[derive(Clone, Debug, PartialEq)]
pub struct OdeSolution<A> {
    pub t: nd::Array1<f64>,
    pub y: nd::Array2<A>,
    pub stats: OdeStats,
}

fn check_eval(t_span: (f64, f64), t_eval: &nd::Array1<f64>)
    -> std::result::Result<(), SetupError>
{
    let (t0, t1) = t_span;
    let tol = 1e-12 * (t0.abs().max(t1.abs())).max(1.0);
    let in_range = t_eval.iter()
        .all(|t| t.is_finite() && *t >= t0 - tol && *t <= t1 + tol);
    let ascending = t_eval.iter().zip(t_eval.iter().skip(1))
        .all(|(a, b)| b > a);
    (!t_eval.is_empty() && in_range && ascending)
        .then_some(())
        .ok_or(SetupError::BadEvalTimes(t0, t1))
}

fn is_finite<A: Scalar<Real = f64>>(y: &nd::Array1<A>) -> bool {
    y.iter().all(|x| x.re().is_finite() && x.im().is_finite())
}

fn collect<A>(samples: Vec<(f64, nd::Array1<A>)>, n: usize, stats: OdeStats)
    -> OdeSolution<A>
where A: Scalar
{
    let mut t: nd::Array1<f64> = nd::Array1::zeros(samples.len());
    let mut y: nd::Array2<A> = nd::Array2::zeros((n, samples.len()));
    let iter
        = samples.into_iter()
        .zip(t.iter_mut().zip(y.axis_iter_mut(nd::Axis(1))));
    for ((tk, yk), (t_out, y_out)) in iter {
        *t_out = tk;
        yk.move_into(y_out);
    }
    OdeSolution { t, y, stats }
}

/// Integrate `dy/dt = rhs(t, y)` over `t_span` from `y0`.
///
/// If `t_eval` is given, the solution is recorded exactly at those times (which
/// must be ascending and lie within `t_span`); otherwise every step is
/// recorded, including the initial state.
pub fn solve<A, F>(
    mut rhs: F,
    t_span: (f64, f64),
    y0: &nd::Array1<A>,
    t_eval: Option<&nd::Array1<f64>>,
    method: &Integrator,
) -> Result<OdeSolution<A>>
where
    A: Scalar<Real = f64>,
    F: FnMut(f64, &nd::Array1<A>) -> Result<nd::Array1<A>>,
{
    SetupError::check_span(t_span)?;
    if let Some(te) = t_eval { check_eval(t_span, te)?; }
    method.check()?;
    let sol = match *method {
        Integrator::Rk4 { dt }
            => rk4(&mut rhs, t_span, y0, t_eval, dt)?,
        Integrator::Rk45 { rtol, atol, first_step, max_step, max_steps }
            => rk45(
                &mut rhs,
                t_span,
                y0,
                t_eval,
                Rk45Params { rtol, atol, first_step, max_step, max_steps },
            )?,
    };
    debug!(
        steps = sol.stats.steps,
        rejected = sol.stats.rejected,
        evaluations = sol.stats.evaluations,
        "integration finished",
    );
    Ok(sol)
}

/* fixed step *****************************************************************/

fn rk4_step<A, F>(
    rhs: &mut F,
    t: f64,
    y: &nd::Array1<A>,
    h: f64,
    stats: &mut OdeStats,
) -> Result<nd::Array1<A>>
where
    A: Scalar<Real = f64>,
    F: FnMut(f64, &nd::Array1<A>) -> Result<nd::Array1<A>>,
{
    let half = A::from_real(h / 2.0);
    let k1 = rhs(t, y)?;
    let mut z = y.clone();
    z.scaled_add(half, &k1);
    let k2 = rhs(t + h / 2.0, &z)?;
    let mut z = y.clone();
    z.scaled_add(half, &k2);
    let k3 = rhs(t + h / 2.0, &z)?;
    let mut z = y.clone();
    z.scaled_add(A::from_real(h), &k3);
    let k4 = rhs(t + h, &z)?;
    stats.evaluations += 4;
    stats.steps += 1;
    let mut y_new = y.clone();
    y_new.scaled_add(A::from_real(h / 6.0), &k1);
    y_new.scaled_add(A::from_real(h / 3.0), &k2);
    y_new.scaled_add(A::from_real(h / 3.0), &k3);
    y_new.scaled_add(A::from_real(h / 6.0), &k4);
    if !is_finite(&y_new) {
        return Err(IntegrationError::NonFinite(t + h).into());
    }
    Ok(y_new)
}

fn rk4<A, F>(
    rhs: &mut F,
    t_span: (f64, f64),
    y0: &nd::Array1<A>,
    t_eval: Option<&nd::Array1<f64>>,
    dt: f64,
) -> Result<OdeSolution<A>>
where
    A: Scalar<Real = f64>,
    F: FnMut(f64, &nd::Array1<A>) -> Result<nd::Array1<A>>,
{
    let (t0, t1) = t_span;
    let targets: Vec<f64> = match t_eval {
        Some(te) => te.to_vec(),
        None => {
            let n = ((t1 - t0) / dt).ceil() as usize;
            (0..=n).map(|k| (t0 + k as f64 * dt).min(t1)).collect()
        },
    };
    let mut stats = OdeStats::default();
    let mut samples: Vec<(f64, nd::Array1<A>)>
        = Vec::with_capacity(targets.len());
    let mut t = t0;
    let mut y = y0.clone();
    for &target in targets.iter() {
        let span = target - t;
        if span > 0.0 {
            let n = (span / dt - 1e-9).ceil().max(1.0) as usize;
            let h = span / n as f64;
            for k in 0..n {
                y = rk4_step(rhs, t + k as f64 * h, &y, h, &mut stats)?;
            }
            t = target;
        }
        if samples.last().map_or(true, |(tl, _)| *tl < target) {
            samples.push((target, y.clone()));
        }
    }
    Ok(collect(samples, y0.len(), stats))
}

/* adaptive step **************************************************************/

struct Rk45Params {
    rtol: f64,
    atol: f64,
    first_step: Option<f64>,
    max_step: Option<f64>,
    max_steps: usize,
}

const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4]
    = [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
// fifth-order weights; also the last row of the tableau (FSAL)
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
// difference between fifth- and fourth-order weights
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 5.0;

fn combine<A>(y: &nd::Array1<A>, h: f64, coeffs: &[f64], k: &[nd::Array1<A>])
    -> nd::Array1<A>
where A: Scalar<Real = f64>
{
    let mut z = y.clone();
    for (c, kj) in coeffs.iter().zip(k) {
        if *c != 0.0 { z.scaled_add(A::from_real(h * c), kj); }
    }
    z
}

fn rms_scaled<A>(v: &nd::Array1<A>, y: &nd::Array1<A>, y2: &nd::Array1<A>, p: &Rk45Params)
    -> f64
where A: Scalar<Real = f64>
{
    let n = v.len().max(1) as f64;
    let sum: f64
        = v.iter().zip(y).zip(y2)
        .map(|((vi, yi), y2i)| {
            let sc = p.atol + p.rtol * yi.abs().max(y2i.abs());
            (vi.abs() / sc).powi(2)
        })
        .sum();
    (sum / n).sqrt()
}

fn initial_step<A, F>(
    rhs: &mut F,
    t0: f64,
    y0: &nd::Array1<A>,
    f0: &nd::Array1<A>,
    p: &Rk45Params,
    stats: &mut OdeStats,
) -> Result<f64>
where
    A: Scalar<Real = f64>,
    F: FnMut(f64, &nd::Array1<A>) -> Result<nd::Array1<A>>,
{
    let d0 = rms_scaled(y0, y0, y0, p);
    let d1 = rms_scaled(f0, y0, y0, p);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    let mut y1 = y0.clone();
    y1.scaled_add(A::from_real(h0), f0);
    let f1 = rhs(t0 + h0, &y1)?;
    stats.evaluations += 1;
    let df = &f1 - f0;
    let d2 = rms_scaled(&df, y0, y0, p) / h0;
    let h1 = if d1.max(d2) <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(0.2)
    };
    Ok((100.0 * h0).min(h1))
}

fn rk45<A, F>(
    rhs: &mut F,
    t_span: (f64, f64),
    y0: &nd::Array1<A>,
    t_eval: Option<&nd::Array1<f64>>,
    p: Rk45Params,
) -> Result<OdeSolution<A>>
where
    A: Scalar<Real = f64>,
    F: FnMut(f64, &nd::Array1<A>) -> Result<nd::Array1<A>>,
{
    let (t0, t1) = t_span;
    let t_end = t_eval.and_then(|te| te.last().copied()).unwrap_or(t1).min(t1);
    let max_step = p.max_step.unwrap_or(f64::INFINITY);
    let mut stats = OdeStats::default();
    let mut samples: Vec<(f64, nd::Array1<A>)> = Vec::new();
    let mut eval_iter = t_eval.map(|te| te.iter().copied().peekable());

    // record anything requested at the start
    match eval_iter.as_mut() {
        Some(it) => {
            while let Some(te) = it.next_if(|te| *te <= t0) {
                samples.push((te, y0.clone()));
            }
        },
        None => { samples.push((t0, y0.clone())); },
    }

    let mut t = t0;
    let mut y = y0.clone();
    let mut f = rhs(t, &y)?;
    stats.evaluations += 1;
    let mut h = match p.first_step {
        Some(h) => h,
        None => initial_step(rhs, t0, &y, &f, &p, &mut stats)?,
    }
    .min(max_step);
    let mut k: Vec<nd::Array1<A>> = Vec::with_capacity(7);

    while t < t_end {
        if stats.steps >= p.max_steps {
            return Err(IntegrationError::StepLimit(p.max_steps, t).into());
        }
        // next stop: the next evaluation time or the end of the span
        let stop = eval_iter.as_mut()
            .and_then(|it| it.peek().copied())
            .unwrap_or(t_end)
            .min(t_end);
        let mut step_rejected = false;
        loop {
            let min_h = 10.0 * f64::EPSILON * t.abs().max(1.0);
            if h < min_h {
                return Err(IntegrationError::StepSizeUnderflow(t, h).into());
            }
            let lands = t + h >= stop;
            let h_try = if lands { stop - t } else { h };

            k.clear();
            k.push(f.clone());
            let rows: [&[f64]; 5] = [&A2, &A3, &A4, &A5, &A6];
            for (j, row) in rows.iter().enumerate() {
                let z = combine(&y, h_try, row, &k);
                k.push(rhs(t + C[j + 1] * h_try, &z)?);
            }
            let y_new = combine(&y, h_try, &B, &k);
            let f_new = rhs(t + h_try, &y_new)?;
            k.push(f_new);
            stats.evaluations += 6;

            let err_vec = combine(&nd::Array1::zeros(y.len()), h_try, &E, &k);
            let err = rms_scaled(&err_vec, &y, &y_new, &p);
            if !err.is_finite() || !is_finite(&y_new) {
                if h_try <= min_h {
                    return Err(IntegrationError::NonFinite(t + h_try).into());
                }
                h = h_try * FAC_MIN;
                stats.rejected += 1;
                step_rejected = true;
                continue;
            }
            if err <= 1.0 {
                let fac = if err == 0.0 {
                    FAC_MAX
                } else {
                    (SAFETY * err.powf(-0.2)).clamp(FAC_MIN, FAC_MAX)
                };
                let fac = if step_rejected { fac.min(1.0) } else { fac };
                // keep the unclipped step size when landing on a stop early
                let h_base = if lands { h.max(h_try) } else { h_try };
                h = (h_base * fac).min(max_step);
                t = if lands { stop } else { t + h_try };
                y = y_new;
                f = k.pop().unwrap_or_else(|| nd::Array1::zeros(y.len()));
                stats.steps += 1;
                break;
            }
            h = h_try * (SAFETY * err.powf(-0.2)).max(FAC_MIN);
            stats.rejected += 1;
            step_rejected = true;
        }
        match eval_iter.as_mut() {
            Some(it) => {
                while let Some(te) = it.next_if(|te| *te <= t) {
                    samples.push((te, y.clone()));
                }
            },
            None => { samples.push((t, y.clone())); },
        }
    }
    Ok(collect(samples, y0.len(), stats))
}
