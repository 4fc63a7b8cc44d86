//! Classical fourth order Runge-Kutta with a fixed step.
//! Use to approximate first order ODEs `y' = f(t, y; theta)`.

use nd::{Array, ArrayView, ArrayViewMut, Ix1};

use na_core::{Error, Result};

/// Scratch space for one integration, so the inner loop doesn't alloc.
#[derive(Debug, Clone)]
pub struct Workspace {
  k1: Array<f64, Ix1>,
  k2: Array<f64, Ix1>,
  k3: Array<f64, Ix1>,
  k4: Array<f64, Ix1>,
  tmp: Array<f64, Ix1>,
}
impl Workspace {
  pub fn new(n: usize) -> Workspace {
    Workspace {
      k1: Array::zeros(n),
      k2: Array::zeros(n),
      k3: Array::zeros(n),
      k4: Array::zeros(n),
      tmp: Array::zeros(n),
    }
  }
}

/// Advances `y` by one step of size `h` from `t`, in place.
pub fn step<F>(f: &F, t: f64, h: f64,
               mut y: ArrayViewMut<f64, Ix1>,
               theta: ArrayView<f64, Ix1>,
               ws: &mut Workspace)
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
{
  let half = 0.5 * h;

  f(t, y.view(), theta, ws.k1.view_mut());

  ws.tmp.assign(&y);
  ws.tmp.scaled_add(half, &ws.k1);
  f(t + half, ws.tmp.view(), theta, ws.k2.view_mut());

  ws.tmp.assign(&y);
  ws.tmp.scaled_add(half, &ws.k2);
  f(t + half, ws.tmp.view(), theta, ws.k3.view_mut());

  ws.tmp.assign(&y);
  ws.tmp.scaled_add(h, &ws.k3);
  f(t + h, ws.tmp.view(), theta, ws.k4.view_mut());

  let sixth = h / 6.0;
  y.scaled_add(sixth, &ws.k1);
  y.scaled_add(2.0 * sixth, &ws.k2);
  y.scaled_add(2.0 * sixth, &ws.k3);
  y.scaled_add(sixth, &ws.k4);
}

/// Integrates from `(t0, y0)` and writes the state at each of `times`
/// into `out`, flattened as `out[n * dim + d]`. Each output interval is
/// split into `substeps` equal RK4 steps.
pub fn integrate<F>(f: &F, t0: f64,
                    y0: ArrayView<f64, Ix1>,
                    theta: ArrayView<f64, Ix1>,
                    times: ArrayView<f64, Ix1>,
                    substeps: usize,
                    mut out: ArrayViewMut<f64, Ix1>) -> Result<()>
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
{
  let dim = y0.len();
  if out.len() != times.len() * dim {
    return Err(Error::mismatch("integration output length", times.len() * dim, out.len()));
  }
  let substeps = ::std::cmp::max(substeps, 1);

  let mut ws = Workspace::new(dim);
  let mut y = y0.to_owned();
  let mut t = t0;
  for (n, &target) in times.iter().enumerate() {
    let h = (target - t) / substeps as f64;
    for _ in 0..substeps {
      step(f, t, h, y.view_mut(), theta, &mut ws);
      t += h;
    }
    t = target;

    if y.iter().any(|v| !v.is_finite()) {
      return Err(Error::NumericalFailure(format!("integration diverged before t = {}", target)));
    }
    out.slice_mut(s![n * dim..(n + 1) * dim])
      .assign(&y);
  }

  Ok(())
}
