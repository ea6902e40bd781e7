//! Savitzky–Golay smoothing and differentiation.
//!
//! Coefficients come from the least-squares fit of a degree-`p` polynomial over a centered
//! window. Edges replicate the nearest sample (no reflection, which rings at t = 0).

use super::Filtered;
use crate::error::{EngineError, Result};

/// Smallest window accepted when differentiating.
pub const MIN_DERIVATIVE_WINDOW: usize = 5;

/// Convolution weights for the centre point of a `window`-wide fit.
///
/// `derivative` selects the returned polynomial coefficient (0 smooths, 1 returns the slope
/// per sample). Scaling by the true sample spacing is left to the caller.
pub fn coefficients(window: usize, poly_order: usize, derivative: usize) -> Result<Vec<f64>> {
    validate(window, poly_order, derivative)?;
    let half = (window / 2) as i64;
    let terms = poly_order + 1;

    // Normal matrix (A^T A) of the Vandermonde design A[i][k] = x_i^k, x_i in -half..=half.
    let mut normal = vec![vec![0.0; terms]; terms];
    for (r, row) in normal.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (-half..=half).map(|x| (x as f64).powi((r + c) as i32)).sum();
        }
    }
    // Solve (A^T A) g = e_d; the weights are then A g.
    let mut rhs = vec![0.0; terms];
    rhs[derivative] = 1.0;
    let g = solve(normal, rhs).ok_or_else(|| EngineError::InvalidWindow {
        window,
        reason: format!("singular fit for polynomial order {poly_order}"),
    })?;

    let factorial: f64 = (1..=derivative).map(|k| k as f64).product();
    Ok((-half..=half)
        .map(|x| {
            let xf = x as f64;
            factorial * g.iter().enumerate().map(|(k, gk)| gk * xf.powi(k as i32)).sum::<f64>()
        })
        .collect())
}

/// Smooth `data` with a `window`-point, degree-`poly_order` fit.
pub fn smooth(data: &[f64], window: usize, poly_order: usize) -> Result<Filtered> {
    let weights = coefficients(window, poly_order, 0)?;
    Ok(Filtered::plain(convolve_replicated(data, &weights)))
}

/// First derivative in units per second; `dt_s` is the true sample spacing.
pub fn differentiate(data: &[f64], window: usize, poly_order: usize, dt_s: f64) -> Result<Filtered> {
    if !(dt_s > 0.0) || !dt_s.is_finite() {
        return Err(EngineError::DegenerateTimebase(format!(
            "sample spacing {dt_s} s"
        )));
    }
    let weights = coefficients(window, poly_order, 1)?;
    let mut out = convolve_replicated(data, &weights);
    for v in &mut out {
        *v /= dt_s;
    }
    Ok(Filtered::plain(out))
}

fn validate(window: usize, poly_order: usize, derivative: usize) -> Result<()> {
    let invalid = |reason: String| Err(EngineError::InvalidWindow { window, reason });
    if window % 2 == 0 {
        return invalid("window must be odd".into());
    }
    let min = if derivative > 0 { MIN_DERIVATIVE_WINDOW } else { 3 };
    if window < min {
        return invalid(format!("window must be at least {min}"));
    }
    if poly_order >= window {
        return invalid(format!("polynomial order {poly_order} must be below the window"));
    }
    if derivative > poly_order {
        return invalid(format!(
            "derivative {derivative} exceeds polynomial order {poly_order}"
        ));
    }
    Ok(())
}

fn convolve_replicated(data: &[f64], weights: &[f64]) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (weights.len() / 2) as isize;
    let last = n as isize - 1;
    (0..n as isize)
        .map(|i| {
            weights
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let j = (i + k as isize - half).clamp(0, last) as usize;
                    w * data[j]
                })
                .sum()
        })
        .collect()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut m: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&r1, &r2| m[r1][col].abs().total_cmp(&m[r2][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / m[row][row];
    }
    Some(x)
}
