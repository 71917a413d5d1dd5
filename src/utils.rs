//! Numeric helpers shared by the recurrent cells.

use ndarray::{ArrayBase, Data, Dimension};

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Hyperbolic tangent activation
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Half-width of the uniform initialization range, 1/√hidden_size
pub fn init_bound(hidden_size: usize) -> f64 {
    1.0 / (hidden_size as f64).sqrt()
}

/// Maximum of two values where NaN wins over any number
pub fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Largest absolute elementwise difference between two arrays of equal shape.
///
/// Returns `None` when the shapes differ and NaN when any pair differs by NaN.
pub fn max_abs_diff<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Option<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if a.shape() != b.shape() {
        return None;
    }
    Some(
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, nan_max),
    )
}
