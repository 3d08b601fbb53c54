//! Softmax cross-entropy head.
//!
//! Converts the final dense-layer output into per-class probabilities and a
//! scalar loss, and provides the initial backward gradient. Inference and
//! training use separate entry points: [`softmax_probabilities`] needs no
//! labels, [`softmax_cross_entropy`] requires them.

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// The true-class probability is squeezed toward 0.5 by this factor before
/// the log, which keeps an exact-zero probability out of `ln`. This is a
/// narrow guard, not an epsilon floor: probabilities below the clamp's
/// effective floor still produce very large losses.
const LOSS_CLAMP: f64 = 0.999_999_999_9;

/// Column-wise softmax, max-stabilized. Every output column sums to 1.
pub fn softmax_probabilities(z: &Matrix) -> Matrix {
    let mut probs = Matrix::zeros(z.rows(), z.cols());
    for col in 0..z.cols() {
        let mut max = f64::NEG_INFINITY;
        for row in 0..z.rows() {
            max = max.max(z.get(row, col));
        }
        let mut sum = 0.0;
        for row in 0..z.rows() {
            let e = (z.get(row, col) - max).exp();
            probs.set(row, col, e);
            sum += e;
        }
        let inv_sum = 1.0 / sum;
        for row in 0..z.rows() {
            probs.set(row, col, probs.get(row, col) * inv_sum);
        }
    }
    probs
}

/// Softmax plus mean cross-entropy over the batch:
/// `loss = -mean(ln((p - 0.5) * 0.9999999999 + 0.5))` over the true-class
/// probabilities. `labels` must be one per column, each in [0, rows).
pub fn softmax_cross_entropy(z: &Matrix, labels: &[usize]) -> Result<(Matrix, f64)> {
    if labels.len() != z.cols() {
        return Err(Error::shape(
            "softmax_cross_entropy labels",
            (1, z.cols()),
            (1, labels.len()),
        ));
    }
    let probs = softmax_probabilities(z);
    let mut total = 0.0;
    for (i, &y) in labels.iter().enumerate() {
        if y >= probs.rows() {
            return Err(Error::LabelOutOfRange {
                label: y,
                classes: probs.rows(),
            });
        }
        let p = probs.get(y, i);
        total += ((p - 0.5) * LOSS_CLAMP + 0.5).ln();
    }
    let loss = -total / labels.len() as f64;
    Ok((probs, loss))
}

/// Combined softmax + cross-entropy gradient: dZ = A with 1 subtracted at
/// each (y_i, i). Unnormalized by the batch size; the division by m happens
/// in the dense affine backward.
pub fn softmax_backward(labels: &[usize], probs: &Matrix) -> Result<Matrix> {
    if labels.len() != probs.cols() {
        return Err(Error::shape(
            "softmax_backward labels",
            (1, probs.cols()),
            (1, labels.len()),
        ));
    }
    let mut dz = probs.clone();
    for (i, &y) in labels.iter().enumerate() {
        if y >= dz.rows() {
            return Err(Error::LabelOutOfRange {
                label: y,
                classes: dz.rows(),
            });
        }
        dz.set(y, i, dz.get(y, i) - 1.0);
    }
    Ok(dz)
}
