//! Parameter initialization and the decayed-learning-rate descent step.
//!
//! Vanilla gradient descent, no momentum. The effective rate for an epoch is
//! `alpha = learning_rate / (1 + decay_rate * epoch)`; the convolution update
//! reuses the alpha computed for the dense update so both parameter stores
//! step at the same size within an epoch.

use crate::error::{Error, Result};
use crate::layers::conv::{ConvGradients, ConvParams};
use crate::layers::dense::{DenseGradients, DenseParam};
use crate::utils::SimpleRng;

/// Deterministic seeded initialization of the dense stack and filter bank.
///
/// `net_dims` lists every layer width including the 3125 input and 10 output;
/// layer l maps `net_dims[l] -> net_dims[l + 1]`. All weights and biases are
/// Gaussian draws scaled by 0.01, dense layers first, then the five filters.
pub fn initialize_parameters(
    net_dims: &[usize],
    rng: &mut SimpleRng,
) -> Result<(Vec<DenseParam>, ConvParams)> {
    if net_dims.len() < 2 {
        return Err(Error::Configuration(format!(
            "network needs at least input and output dimensions, got {:?}",
            net_dims
        )));
    }
    if net_dims.iter().any(|&d| d == 0) {
        return Err(Error::Configuration(format!(
            "network dimensions must be positive, got {:?}",
            net_dims
        )));
    }
    let dense = net_dims
        .windows(2)
        .map(|pair| DenseParam::init(pair[1], pair[0], rng))
        .collect();
    let conv = ConvParams::init(rng);
    Ok((dense, conv))
}

/// alpha = learning_rate / (1 + decay_rate * epoch).
pub fn effective_rate(learning_rate: f64, decay_rate: f64, epoch: usize) -> f64 {
    learning_rate / (1.0 + decay_rate * epoch as f64)
}

/// Decayed-rate descent over every dense weight and bias. Returns the
/// effective rate used, for reuse by [`update_conv`] within the same epoch.
pub fn update_dense(
    params: &mut [DenseParam],
    gradients: &DenseGradients,
    epoch: usize,
    learning_rate: f64,
    decay_rate: f64,
) -> Result<f64> {
    if gradients.layers.len() != params.len() {
        return Err(Error::shape(
            "update_dense",
            (params.len(), 1),
            (gradients.layers.len(), 1),
        ));
    }
    let alpha = effective_rate(learning_rate, decay_rate, epoch);
    for (param, gradient) in params.iter_mut().zip(&gradients.layers) {
        param.weights.sub_scaled(&gradient.dw, alpha)?;
        param.biases.sub_scaled(&gradient.db, alpha)?;
    }
    Ok(alpha)
}

/// The same decrement rule applied to the five filters and biases.
pub fn update_conv(params: &mut ConvParams, gradients: &ConvGradients, alpha: f64) {
    for (filter, gradient) in params.filters.iter_mut().zip(gradients) {
        for (w_row, g_row) in filter.weights.iter_mut().zip(&gradient.dw) {
            for (w, &g) in w_row.iter_mut().zip(g_row) {
                *w -= alpha * g;
            }
        }
        filter.bias -= alpha * gradient.db;
    }
}
