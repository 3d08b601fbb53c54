//! Fully-connected layer stack: affine transforms composed with activations.
//!
//! The network applies L-1 ReLU layers followed by one linear output layer.
//! Each forward call produces a [`LayerRecord`] (the layer input plus the
//! activation record); the records are collected in forward order and consumed
//! by value, in reverse, by [`network_backward`]. Gradients are averaged over
//! the batch because the loss is a mean, not a sum.

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::utils::activations::{Activation, ActivationRecord};
use crate::utils::SimpleRng;

/// Weights and bias of one fully-connected layer.
///
/// `weights` is (out, in); `biases` is (out, 1), broadcast across the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseParam {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl DenseParam {
    /// Gaussian initialization scaled by 0.01 for both weights and biases.
    pub fn init(out_size: usize, in_size: usize, rng: &mut SimpleRng) -> Self {
        let weights = Matrix::from_fn(out_size, in_size, || rng.next_gaussian() * 0.01);
        let biases = Matrix::from_fn(out_size, 1, || rng.next_gaussian() * 0.01);
        Self { weights, biases }
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.rows() * self.weights.cols() + self.biases.rows()
    }
}

/// Forward-pass record of one layer: the input it saw plus its activation
/// record. Write-once in the forward pass, read-once in the backward pass.
#[derive(Debug)]
pub struct LayerRecord {
    input: Matrix,
    activation: ActivationRecord,
}

/// Gradients of one layer's parameters.
#[derive(Debug, Clone)]
pub struct LayerGradient {
    pub dw: Matrix,
    pub db: Matrix,
}

/// Gradients of the whole dense stack, in forward layer order, plus the
/// gradient flowing back into the convolution stage.
#[derive(Debug)]
pub struct DenseGradients {
    pub layers: Vec<LayerGradient>,
    pub d_input: Matrix,
}

/// Z = W * A_prev + b with broadcast bias.
///
/// Fails with `ShapeMismatch` when `W.cols != A_prev.rows` or the bias is not
/// an (out, 1) column.
pub fn affine_forward(a_prev: &Matrix, w: &Matrix, b: &Matrix) -> Result<Matrix> {
    if w.cols() != a_prev.rows() {
        return Err(Error::shape(
            "affine_forward",
            (w.cols(), a_prev.cols()),
            a_prev.shape(),
        ));
    }
    let mut z = w.matmul(a_prev)?;
    z.add_column(b)?;
    Ok(z)
}

/// Affine forward composed with an activation. The record owns `a_prev`.
pub fn layer_forward(
    a_prev: Matrix,
    param: &DenseParam,
    activation: Activation,
) -> Result<(Matrix, LayerRecord)> {
    let z = affine_forward(&a_prev, &param.weights, &param.biases)?;
    let (a, act_record) = activation.forward(z);
    Ok((
        a,
        LayerRecord {
            input: a_prev,
            activation: act_record,
        },
    ))
}

/// Forward pass through the full stack: L-1 ReLU layers, then one linear
/// output layer. Returns the pre-softmax output and the per-layer records in
/// forward order.
pub fn network_forward(x: Matrix, params: &[DenseParam]) -> Result<(Matrix, Vec<LayerRecord>)> {
    if params.is_empty() {
        return Err(Error::Configuration(
            "dense network needs at least one layer".into(),
        ));
    }
    let mut a = x;
    let mut records = Vec::with_capacity(params.len());
    for (index, param) in params.iter().enumerate() {
        let activation = if index + 1 == params.len() {
            Activation::Linear
        } else {
            Activation::Relu
        };
        let (next, record) = layer_forward(a, param, activation)?;
        a = next;
        records.push(record);
    }
    Ok((a, records))
}

/// dA_prev = W^T * dZ; dW = dZ * A_prev^T / m; db = rowsum(dZ) / m.
pub fn affine_backward(
    dz: &Matrix,
    a_prev: &Matrix,
    w: &Matrix,
) -> Result<(Matrix, Matrix, Matrix)> {
    let m = dz.cols() as f64;
    let da_prev = w.transposed_matmul(dz)?;
    let mut dw = dz.matmul_transposed(a_prev)?;
    dw.scale(1.0 / m);
    let mut db = dz.row_sums();
    db.scale(1.0 / m);
    Ok((da_prev, dw, db))
}

/// Activation backward followed by affine backward.
pub fn layer_backward(
    da: &Matrix,
    record: &LayerRecord,
    param: &DenseParam,
) -> Result<(Matrix, LayerGradient)> {
    let dz = record.activation.backward(da);
    let (da_prev, dw, db) = affine_backward(&dz, &record.input, &param.weights)?;
    Ok((da_prev, LayerGradient { dw, db }))
}

/// Backward pass through the full stack. Consumes the records in reverse
/// forward order; each record already knows which activation produced it.
/// `d_input` is the gradient handed back to the convolution stage.
pub fn network_backward(
    d_al: &Matrix,
    records: Vec<LayerRecord>,
    params: &[DenseParam],
) -> Result<DenseGradients> {
    if records.len() != params.len() {
        return Err(Error::shape(
            "network_backward",
            (params.len(), 1),
            (records.len(), 1),
        ));
    }
    let mut da = d_al.clone();
    let mut reversed = Vec::with_capacity(records.len());
    for (record, param) in records.into_iter().rev().zip(params.iter().rev()) {
        let (da_prev, gradient) = layer_backward(&da, &record, param)?;
        reversed.push(gradient);
        da = da_prev;
    }
    reversed.reverse();
    Ok(DenseGradients {
        layers: reversed,
        d_input: da,
    })
}
