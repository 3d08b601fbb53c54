//! Fixed-shape convolution and max-pooling engine.
//!
//! The architecture is deliberately rigid: five independent single-channel
//! 3x3 filters over 28x28 images, valid (no-padding) convolution producing a
//! 26x26 map per filter, then 2x2 stride-1 max pooling down to 25x25. The
//! five pooled maps are flattened and stacked into a 3125 x m feature matrix.
//!
//! Pooling records a 50x50 boolean equality mask per (filter, sample) at the
//! 2x-upsampled alignment; the backward pass replays the mask to route
//! gradients to the positions that held the window maximum. Positions tied
//! with the maximum all receive gradient, so tied maxima are double counted.
//! That multi-assignment is a preserved quirk of this engine, not a feature.
//!
//! The five filters are independent, so forward and backward both run one
//! rayon task per filter; each task owns a disjoint slice of the output.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::matrix::{ImageBatch, Matrix};
use crate::utils::SimpleRng;

pub const IMAGE_DIM: usize = 28;
pub const KERNEL_DIM: usize = 3;
pub const FILTER_COUNT: usize = 5;
/// Valid convolution output edge: 28 - 3 + 1 = 26.
pub const CONV_DIM: usize = IMAGE_DIM - KERNEL_DIM + 1;
pub const CONV_AREA: usize = CONV_DIM * CONV_DIM;
/// Stride-1 2x2 pooling output edge: 26 - 2 + 1 = 25.
pub const POOL_DIM: usize = CONV_DIM - 1;
pub const POOL_AREA: usize = POOL_DIM * POOL_DIM;
/// Edge of the 2x-upsampled equality mask.
pub const MASK_DIM: usize = 2 * POOL_DIM;
pub const MASK_AREA: usize = MASK_DIM * MASK_DIM;
/// Flattened feature count handed to the dense stack: 5 * 25 * 25 = 3125.
pub const FLAT_FEATURES: usize = FILTER_COUNT * POOL_AREA;

/// One 3x3 filter and its scalar bias.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvFilter {
    pub weights: [[f64; KERNEL_DIM]; KERNEL_DIM],
    pub bias: f64,
}

impl Default for ConvFilter {
    fn default() -> Self {
        Self {
            weights: [[0.0; KERNEL_DIM]; KERNEL_DIM],
            bias: 0.0,
        }
    }
}

/// The five-filter bank. Owned by this engine, mutated only by the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvParams {
    pub filters: [ConvFilter; FILTER_COUNT],
}

impl ConvParams {
    /// Gaussian initialization scaled by 0.01, filter by filter: the nine
    /// kernel weights in row-major order, then the bias.
    pub fn init(rng: &mut SimpleRng) -> Self {
        let filters = std::array::from_fn(|_| {
            let mut weights = [[0.0; KERNEL_DIM]; KERNEL_DIM];
            for row in weights.iter_mut() {
                for w in row.iter_mut() {
                    *w = rng.next_gaussian() * 0.01;
                }
            }
            ConvFilter {
                weights,
                bias: rng.next_gaussian() * 0.01,
            }
        });
        Self { filters }
    }

    pub fn zeros() -> Self {
        Self {
            filters: std::array::from_fn(|_| ConvFilter::default()),
        }
    }

    pub fn parameter_count(&self) -> usize {
        FILTER_COUNT * (KERNEL_DIM * KERNEL_DIM + 1)
    }
}

/// Forward-pass record: borrows the input batch and owns the pooling masks.
/// Produced by [`conv_forward`], consumed by [`conv_backward`].
#[derive(Debug)]
pub struct ConvRecord<'a> {
    input: &'a ImageBatch,
    /// [filter][sample][50 * 50], flat.
    masks: Vec<bool>,
}

/// Gradient of one filter's weights and bias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGradient {
    pub dw: [[f64; KERNEL_DIM]; KERNEL_DIM],
    pub db: f64,
}

pub type ConvGradients = [FilterGradient; FILTER_COUNT];

/// Convolve, pool, and flatten a batch of 28x28 images into a 3125 x m
/// feature matrix. Any other input size fails with `ShapeMismatch`.
pub fn conv_forward<'a>(
    x: &'a ImageBatch,
    params: &ConvParams,
) -> Result<(Matrix, ConvRecord<'a>)> {
    if x.height() != IMAGE_DIM || x.width() != IMAGE_DIM {
        return Err(Error::shape(
            "conv_forward input",
            (IMAGE_DIM, IMAGE_DIM),
            (x.height(), x.width()),
        ));
    }
    let m = x.count();
    if m == 0 {
        return Err(Error::shape(
            "conv_forward batch",
            (FLAT_FEATURES, 1),
            (FLAT_FEATURES, 0),
        ));
    }

    let mut z_data = vec![0.0f64; FLAT_FEATURES * m];
    let mut masks = vec![false; FILTER_COUNT * m * MASK_AREA];

    // Filter f owns rows [f * 625, (f + 1) * 625) of Z and its own mask
    // block, so the parallel split is over disjoint contiguous chunks.
    z_data
        .par_chunks_mut(POOL_AREA * m)
        .zip(masks.par_chunks_mut(m * MASK_AREA))
        .zip(params.filters.par_iter())
        .for_each(|((z_chunk, mask_chunk), filter)| {
            let mut conv = [0.0f64; CONV_AREA];
            let mut pooled = [0.0f64; POOL_AREA];
            for s in 0..m {
                convolve_valid(x.image(s), filter, &mut conv);
                let sample_mask = &mut mask_chunk[s * MASK_AREA..(s + 1) * MASK_AREA];
                pool_forward(&conv, &mut pooled, sample_mask);
                for (p, &v) in pooled.iter().enumerate() {
                    z_chunk[p * m + s] = v;
                }
            }
        });

    let z = Matrix::from_vec(FLAT_FEATURES, m, z_data)?;
    Ok((z, ConvRecord { input: x, masks }))
}

/// Gradients of the filter bank from the flattened pooled gradient `dA`
/// (3125 x m). Pooling is reversed first via the stored masks, then each of
/// the 676 conv positions accumulates its 3x3 input patch into dW. Both dW
/// and db are normalized by m * 676.
pub fn conv_backward(da: &Matrix, record: &ConvRecord<'_>) -> Result<ConvGradients> {
    let m = record.input.count();
    if da.shape() != (FLAT_FEATURES, m) {
        return Err(Error::shape(
            "conv_backward",
            (FLAT_FEATURES, m),
            da.shape(),
        ));
    }
    let scale = 1.0 / (m as f64 * CONV_AREA as f64);

    let mut gradients: ConvGradients = std::array::from_fn(|_| FilterGradient::default());
    gradients
        .par_iter_mut()
        .enumerate()
        .for_each(|(f, gradient)| {
            let mask_chunk = &record.masks[f * m * MASK_AREA..(f + 1) * m * MASK_AREA];
            let mut dpool = [0.0f64; POOL_AREA];
            let mut dconv = [0.0f64; CONV_AREA];
            let mut dw = [[0.0f64; KERNEL_DIM]; KERNEL_DIM];
            let mut db = 0.0f64;

            for s in 0..m {
                // Strided copy of this (filter, sample) column of dA.
                for (p, d) in dpool.iter_mut().enumerate() {
                    *d = da.get(f * POOL_AREA + p, s);
                }
                let sample_mask = &mask_chunk[s * MASK_AREA..(s + 1) * MASK_AREA];
                pool_backward(&dpool, sample_mask, &mut dconv);

                let image = record.input.image(s);
                for (pos, &g) in dconv.iter().enumerate() {
                    db += g;
                    let py = pos / CONV_DIM;
                    let px = pos % CONV_DIM;
                    for (ky, dw_row) in dw.iter_mut().enumerate() {
                        let pixels = &image[(py + ky) * IMAGE_DIM + px..][..KERNEL_DIM];
                        for (acc, &v) in dw_row.iter_mut().zip(pixels) {
                            *acc += v * g;
                        }
                    }
                }
            }

            for row in dw.iter_mut() {
                for v in row.iter_mut() {
                    *v *= scale;
                }
            }
            gradient.dw = dw;
            gradient.db = db * scale;
        });

    Ok(gradients)
}

/// Valid cross-correlation of one 28x28 image with a 3x3 kernel plus bias.
fn convolve_valid(image: &[f64], filter: &ConvFilter, out: &mut [f64; CONV_AREA]) {
    for oy in 0..CONV_DIM {
        for ox in 0..CONV_DIM {
            let mut sum = filter.bias;
            for (ky, w_row) in filter.weights.iter().enumerate() {
                let pixels = &image[(oy + ky) * IMAGE_DIM + ox..][..KERNEL_DIM];
                for (&v, &w) in pixels.iter().zip(w_row) {
                    sum += v * w;
                }
            }
            out[oy * CONV_DIM + ox] = sum;
        }
    }
}

/// 2x2 stride-1 max pooling of a 26x26 map into 25x25, recording the 50x50
/// equality mask at 2x-upsampled alignment: mask position (i, j) marks
/// whether conv[(i + 1) / 2][(j + 1) / 2] equals the pooled maximum of
/// window (i / 2, j / 2). Duplicate maxima within a window mark every tied
/// position.
fn pool_forward(conv: &[f64; CONV_AREA], pooled: &mut [f64; POOL_AREA], mask: &mut [bool]) {
    for py in 0..POOL_DIM {
        for px in 0..POOL_DIM {
            let a = conv[py * CONV_DIM + px];
            let b = conv[py * CONV_DIM + px + 1];
            let c = conv[(py + 1) * CONV_DIM + px];
            let d = conv[(py + 1) * CONV_DIM + px + 1];
            pooled[py * POOL_DIM + px] = a.max(b).max(c).max(d);
        }
    }
    for i in 0..MASK_DIM {
        let cy = (i + 1) / 2;
        let wy = i / 2;
        for j in 0..MASK_DIM {
            let cx = (j + 1) / 2;
            let wx = j / 2;
            mask[i * MASK_DIM + j] =
                conv[cy * CONV_DIM + cx] == pooled[wy * POOL_DIM + wx];
        }
    }
}

/// Reverse of [`pool_forward`]: broadcast each pooled gradient to its
/// upsampled neighbors through the mask, then sum the overlapping
/// contributions of each conv cell (the padded reshape-and-sum of the
/// forward layout).
fn pool_backward(dpool: &[f64; POOL_AREA], mask: &[bool], dconv: &mut [f64; CONV_AREA]) {
    for cy in 0..CONV_DIM {
        for cx in 0..CONV_DIM {
            let mut sum = 0.0;
            for u in [2 * cy, 2 * cy + 1] {
                if u == 0 || u > MASK_DIM {
                    continue;
                }
                let i = u - 1;
                for v in [2 * cx, 2 * cx + 1] {
                    if v == 0 || v > MASK_DIM {
                        continue;
                    }
                    let j = v - 1;
                    if mask[i * MASK_DIM + j] {
                        sum += dpool[(i / 2) * POOL_DIM + j / 2];
                    }
                }
            }
            dconv[cy * CONV_DIM + cx] = sum;
        }
    }
}
