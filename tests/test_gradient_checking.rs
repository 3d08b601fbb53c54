//! Numerical gradient checking with central finite differences.
//!
//! The backward chain carries the batch-size division at different points:
//! dense dW/db are already true derivatives of the mean loss, the d_input
//! feeding the convolution is m times the true derivative, and the filter
//! gradients come out divided by 676. Each check applies the matching factor.

use approx::assert_relative_eq;
use convnet::layers::conv::{
    conv_backward, conv_forward, ConvParams, CONV_AREA, FLAT_FEATURES, KERNEL_DIM,
};
use convnet::layers::dense::{network_backward, network_forward, DenseParam};
use convnet::loss::{softmax_backward, softmax_cross_entropy};
use convnet::matrix::{ImageBatch, Matrix};
use convnet::utils::SimpleRng;

const EPS: f64 = 1e-6;

fn dense_loss(x: &Matrix, params: &[DenseParam], labels: &[usize]) -> f64 {
    let (output, _records) = network_forward(x.clone(), params).unwrap();
    softmax_cross_entropy(&output, labels).unwrap().1
}

fn conv_loss(x: &ImageBatch, conv: &ConvParams, dense: &[DenseParam], labels: &[usize]) -> f64 {
    let (features, _record) = conv_forward(x, conv).unwrap();
    let (output, _records) = network_forward(features, dense).unwrap();
    softmax_cross_entropy(&output, labels).unwrap().1
}

// ============================================================================
// Dense stack
// ============================================================================

mod dense_gradient_tests {
    use super::*;

    fn random_param(out_size: usize, in_size: usize, rng: &mut SimpleRng) -> DenseParam {
        let weights = Matrix::from_fn(out_size, in_size, || rng.gen_range(-0.5, 0.5));
        let biases = Matrix::from_fn(out_size, 1, || rng.gen_range(-0.2, 0.2));
        DenseParam { weights, biases }
    }

    #[test]
    fn test_dense_gradients_match_finite_differences() {
        let mut rng = SimpleRng::new(17);
        let params = vec![random_param(5, 6, &mut rng), random_param(4, 5, &mut rng)];
        let x = Matrix::from_fn(6, 3, || rng.gen_range(-1.0, 1.0));
        let labels = [0usize, 2, 3];

        let (output, records) = network_forward(x.clone(), &params).unwrap();
        let (probs, _loss) = softmax_cross_entropy(&output, &labels).unwrap();
        let dz = softmax_backward(&labels, &probs).unwrap();
        let gradients = network_backward(&dz, records, &params).unwrap();

        for (l, gradient) in gradients.layers.iter().enumerate() {
            let (rows, cols) = gradient.dw.shape();
            for r in 0..rows {
                for c in 0..cols {
                    let mut perturbed = params.clone();
                    let w = perturbed[l].weights.get(r, c);
                    perturbed[l].weights.set(r, c, w + EPS);
                    let plus = dense_loss(&x, &perturbed, &labels);
                    perturbed[l].weights.set(r, c, w - EPS);
                    let minus = dense_loss(&x, &perturbed, &labels);

                    let numerical = (plus - minus) / (2.0 * EPS);
                    assert_relative_eq!(
                        gradient.dw.get(r, c),
                        numerical,
                        epsilon = 1e-7,
                        max_relative = 1e-5
                    );
                }
                let mut perturbed = params.clone();
                let b = perturbed[l].biases.get(r, 0);
                perturbed[l].biases.set(r, 0, b + EPS);
                let plus = dense_loss(&x, &perturbed, &labels);
                perturbed[l].biases.set(r, 0, b - EPS);
                let minus = dense_loss(&x, &perturbed, &labels);

                let numerical = (plus - minus) / (2.0 * EPS);
                assert_relative_eq!(
                    gradient.db.get(r, 0),
                    numerical,
                    epsilon = 1e-7,
                    max_relative = 1e-5
                );
            }
        }
    }

    #[test]
    fn test_input_gradient_matches_finite_differences() {
        // d_input is the unnormalized chain, m times the derivative of the
        // mean loss with respect to each input entry.
        let mut rng = SimpleRng::new(23);
        let params = vec![random_param(4, 5, &mut rng), random_param(3, 4, &mut rng)];
        let x = Matrix::from_fn(5, 2, || rng.gen_range(-1.0, 1.0));
        let labels = [1usize, 0];
        let m = 2.0;

        let (output, records) = network_forward(x.clone(), &params).unwrap();
        let (probs, _loss) = softmax_cross_entropy(&output, &labels).unwrap();
        let dz = softmax_backward(&labels, &probs).unwrap();
        let gradients = network_backward(&dz, records, &params).unwrap();

        for r in 0..5 {
            for c in 0..2 {
                let mut perturbed = x.clone();
                let v = x.get(r, c);
                perturbed.set(r, c, v + EPS);
                let plus = dense_loss(&perturbed, &params, &labels);
                perturbed.set(r, c, v - EPS);
                let minus = dense_loss(&perturbed, &params, &labels);

                let numerical = (plus - minus) / (2.0 * EPS);
                assert_relative_eq!(
                    gradients.d_input.get(r, c) / m,
                    numerical,
                    epsilon = 1e-7,
                    max_relative = 1e-5
                );
            }
        }
    }
}

// ============================================================================
// Convolution filters
// ============================================================================

mod conv_gradient_tests {
    use super::*;

    /// Strictly increasing pixels keep every 2x2 pooling maximum unique and
    /// far from its runners-up under all-positive kernels, so an EPS-sized
    /// weight perturbation cannot flip any mask.
    fn ramp_batch(count: usize) -> ImageBatch {
        let mut batch = ImageBatch::zeros(28, 28, count);
        for s in 0..count {
            for (i, v) in batch.image_mut(s).iter_mut().enumerate() {
                *v = (i + s) as f64 / 784.0;
            }
        }
        batch
    }

    #[test]
    fn test_filter_gradients_match_finite_differences() {
        let mut rng = SimpleRng::new(31);
        let mut conv = ConvParams::zeros();
        for filter in conv.filters.iter_mut() {
            for row in filter.weights.iter_mut() {
                for w in row.iter_mut() {
                    *w = rng.gen_range(0.05, 0.3);
                }
            }
            filter.bias = rng.gen_range(-0.1, 0.1);
        }
        let dense = vec![DenseParam {
            weights: Matrix::from_fn(4, FLAT_FEATURES, || rng.gen_range(-0.05, 0.05)),
            biases: Matrix::from_fn(4, 1, || rng.gen_range(-0.1, 0.1)),
        }];
        let x = ramp_batch(2);
        let labels = [1usize, 3];

        let (features, conv_record) = conv_forward(&x, &conv).unwrap();
        let (output, records) = network_forward(features, &dense).unwrap();
        let (probs, _loss) = softmax_cross_entropy(&output, &labels).unwrap();
        let dz = softmax_backward(&labels, &probs).unwrap();
        let dense_gradients = network_backward(&dz, records, &dense).unwrap();
        let conv_gradients = conv_backward(&dense_gradients.d_input, &conv_record).unwrap();

        let area = CONV_AREA as f64;
        for f in 0..conv.filters.len() {
            for ky in 0..KERNEL_DIM {
                for kx in 0..KERNEL_DIM {
                    let mut perturbed = conv.clone();
                    perturbed.filters[f].weights[ky][kx] += EPS;
                    let plus = conv_loss(&x, &perturbed, &dense, &labels);
                    perturbed.filters[f].weights[ky][kx] -= 2.0 * EPS;
                    let minus = conv_loss(&x, &perturbed, &dense, &labels);

                    let numerical = (plus - minus) / (2.0 * EPS);
                    assert_relative_eq!(
                        conv_gradients[f].dw[ky][kx] * area,
                        numerical,
                        epsilon = 1e-6,
                        max_relative = 1e-5
                    );
                }
            }

            // A bias perturbation shifts the whole conv map uniformly and
            // never reorders a pooling window.
            let mut perturbed = conv.clone();
            perturbed.filters[f].bias += EPS;
            let plus = conv_loss(&x, &perturbed, &dense, &labels);
            perturbed.filters[f].bias -= 2.0 * EPS;
            let minus = conv_loss(&x, &perturbed, &dense, &labels);

            let numerical = (plus - minus) / (2.0 * EPS);
            assert_relative_eq!(
                conv_gradients[f].db * area,
                numerical,
                epsilon = 1e-6,
                max_relative = 1e-5
            );
        }
    }
}
