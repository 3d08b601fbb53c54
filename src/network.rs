//! Training loop and classifier.
//!
//! Every epoch is one full-batch cycle: conv forward -> dense forward ->
//! loss -> softmax backward -> dense backward -> conv backward -> update.
//! The loop always runs to the configured epoch count; there is no early
//! stopping or convergence check. Loss and the effective learning rate are
//! sampled every 10th epoch for reporting, not every epoch.

use tracing::info;

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::layers::conv::{conv_backward, conv_forward, ConvParams};
use crate::layers::dense::{network_backward, network_forward, DenseParam};
use crate::loss::{softmax_backward, softmax_cross_entropy, softmax_probabilities};
use crate::matrix::ImageBatch;
use crate::optimizer::{initialize_parameters, update_conv, update_dense};
use crate::utils::SimpleRng;

/// Digits 0 through 9.
pub const NUM_CLASSES: usize = 10;

/// Loss sampling cadence, in epochs.
const REPORT_EVERY: usize = 10;

/// Trained parameters: the dense stack and the filter bank. Lives for the
/// process run; there is no serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub dense: Vec<DenseParam>,
    pub conv: ConvParams,
}

impl Model {
    pub fn parameter_count(&self) -> usize {
        self.dense
            .iter()
            .map(DenseParam::parameter_count)
            .sum::<usize>()
            + self.conv.parameter_count()
    }
}

/// A trained model plus the sampled (epoch, loss) curve.
#[derive(Debug)]
pub struct TrainOutcome {
    pub model: Model,
    pub costs: Vec<(usize, f64)>,
}

/// Train on the full batch for the configured epoch count.
///
/// Parameters are created once from `rng`, then mutated once per epoch
/// strictly between the backward pass and the next forward pass.
pub fn train(
    x: &ImageBatch,
    labels: &[usize],
    config: &TrainingConfig,
    rng: &mut SimpleRng,
) -> Result<TrainOutcome> {
    config.validate()?;
    if labels.len() != x.count() {
        return Err(Error::shape(
            "train labels",
            (1, x.count()),
            (1, labels.len()),
        ));
    }

    let net_dims = config.net_dims();
    let (mut dense, mut conv) = initialize_parameters(&net_dims, rng)?;
    let mut costs = Vec::with_capacity(config.epochs / REPORT_EVERY + 1);

    for epoch in 0..config.epochs {
        let (features, conv_record) = conv_forward(x, &conv)?;
        let (output, records) = network_forward(features, &dense)?;
        let (probs, cost) = softmax_cross_entropy(&output, labels)?;

        let dz = softmax_backward(labels, &probs)?;
        let gradients = network_backward(&dz, records, &dense)?;
        let conv_gradients = conv_backward(&gradients.d_input, &conv_record)?;

        let alpha = update_dense(
            &mut dense,
            &gradients,
            epoch,
            config.learning_rate,
            config.decay_rate,
        )?;
        update_conv(&mut conv, &conv_gradients, alpha);

        if epoch % REPORT_EVERY == 0 {
            costs.push((epoch, cost));
            info!(epoch, cost, learning_rate = alpha, "training progress");
        }
    }

    Ok(TrainOutcome {
        model: Model { dense, conv },
        costs,
    })
}

/// Pure-inference path: conv forward, dense forward, softmax, per-column
/// argmax. Ties resolve to the lowest class index.
pub fn classify(x: &ImageBatch, model: &Model) -> Result<Vec<usize>> {
    let (features, _record) = conv_forward(x, &model.conv)?;
    let (output, _records) = network_forward(features, &model.dense)?;
    let probs = softmax_probabilities(&output);
    Ok(probs.column_argmax())
}

/// Fraction of matching predictions, as a percentage.
pub fn accuracy(predictions: &[usize], labels: &[usize]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(labels)
        .filter(|(p, l)| p == l)
        .count();
    100.0 * correct as f64 / predictions.len() as f64
}
