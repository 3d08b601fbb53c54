//! From-scratch convolutional network for digit classification.
//!
//! A fixed-shape numeric pipeline: five 3x3 filters over 28x28 images with
//! valid convolution and stride-1 2x2 max pooling, a fully-connected ReLU
//! stack, a softmax cross-entropy head, and full-batch gradient descent with
//! a decayed learning rate. Every derivative is hand-derived for this exact
//! architecture; there is no autodiff and no generalized topology.
//!
//! # Modules
//!
//! - `matrix`: flat (features, batch) matrices and image batches
//! - `layers`: the convolution-pooling engine and the dense stack
//! - `loss`: softmax cross-entropy head
//! - `optimizer`: seeded initialization and the decayed descent step
//! - `network`: the training loop and the pure-inference classifier
//! - `config`: training configuration
//! - `utils`: seeded RNG and activation functions

pub mod config;
pub mod error;
pub mod layers;
pub mod loss;
pub mod matrix;
pub mod network;
pub mod optimizer;
pub mod utils;

pub use config::TrainingConfig;
pub use error::{Error, Result};
pub use matrix::{ImageBatch, Matrix};
pub use network::{accuracy, classify, train, Model, TrainOutcome};
