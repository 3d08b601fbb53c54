//! Pointwise activation functions and their backward passes.
//!
//! The hidden layers use ReLU; the output layer uses the identity (linear)
//! activation, kept for symmetry at the pre-softmax stage. Each forward pass
//! produces an [`ActivationRecord`] that the matching backward pass replays:
//! ReLU retains its pre-activation input Z, linear retains nothing.

use crate::matrix::Matrix;

/// Which pointwise activation a dense layer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Linear,
}

/// Forward-pass record for one activation, consumed by the backward pass.
#[derive(Debug, Clone)]
pub enum ActivationRecord {
    /// ReLU keeps Z so the backward pass can zero positions where Z < 0.
    Relu { z: Matrix },
    /// The identity activation needs nothing.
    Linear,
}

impl Activation {
    /// Apply the activation: A = g(Z). Takes ownership of Z so the record
    /// can retain it without a copy.
    pub fn forward(self, z: Matrix) -> (Matrix, ActivationRecord) {
        match self {
            Activation::Relu => {
                let a = z.map(|v| v.max(0.0));
                (a, ActivationRecord::Relu { z })
            }
            Activation::Linear => (z, ActivationRecord::Linear),
        }
    }
}

impl ActivationRecord {
    /// dZ from dA. For ReLU every position where the cached Z was negative
    /// is zeroed; everything else passes through unchanged.
    pub fn backward(&self, da: &Matrix) -> Matrix {
        match self {
            ActivationRecord::Relu { z } => {
                let mut dz = da.clone();
                for (d, &pre) in dz.data_mut().iter_mut().zip(z.data()) {
                    if pre < 0.0 {
                        *d = 0.0;
                    }
                }
                dz
            }
            ActivationRecord::Linear => da.clone(),
        }
    }
}
