//! Layer engines: the fixed convolution-pooling stage and the dense stack.

pub mod conv;
pub mod dense;

pub use conv::{ConvFilter, ConvParams};
pub use dense::DenseParam;
