pub mod activations;
pub mod rng;

pub use rng::SimpleRng;
