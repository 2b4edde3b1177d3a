//! Loss functions for GAN training
//!
//! The discriminator ends in a sigmoid, so losses work on probabilities.

use tch::{Kind, Tensor};

/// Probabilities are clipped to [EPSILON, 1 - EPSILON] before taking logs
pub const EPSILON: f64 = 1e-7;

/// Mean binary cross entropy between predicted probabilities and targets
pub fn binary_cross_entropy(probs: &Tensor, targets: &Tensor) -> Tensor {
    probs
        .clamp(EPSILON, 1.0 - EPSILON)
        .binary_cross_entropy::<Tensor>(targets, None, tch::Reduction::Mean)
}

/// Generator loss: -log(D(G(z)))
///
/// The generator wants the discriminator to output 1 (real) for fake samples.
pub fn generator_loss(fake_probs: &Tensor) -> Tensor {
    let targets = Tensor::ones_like(fake_probs);
    binary_cross_entropy(fake_probs, &targets)
}

/// Fraction of predictions on the correct side of 0.5
pub fn binary_accuracy(probs: &Tensor, targets: &Tensor) -> f64 {
    probs
        .ge(0.5)
        .to_kind(Kind::Float)
        .eq_tensor(&targets.ge(0.5).to_kind(Kind::Float))
        .to_kind(Kind::Float)
        .mean(Kind::Float)
        .double_value(&[])
}
