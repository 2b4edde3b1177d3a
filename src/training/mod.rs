//! Training module for DCGAN
//!
//! This module provides:
//! - Training loop implementation
//! - Loss functions (Binary Cross Entropy) and accuracy
//! - Training configuration and metrics

mod losses;
mod metrics;
mod trainer;

pub use losses::{binary_accuracy, binary_cross_entropy, generator_loss};
pub use metrics::{EpochReport, TrainingMetrics};
pub use trainer::{Trainer, TrainingConfig};
