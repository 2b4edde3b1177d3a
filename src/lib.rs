//! # DCGAN for MNIST Digits
//!
//! This crate provides a modular implementation of a Deep Convolutional
//! Generative Adversarial Network (DCGAN) that learns to draw handwritten
//! digits and periodically saves grids of generated samples.
//!
//! ## Modules
//!
//! - `data`: MNIST loading and random batch sampling
//! - `model`: Layer builder and DCGAN architecture (Generator and Discriminator)
//! - `training`: Training loop, loss functions and metrics
//! - `utils`: Configuration and sample grid rendering

pub mod data;
pub mod model;
pub mod training;
pub mod utils;

pub use data::ImageDataset;
pub use model::{Discriminator, Generator, DCGAN};
pub use training::{EpochReport, Trainer, TrainingConfig, TrainingMetrics};
pub use utils::{Config, SampleWriter};
