//! Data module for the training images
//!
//! This module provides:
//! - MNIST loading from IDX files
//! - Random batch sampling with replacement

mod dataset;

pub use dataset::ImageDataset;
