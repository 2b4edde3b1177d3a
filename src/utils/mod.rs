//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Sample grid rendering

mod config;
mod image_grid;

pub use config::{Config, DataConfig, TrainingConfigFile};
pub use image_grid::{should_sample, tile_grid, SampleWriter};
