//! Configuration management
//!
//! Run settings for data location, training hyperparameters and outputs.
//! The network architecture is fixed and not part of the configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::training::TrainingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the MNIST IDX files
    pub data_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/mnist".to_string(),
        }
    }
}

/// Training-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfigFile {
    /// Number of epochs (one mini-batch each)
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Write a sample grid every N epochs; 0 disables sampling
    pub sample_interval: usize,
    /// Adam learning rate for both networks
    pub learning_rate: f64,
    /// Adam beta1 for both networks
    pub beta1: f64,
    /// Seed for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Device: "cpu" or "cuda"
    pub device: String,
    /// Directory for sample grids
    pub output_dir: String,
    /// Optional CSV file receiving the loss history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_csv: Option<String>,
    /// Show a progress bar
    #[serde(default)]
    pub progress: bool,
}

impl Default for TrainingConfigFile {
    fn default() -> Self {
        Self {
            epochs: 5000,
            batch_size: 32,
            sample_interval: 100,
            learning_rate: 2e-4,
            beta1: 0.5,
            seed: None,
            device: "cpu".to_string(),
            output_dir: "images".to_string(),
            metrics_csv: None,
            progress: false,
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration, choosing TOML or JSON by file extension
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if is_toml(path) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Save configuration, choosing TOML or JSON by file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if is_toml(path) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.training.epochs == 0 {
            anyhow::bail!("Number of epochs must be > 0");
        }
        if self.training.batch_size == 0 {
            anyhow::bail!("Batch size must be > 0");
        }
        if !(self.training.learning_rate > 0.0) {
            anyhow::bail!("Learning rate must be > 0");
        }
        if !(0.0..1.0).contains(&self.training.beta1) {
            anyhow::bail!("beta1 must be in [0, 1)");
        }
        Ok(())
    }

    /// Training loop settings derived from this configuration
    pub fn training_config(&self) -> TrainingConfig {
        let t = &self.training;
        TrainingConfig {
            epochs: t.epochs,
            batch_size: t.batch_size,
            sample_interval: t.sample_interval,
            learning_rate: t.learning_rate,
            beta1: t.beta1,
            seed: t.seed,
            output_dir: PathBuf::from(&t.output_dir),
            metrics_csv: t.metrics_csv.as_ref().map(PathBuf::from),
            progress_bar: t.progress,
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "toml")
}
