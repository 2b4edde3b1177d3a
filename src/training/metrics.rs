//! Training metrics for monitoring GAN progress
//!
//! Provides the per-epoch report and the history collected over a run.

use std::fmt;
use std::path::Path;

/// Losses and accuracy of one training epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// Mean of the real-batch and fake-batch discriminator losses
    pub disc_loss: f64,
    /// Mean discriminator accuracy in [0, 1]
    pub disc_acc: f64,
    pub gen_loss: f64,
}

impl EpochReport {
    /// Whether every reported value is a finite number
    pub fn is_finite(&self) -> bool {
        self.disc_loss.is_finite() && self.disc_acc.is_finite() && self.gen_loss.is_finite()
    }
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [D loss: {:.6}, acc.: {:.2}%] [G loss: {:.6}]",
            self.epoch,
            self.disc_loss,
            100.0 * self.disc_acc,
            self.gen_loss
        )
    }
}

/// Metrics collected during training
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Generator losses per epoch
    pub gen_losses: Vec<f64>,
    /// Discriminator losses per epoch
    pub disc_losses: Vec<f64>,
    /// Discriminator accuracy per epoch
    pub disc_acc: Vec<f64>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch metrics
    pub fn record(&mut self, report: &EpochReport) {
        self.gen_losses.push(report.gen_loss);
        self.disc_losses.push(report.disc_loss);
        self.disc_acc.push(report.disc_acc);
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.gen_losses.len()
    }

    /// Get latest generator loss
    pub fn latest_gen_loss(&self) -> Option<f64> {
        self.gen_losses.last().copied()
    }

    /// Get latest discriminator loss
    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Calculate moving average of generator loss
    pub fn gen_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.gen_losses, window)
    }

    /// Calculate moving average of discriminator loss
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.disc_losses, window)
    }

    /// Check if training appears to have collapsed
    ///
    /// Mode collapse indicators:
    /// - Discriminator loss very low (can easily distinguish)
    /// - Generator loss very high (can't fool discriminator)
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return false;
        }

        self.disc_loss_ma(window) < 0.1 && self.gen_loss_ma(window) > 5.0
    }

    /// Save metrics to CSV file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["epoch", "disc_loss", "disc_acc", "gen_loss"])?;

        for i in 0..self.num_epochs() {
            writer.write_record([
                i.to_string(),
                self.disc_losses[i].to_string(),
                self.disc_acc[i].to_string(),
                self.gen_losses[i].to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() || window == 0 {
        return 0.0;
    }

    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}
