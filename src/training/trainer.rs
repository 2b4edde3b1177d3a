//! Training loop implementation for DCGAN
//!
//! Each epoch is a single mini-batch step: two discriminator updates (real
//! batch, fake batch) followed by one generator update through the frozen
//! discriminator.

use std::path::PathBuf;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use tch::{nn, Kind, Tensor};
use tracing::{debug, info, warn};

use super::losses::{binary_accuracy, binary_cross_entropy, generator_loss};
use super::metrics::{EpochReport, TrainingMetrics};
use crate::data::ImageDataset;
use crate::model::DCGAN;
use crate::utils::{should_sample, SampleWriter};

/// Epochs averaged by the mode collapse check
const MODE_COLLAPSE_WINDOW: usize = 100;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Images per mini-batch
    pub batch_size: usize,
    /// Write a sample grid every N epochs (0 disables sampling)
    pub sample_interval: usize,
    /// Adam learning rate for both networks
    pub learning_rate: f64,
    /// Adam beta1 for both networks
    pub beta1: f64,
    /// Seed for batch selection; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Directory receiving sample grids
    pub output_dir: PathBuf,
    /// Write the loss history here when training finishes
    pub metrics_csv: Option<PathBuf>,
    /// Show a progress bar instead of plain log lines
    pub progress_bar: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5000,
            batch_size: 32,
            sample_interval: 100,
            learning_rate: 2e-4,
            beta1: 0.5,
            seed: None,
            output_dir: PathBuf::from("images"),
            metrics_csv: None,
            progress_bar: false,
        }
    }
}

/// DCGAN Trainer
///
/// Owns the optimizers, the batch sampling RNG and the metrics history.
pub struct Trainer {
    config: TrainingConfig,
    gen_opt: nn::Optimizer,
    disc_opt: nn::Optimizer,
    rng: StdRng,
    metrics: TrainingMetrics,
}

impl Trainer {
    /// Create a new trainer with fresh optimizers for `model`
    pub fn new(config: TrainingConfig, model: &DCGAN) -> Result<Self> {
        let gen_opt = model.gen_optimizer(config.learning_rate, config.beta1)?;
        let disc_opt = model.disc_optimizer(config.learning_rate, config.beta1)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            gen_opt,
            disc_opt,
            rng,
            metrics: TrainingMetrics::new(),
        })
    }

    /// Train the DCGAN model for the configured number of epochs
    ///
    /// Prints one report line per epoch and writes a sample grid whenever
    /// the epoch is a multiple of the sample interval.
    pub fn train(&mut self, model: &mut DCGAN, dataset: &ImageDataset) -> Result<&TrainingMetrics> {
        let sampler = SampleWriter::new(&self.config.output_dir);

        info!(
            "Starting training for {} epochs, batch size {}, sampling every {} epochs",
            self.config.epochs, self.config.batch_size, self.config.sample_interval
        );

        let pb = if self.config.progress_bar {
            let pb = ProgressBar::new(self.config.epochs as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                    .progress_chars("##-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        for epoch in 0..self.config.epochs {
            let report = self.train_step(model, dataset, epoch)?;
            self.metrics.record(&report);

            // The report line goes to stdout without a log prefix
            if self.config.progress_bar {
                pb.println(report.to_string());
                pb.set_message(format!("G: {:.4}, D: {:.4}", report.gen_loss, report.disc_loss));
                pb.inc(1);
            } else {
                println!("{}", report);
            }

            if epoch % MODE_COLLAPSE_WINDOW == 0 && self.metrics.check_mode_collapse(MODE_COLLAPSE_WINDOW) {
                warn!("Possible mode collapse detected at epoch {}", epoch);
            }

            if should_sample(epoch, self.config.sample_interval) {
                let path = sampler.write(model, epoch)?;
                debug!("Saved samples to {}", path.display());
            }
        }

        pb.finish_with_message("done");

        if let Some(path) = &self.config.metrics_csv {
            if let Err(e) = self.metrics.save_csv(path) {
                warn!("Failed to save metrics to {}: {}", path.display(), e);
            } else {
                info!("Saved metrics to {}", path.display());
            }
        }

        Ok(&self.metrics)
    }

    /// Run one epoch: sample a real batch, update the discriminator on real
    /// and generated images, then update the generator
    pub fn train_step(
        &mut self,
        model: &mut DCGAN,
        dataset: &ImageDataset,
        epoch: usize,
    ) -> Result<EpochReport> {
        let batch_size = self.config.batch_size as i64;
        let device = model.device;

        let real_images = dataset
            .sample_batch(&mut self.rng, self.config.batch_size)?
            .to_device(device);
        let valid = Tensor::ones([batch_size, 1], (Kind::Float, device));
        let fake = Tensor::zeros([batch_size, 1], (Kind::Float, device));

        // Fake batch comes from the generator in inference mode
        let noise = model.sample_noise(batch_size);
        let generated = model.generator.generate(&noise);

        let (real_loss, real_acc) = self.discriminator_step(model, &real_images, &valid);
        let (fake_loss, fake_acc) = self.discriminator_step(model, &generated, &fake);

        let gen_loss = self.generator_step(model, batch_size);

        Ok(EpochReport {
            epoch,
            disc_loss: 0.5 * (real_loss + fake_loss),
            disc_acc: 0.5 * (real_acc + fake_acc),
            gen_loss,
        })
    }

    /// One discriminator update on `images` against `labels`
    ///
    /// Returns the loss and accuracy measured before the update.
    pub fn discriminator_step(&mut self, model: &DCGAN, images: &Tensor, labels: &Tensor) -> (f64, f64) {
        let probs = model.discriminator.forward_t(images, true);
        let loss = binary_cross_entropy(&probs, labels);

        self.disc_opt.zero_grad();
        loss.backward();
        self.disc_opt.step();

        (loss.double_value(&[]), binary_accuracy(&probs, labels))
    }

    /// One generator update through the combined model
    ///
    /// The discriminator is frozen for the duration of the step: its
    /// weights receive no gradients and its batch norm statistics are
    /// restored afterwards.
    pub fn generator_step(&mut self, model: &mut DCGAN, batch_size: i64) -> f64 {
        let noise = model.sample_noise(batch_size);

        let frozen = model.freeze_discriminator();
        let validity = model.combined_forward(&noise);
        let loss = generator_loss(&validity);

        self.gen_opt.zero_grad();
        loss.backward();
        self.gen_opt.step();
        model.unfreeze_discriminator(frozen);

        loss.double_value(&[])
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn synthetic_dataset(n: i64) -> ImageDataset {
        let images = Tensor::rand([n, 28, 28, 1], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        ImageDataset::from_tensor(images).unwrap()
    }

    fn small_config(output_dir: PathBuf) -> TrainingConfig {
        TrainingConfig {
            epochs: 3,
            batch_size: 4,
            sample_interval: 2,
            seed: Some(1),
            output_dir,
            ..Default::default()
        }
    }

    fn snapshot(vs: &nn::VarStore) -> Vec<Tensor> {
        vs.trainable_variables().iter().map(|t| t.detach().copy()).collect()
    }

    /// Every variable of `vs`, buffers included, sorted by name
    fn full_snapshot(vs: &nn::VarStore) -> Vec<(String, Tensor)> {
        let mut vars: Vec<_> = vs
            .variables()
            .into_iter()
            .map(|(name, t)| (name, t.detach().copy()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 5000);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.sample_interval, 100);
    }

    #[test]
    fn test_train_step_losses_are_finite() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = DCGAN::new(Device::Cpu).unwrap();
        let dataset = synthetic_dataset(16);
        let mut trainer = Trainer::new(small_config(dir.path().to_path_buf()), &model).unwrap();

        let report = trainer.train_step(&mut model, &dataset, 0).unwrap();

        assert_eq!(report.epoch, 0);
        assert!(report.is_finite(), "non-finite report: {}", report);
        assert!((0.0..=1.0).contains(&report.disc_acc));
    }

    #[test]
    fn test_generator_step_leaves_discriminator_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = DCGAN::new(Device::Cpu).unwrap();
        let mut trainer = Trainer::new(small_config(dir.path().to_path_buf()), &model).unwrap();

        let disc_before = full_snapshot(&model.disc_vs);
        let gen_before = snapshot(&model.gen_vs);

        trainer.generator_step(&mut model, 4);

        let disc_after = full_snapshot(&model.disc_vs);
        assert_eq!(disc_before.len(), disc_after.len());
        assert!(disc_before.iter().any(|(name, _)| name == "batch_norm_9.running_var"));
        for ((name, before), (_, after)) in disc_before.iter().zip(&disc_after) {
            assert!(before.equal(after), "discriminator variable {} changed", name);
        }

        let gen_after = snapshot(&model.gen_vs);
        assert!(gen_before.iter().zip(&gen_after).any(|(a, b)| !a.equal(b)));

        // Discriminator is trainable again afterwards
        assert!(model.disc_vs.trainable_variables().iter().all(|t| t.requires_grad()));
    }

    #[test]
    fn test_discriminator_step_updates_only_discriminator() {
        let dir = tempfile::tempdir().unwrap();
        let model = DCGAN::new(Device::Cpu).unwrap();
        let mut trainer = Trainer::new(small_config(dir.path().to_path_buf()), &model).unwrap();

        let disc_before = snapshot(&model.disc_vs);
        let gen_before = snapshot(&model.gen_vs);

        let images = model.generate(4);
        let labels = Tensor::zeros([4, 1], (Kind::Float, Device::Cpu));
        let (loss, acc) = trainer.discriminator_step(&model, &images, &labels);

        assert!(loss.is_finite());
        assert!((0.0..=1.0).contains(&acc));
        assert!(disc_before.iter().zip(&snapshot(&model.disc_vs)).any(|(a, b)| !a.equal(b)));
        assert!(gen_before.iter().zip(&snapshot(&model.gen_vs)).all(|(a, b)| a.equal(b)));
    }

    #[test]
    fn test_train_writes_samples_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("images"));
        config.metrics_csv = Some(dir.path().join("metrics.csv"));

        let mut model = DCGAN::new(Device::Cpu).unwrap();
        let dataset = synthetic_dataset(16);
        let mut trainer = Trainer::new(config, &model).unwrap();

        trainer.train(&mut model, &dataset).unwrap();
        assert_eq!(trainer.metrics().num_epochs(), 3);
        assert!(trainer.metrics().latest_gen_loss().is_some());

        let images = dir.path().join("images");
        assert!(images.join("0.png").exists());
        assert!(!images.join("1.png").exists());
        assert!(images.join("2.png").exists());
        assert_eq!(std::fs::read_dir(&images).unwrap().count(), 2);

        assert!(dir.path().join("metrics.csv").exists());
    }
}
