//! DCGAN wrapper combining Generator and Discriminator
//!
//! Owns both networks, their variable stores and the device. This is the
//! single session object of a training run.

use anyhow::Result;
use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Kind, Tensor};

use super::discriminator::Discriminator;
use super::generator::Generator;
use super::ImageShape;

/// Discriminator buffers saved while its weights are frozen
///
/// Holds the live batch norm running statistics next to copies taken at
/// freeze time, so that a training-mode pass through the frozen network
/// can be rolled back.
#[must_use = "pass to DCGAN::unfreeze_discriminator to restore the discriminator"]
pub struct FrozenDiscriminator {
    buffers: Vec<(String, Tensor, Tensor)>,
}

impl FrozenDiscriminator {
    /// Names of the saved buffers
    pub fn buffer_names(&self) -> impl Iterator<Item = &str> {
        self.buffers.iter().map(|(name, _, _)| name.as_str())
    }
}

/// Complete DCGAN model
pub struct DCGAN {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl DCGAN {
    /// Create a new DCGAN model with freshly initialized weights
    pub fn new(device: Device) -> Result<Self> {
        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let discriminator = Discriminator::new(&disc_vs.root())?;
        let generator = Generator::new(&gen_vs.root())?;

        anyhow::ensure!(
            generator.image_shape() == discriminator.image_shape(),
            "generator output {:?} does not match discriminator input {:?}",
            generator.image_shape(),
            discriminator.image_shape()
        );

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        })
    }

    /// Create a DCGAN after seeding the libtorch random generator
    ///
    /// With a seed, weight initialization, latent noise and dropout masks
    /// are reproducible for the rest of the process.
    pub fn with_seed(device: Device, seed: Option<u64>) -> Result<Self> {
        if let Some(seed) = seed {
            tch::manual_seed(seed as i64);
        }
        Self::new(device)
    }

    /// Draw latent vectors from N(0, 1)
    pub fn sample_noise(&self, num_samples: i64) -> Tensor {
        Tensor::randn([num_samples, self.latent_dim()], (Kind::Float, self.device))
    }

    /// Generate synthetic images in inference mode
    ///
    /// # Returns
    ///
    /// Tensor of shape (num_samples, rows, cols, channels) in [-1, 1]
    pub fn generate(&self, num_samples: i64) -> Tensor {
        let noise = self.sample_noise(num_samples);
        self.generator.generate(&noise)
    }

    /// Discriminate samples (get probability of being real)
    pub fn discriminate(&self, images: &Tensor) -> Tensor {
        self.discriminator.classify(images)
    }

    /// Generator stacked on the discriminator, both in training mode
    ///
    /// Used to compute the generator's adversarial loss. Freeze the
    /// discriminator first so that only generator weights get gradients.
    pub fn combined_forward(&self, noise: &Tensor) -> Tensor {
        let images = self.generator.forward_t(noise, true);
        self.discriminator.forward_t(&images, true)
    }

    /// Stop gradients from reaching discriminator weights
    ///
    /// Non-trainable buffers (batch norm running mean and variance) are
    /// still updated by a training-mode forward pass; the returned guard
    /// keeps copies of them.
    pub fn freeze_discriminator(&mut self) -> FrozenDiscriminator {
        let buffers = self
            .disc_vs
            .variables()
            .into_iter()
            .filter(|(_, t)| !t.requires_grad())
            .map(|(name, t)| {
                let saved = t.detach().copy();
                (name, t, saved)
            })
            .collect();
        self.disc_vs.freeze();
        FrozenDiscriminator { buffers }
    }

    /// Make discriminator weights trainable again and put back the buffers
    /// saved by `freeze_discriminator`
    pub fn unfreeze_discriminator(&mut self, frozen: FrozenDiscriminator) {
        tch::no_grad(|| {
            for (_, mut live, saved) in frozen.buffers {
                live.copy_(&saved);
            }
        });
        self.disc_vs.unfreeze();
    }

    /// Get generator optimizer (Adam with the usual GAN betas)
    pub fn gen_optimizer(&self, lr: f64, beta1: f64) -> Result<nn::Optimizer> {
        Ok(nn::adam(beta1, 0.999, 0.0).build(&self.gen_vs, lr)?)
    }

    /// Get discriminator optimizer (Adam with the usual GAN betas)
    pub fn disc_optimizer(&self, lr: f64, beta1: f64) -> Result<nn::Optimizer> {
        Ok(nn::adam(beta1, 0.999, 0.0).build(&self.disc_vs, lr)?)
    }

    /// Get latent dimension
    pub fn latent_dim(&self) -> i64 {
        self.generator.latent_dim()
    }

    /// Get image shape shared by both networks
    pub fn image_shape(&self) -> ImageShape {
        self.generator.image_shape()
    }

    /// Architecture tables of both networks
    pub fn summary(&self) -> String {
        format!(
            "Generator\n{}\n\nDiscriminator\n{}",
            self.generator.summary(),
            self.discriminator.summary()
        )
    }
}
