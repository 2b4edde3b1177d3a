//! Generator network for DCGAN
//!
//! The Generator transforms latent noise vectors into 28×28 grayscale digits.
//! A dense projection produces a 7×7 feature map which is upsampled twice.

use anyhow::Result;
use tch::{nn, nn::ModuleT, Tensor};

use super::layers::{build_sequential, Activation, LayerSpec, Network, Shape};
use super::{ImageShape, IMAGE_SHAPE, LATENT_DIM};

const BN_MOMENTUM: f64 = 0.8;
const BN_EPS: f64 = 1e-3;

/// Layer list of the generator
///
/// Dense → 128×7×7 → (upsample, conv, batch norm, relu) ×2 → conv → tanh
pub fn generator_layers(image: ImageShape) -> Vec<LayerSpec> {
    let (height, width) = (image.rows / 4, image.cols / 4);
    vec![
        LayerSpec::Dense { units: 128 * height * width },
        LayerSpec::Activation(Activation::Relu),
        LayerSpec::Reshape { channels: 128, height, width },
        LayerSpec::UpSample { factor: 2 },
        LayerSpec::Conv2d { filters: 128, kernel: 3, stride: 1 },
        LayerSpec::BatchNorm { momentum: BN_MOMENTUM, eps: BN_EPS },
        LayerSpec::Activation(Activation::Relu),
        LayerSpec::UpSample { factor: 2 },
        LayerSpec::Conv2d { filters: 64, kernel: 3, stride: 1 },
        LayerSpec::BatchNorm { momentum: BN_MOMENTUM, eps: BN_EPS },
        LayerSpec::Activation(Activation::Relu),
        LayerSpec::Conv2d { filters: image.channels, kernel: 3, stride: 1 },
        LayerSpec::Activation(Activation::Tanh),
    ]
}

/// Generator network
#[derive(Debug)]
pub struct Generator {
    network: Network,
    latent_dim: i64,
    image_shape: ImageShape,
}

impl Generator {
    /// Create a new Generator network under `vs`
    pub fn new(vs: &nn::Path) -> Result<Self> {
        let network = build_sequential(vs, Shape::Flat(LATENT_DIM), &generator_layers(IMAGE_SHAPE))?;
        anyhow::ensure!(
            network.output_shape() == IMAGE_SHAPE.to_spatial(),
            "generator produces {} instead of {}",
            network.output_shape(),
            IMAGE_SHAPE.to_spatial()
        );

        Ok(Self {
            network,
            latent_dim: LATENT_DIM,
            image_shape: IMAGE_SHAPE,
        })
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, latent_dim)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, rows, cols, channels) with values in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        // Convolutions run channels-first; callers see channels-last images
        self.network.forward_t(noise, train).permute([0, 2, 3, 1])
    }

    /// Generate images in inference mode without tracking gradients
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(noise, false))
    }

    pub fn latent_dim(&self) -> i64 {
        self.latent_dim
    }

    pub fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    /// Layer table for logging
    pub fn summary(&self) -> String {
        self.network.summary()
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}
