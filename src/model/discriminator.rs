//! Discriminator network for DCGAN
//!
//! The Discriminator classifies digit images as real or fake.
//! Strided convolutions downsample the image before a dense sigmoid output.

use anyhow::Result;
use tch::{nn, nn::ModuleT, Tensor};

use super::layers::{build_sequential, Activation, LayerSpec, Network, Shape};
use super::{ImageShape, IMAGE_SHAPE};

const BN_MOMENTUM: f64 = 0.8;
const BN_EPS: f64 = 1e-3;
const LEAKY_SLOPE: f64 = 0.2;
const DROPOUT: f64 = 0.3;

/// Layer list of the discriminator
pub fn discriminator_layers() -> Vec<LayerSpec> {
    let leaky = LayerSpec::Activation(Activation::LeakyRelu(LEAKY_SLOPE));
    let norm = LayerSpec::BatchNorm { momentum: BN_MOMENTUM, eps: BN_EPS };

    vec![
        LayerSpec::Conv2d { filters: 32, kernel: 3, stride: 2 },
        leaky.clone(),
        LayerSpec::Dropout(DROPOUT),
        LayerSpec::Conv2d { filters: 64, kernel: 3, stride: 2 },
        LayerSpec::ZeroPad { bottom: 1, right: 1 },
        norm.clone(),
        leaky.clone(),
        LayerSpec::Dropout(DROPOUT),
        LayerSpec::Conv2d { filters: 128, kernel: 3, stride: 2 },
        norm.clone(),
        leaky.clone(),
        LayerSpec::Dropout(DROPOUT),
        LayerSpec::Conv2d { filters: 256, kernel: 3, stride: 1 },
        norm,
        leaky,
        LayerSpec::Dropout(DROPOUT),
        LayerSpec::Flatten,
        LayerSpec::Dense { units: 1 },
        LayerSpec::Activation(Activation::Sigmoid),
    ]
}

/// Discriminator network
#[derive(Debug)]
pub struct Discriminator {
    network: Network,
    image_shape: ImageShape,
}

impl Discriminator {
    /// Create a new Discriminator network under `vs`
    pub fn new(vs: &nn::Path) -> Result<Self> {
        let network = build_sequential(vs, IMAGE_SHAPE.to_spatial(), &discriminator_layers())?;
        anyhow::ensure!(
            network.output_shape() == Shape::Flat(1),
            "discriminator produces {} instead of a single score",
            network.output_shape()
        );

        Ok(Self {
            network,
            image_shape: IMAGE_SHAPE,
        })
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (batch_size, rows, cols, channels)
    /// * `train` - Whether in training mode (affects dropout and batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with probabilities of being real
    pub fn forward_t(&self, images: &Tensor, train: bool) -> Tensor {
        let xs = images.permute([0, 3, 1, 2]);
        self.network.forward_t(&xs, train)
    }

    /// Classify samples (inference mode)
    pub fn classify(&self, images: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(images, false))
    }

    pub fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    /// Layer table for logging
    pub fn summary(&self) -> String {
        self.network.summary()
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}
