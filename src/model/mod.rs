//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Declarative layer specifications and the network builder
//! - Generator network mapping latent noise to digit images
//! - Discriminator network scoring images as real or fake
//! - DCGAN wrapper owning both networks and their variable stores

mod dcgan;
mod discriminator;
mod generator;
pub mod layers;

pub use dcgan::{FrozenDiscriminator, DCGAN};
pub use discriminator::Discriminator;
pub use generator::Generator;
pub use layers::{Activation, LayerSpec, Network, Shape};

/// Size of the latent noise vector fed to the generator
pub const LATENT_DIM: i64 = 100;

/// Shape of one image in height × width × channels order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub rows: i64,
    pub cols: i64,
    pub channels: i64,
}

impl ImageShape {
    /// Channels-first shape as seen by the convolution layers
    pub fn to_spatial(self) -> Shape {
        Shape::Spatial {
            channels: self.channels,
            height: self.rows,
            width: self.cols,
        }
    }
}

/// MNIST digit shape
pub const IMAGE_SHAPE: ImageShape = ImageShape {
    rows: 28,
    cols: 28,
    channels: 1,
};
