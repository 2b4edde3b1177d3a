//! In-memory image dataset for GAN training
//!
//! Holds the whole training set as one channels-last tensor with values in
//! [-1, 1] and draws random batches from it with replacement.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use rand::Rng;
use tch::{Kind, Tensor};

use crate::model::ImageShape;

/// Training images of shape (num_images, rows, cols, channels)
#[derive(Debug)]
pub struct ImageDataset {
    images: Tensor,
    shape: ImageShape,
}

impl ImageDataset {
    /// Load the MNIST training images from a directory of IDX files
    ///
    /// Expects `train-images-idx3-ubyte` and the companion label/test files
    /// in `dir`. Pixels are rescaled from [0, 255] to [-1, 1].
    pub fn load_mnist<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mnist = tch::vision::mnist::load_dir(dir)
            .with_context(|| format!("failed to load MNIST from {}", dir.display()))?;

        // load_dir yields flattened pixels already scaled to [0, 1]
        let images = mnist.train_images.view([-1, 28, 28, 1]) * 2.0 - 1.0;
        Self::from_tensor(images)
    }

    /// Wrap an existing tensor of shape (num_images, rows, cols, channels)
    pub fn from_tensor(images: Tensor) -> Result<Self> {
        let size = images.size();
        ensure!(
            size.len() == 4,
            "expected images of shape (n, rows, cols, channels), got {:?}",
            size
        );
        ensure!(size[0] > 0, "dataset contains no images");

        Ok(Self {
            images: images.to_kind(Kind::Float),
            shape: ImageShape {
                rows: size[1],
                cols: size[2],
                channels: size[3],
            },
        })
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.images.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn image_shape(&self) -> ImageShape {
        self.shape
    }

    /// Draw `batch_size` images uniformly at random, with replacement
    pub fn sample_batch<R: Rng>(&self, rng: &mut R, batch_size: usize) -> Result<Tensor> {
        ensure!(batch_size > 0, "batch size must be positive");

        let num_images = self.len();
        let ids: Vec<i64> = (0..batch_size)
            .map(|_| rng.gen_range(0..num_images) as i64)
            .collect();
        let index = Tensor::from_slice(&ids).to_device(self.images.device());

        Ok(self.images.index_select(0, &index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tch::Device;

    fn ramp_dataset(n: i64) -> ImageDataset {
        // Image i is filled with the value i
        let images = Tensor::arange(n, (Kind::Float, Device::Cpu))
            .view([n, 1, 1, 1])
            .expand([n, 4, 4, 1], false)
            .contiguous();
        ImageDataset::from_tensor(images).unwrap()
    }

    #[test]
    fn test_from_tensor_shape() {
        let dataset = ramp_dataset(10);

        assert_eq!(dataset.len(), 10);
        assert!(!dataset.is_empty());
        assert_eq!(dataset.image_shape(), ImageShape { rows: 4, cols: 4, channels: 1 });
    }

    #[test]
    fn test_from_tensor_rejects_bad_input() {
        let flat = Tensor::zeros([10, 784], (Kind::Float, Device::Cpu));
        assert!(ImageDataset::from_tensor(flat).is_err());

        let empty = Tensor::zeros([0, 28, 28, 1], (Kind::Float, Device::Cpu));
        assert!(ImageDataset::from_tensor(empty).is_err());
    }

    #[test]
    fn test_sample_batch() {
        let dataset = ramp_dataset(5);
        let mut rng = StdRng::seed_from_u64(7);

        // Larger than the dataset: sampling is with replacement
        let batch = dataset.sample_batch(&mut rng, 12).unwrap();
        assert_eq!(batch.size(), vec![12, 4, 4, 1]);

        let first_pixels = batch.view([12, -1]).select(1, 0);
        let ids: Vec<f32> = Vec::<f32>::try_from(&first_pixels).unwrap();
        assert!(ids.iter().all(|&v| (0.0..5.0).contains(&v) && v.fract() == 0.0));

        assert!(dataset.sample_batch(&mut rng, 0).is_err());
    }

    #[test]
    fn test_sample_batch_is_seeded() {
        let dataset = ramp_dataset(50);

        let a = dataset.sample_batch(&mut StdRng::seed_from_u64(3), 8).unwrap();
        let b = dataset.sample_batch(&mut StdRng::seed_from_u64(3), 8).unwrap();
        assert!(a.equal(&b));
    }

    #[test]
    fn test_load_mnist_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageDataset::load_mnist(dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("failed to load MNIST"));
    }
}
