//! Sample grid rendering
//!
//! Tiles a batch of generated images into one picture and writes it as PNG.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use tch::{Device, Kind, Tensor};

use crate::model::DCGAN;

/// Whether samples are written at `epoch` for the given interval
///
/// An interval of zero disables sampling.
pub fn should_sample(epoch: usize, interval: usize) -> bool {
    interval > 0 && epoch % interval == 0
}

/// Tile `rows * cols` images into a single channels-first uint8 image
///
/// # Arguments
///
/// * `images` - Tensor of shape (rows * cols, height, width, channels) in [-1, 1]
/// * `padding` - Black border in pixels between and around tiles
///
/// # Returns
///
/// Tensor of shape (channels, rows * height + (rows + 1) * padding,
/// cols * width + (cols + 1) * padding)
pub fn tile_grid(images: &Tensor, rows: i64, cols: i64, padding: i64) -> Result<Tensor> {
    let (num_images, height, width, channels) = images.size4()?;
    ensure!(rows > 0 && cols > 0, "grid needs at least one row and column");
    ensure!(padding >= 0, "padding must be non-negative");
    ensure!(
        num_images == rows * cols,
        "expected {} images for a {}x{} grid, got {}",
        rows * cols,
        rows,
        cols,
        num_images
    );

    let pixels = ((images * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0)
        .round()
        .to_kind(Kind::Uint8)
        .to_device(Device::Cpu)
        .permute([0, 3, 1, 2]);

    let grid_h = rows * height + (rows + 1) * padding;
    let grid_w = cols * width + (cols + 1) * padding;
    let grid = Tensor::zeros([channels, grid_h, grid_w], (Kind::Uint8, Device::Cpu));

    for idx in 0..num_images {
        let top = padding + (idx / cols) * (height + padding);
        let left = padding + (idx % cols) * (width + padding);
        let mut tile = grid.narrow(1, top, height).narrow(2, left, width);
        tile.copy_(&pixels.get(idx));
    }

    Ok(grid)
}

/// Writes grids of generated images to `<output_dir>/<epoch>.png`
#[derive(Debug, Clone)]
pub struct SampleWriter {
    output_dir: PathBuf,
    rows: i64,
    cols: i64,
    padding: i64,
}

impl SampleWriter {
    /// 5×5 grid with a 2 pixel border
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            rows: 5,
            cols: 5,
            padding: 2,
        }
    }

    /// Number of images in one grid
    pub fn grid_size(&self) -> i64 {
        self.rows * self.cols
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.output_dir.join(format!("{}.png", epoch))
    }

    /// Generate a fresh grid of samples and save it
    ///
    /// Returns the path of the written image.
    pub fn write(&self, model: &DCGAN, epoch: usize) -> Result<PathBuf> {
        let images = model.generate(self.grid_size());
        let grid = tile_grid(&images, self.rows, self.cols, self.padding)?;

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let path = self.path_for(epoch);
        tch::vision::image::save(&grid, &path)
            .with_context(|| format!("failed to write samples to {}", path.display()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_sample() {
        let sampled: Vec<usize> = (0..10).filter(|&e| should_sample(e, 4)).collect();
        assert_eq!(sampled, vec![0, 4, 8]);

        assert!((0..10).all(|e| should_sample(e, 1)));
        assert!((0..10).all(|e| !should_sample(e, 0)));
    }

    #[test]
    fn test_tile_grid_shape() {
        let images = Tensor::zeros([25, 28, 28, 1], (Kind::Float, Device::Cpu));
        let grid = tile_grid(&images, 5, 5, 2).unwrap();

        assert_eq!(grid.size(), vec![1, 5 * 28 + 6 * 2, 5 * 28 + 6 * 2]);
        assert_eq!(grid.kind(), Kind::Uint8);
    }

    #[test]
    fn test_tile_grid_placement() {
        // Second image all white, the rest all black
        let images = Tensor::full([4, 2, 2, 1], -1.0, (Kind::Float, Device::Cpu));
        let _ = images.get(1).fill_(1.0);

        let grid = tile_grid(&images, 2, 2, 1).unwrap();
        assert_eq!(grid.size(), vec![1, 7, 7]);

        // Tile (0, 1) starts at row 1, column 4
        assert_eq!(grid.int64_value(&[0, 1, 4]), 255);
        assert_eq!(grid.int64_value(&[0, 2, 5]), 255);
        assert_eq!(grid.int64_value(&[0, 1, 1]), 0);
        assert_eq!(grid.int64_value(&[0, 0, 0]), 0);
        assert_eq!(grid.to_kind(Kind::Int64).sum(Kind::Int64).int64_value(&[]), 4 * 255);
    }

    #[test]
    fn test_tile_grid_rejects_wrong_count() {
        let images = Tensor::zeros([24, 28, 28, 1], (Kind::Float, Device::Cpu));
        assert!(tile_grid(&images, 5, 5, 2).is_err());
    }

    #[test]
    fn test_sample_writer_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SampleWriter::new(dir.path().join("images"));
        let model = DCGAN::new(Device::Cpu).unwrap();

        let path = writer.write(&model, 300).unwrap();

        assert_eq!(path, dir.path().join("images").join("300.png"));
        assert!(path.exists());

        // 5 tiles of 28 pixels plus 6 borders of 2 pixels per side
        assert_eq!(writer.grid_size(), 25);
        let loaded = tch::vision::image::load(&path).unwrap();
        assert_eq!(&loaded.size()[1..], &[152, 152]);
    }
}
