//! Declarative layer specifications and the builder that turns them into networks
//!
//! Both GAN networks are written down as an ordered list of [`LayerSpec`]s.
//! [`build_sequential`] walks the list, infers the shape after every layer,
//! creates the `tch` modules under the given variable path and records a
//! per-layer summary.

use std::fmt;

use anyhow::{bail, ensure, Result};
use tch::{nn, nn::ModuleT, Tensor};

/// Nonlinearities available to [`LayerSpec::Activation`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    /// Leaky ReLU with the given negative slope
    LeakyRelu(f64),
    Tanh,
    Sigmoid,
}

impl Activation {
    /// Apply the activation to a tensor
    pub fn apply(self, xs: &Tensor) -> Tensor {
        match self {
            Activation::Relu => xs.relu(),
            Activation::LeakyRelu(alpha) => xs.maximum(&(xs * alpha)),
            Activation::Tanh => xs.tanh(),
            Activation::Sigmoid => xs.sigmoid(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::LeakyRelu(_) => "leaky_relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
        }
    }
}

/// One layer of a sequential network
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpec {
    /// Fully connected layer on a flat input
    Dense { units: i64 },
    /// Reinterpret a flat input as a (channels, height, width) feature map
    Reshape { channels: i64, height: i64, width: i64 },
    /// Nearest-neighbour upsampling by an integer factor
    UpSample { factor: i64 },
    /// 2D convolution with "same" padding
    Conv2d { filters: i64, kernel: i64, stride: i64 },
    /// Zero padding on the bottom and right edges
    ZeroPad { bottom: i64, right: i64 },
    /// Batch normalization; `momentum` is the weight kept on the running statistics
    BatchNorm { momentum: f64, eps: f64 },
    Activation(Activation),
    /// Dropout, only active in training mode
    Dropout(f64),
    Flatten,
}

impl LayerSpec {
    fn kind(&self) -> &'static str {
        match self {
            LayerSpec::Dense { .. } => "dense",
            LayerSpec::Reshape { .. } => "reshape",
            LayerSpec::UpSample { .. } => "up_sampling",
            LayerSpec::Conv2d { .. } => "conv2d",
            LayerSpec::ZeroPad { .. } => "zero_padding",
            LayerSpec::BatchNorm { .. } => "batch_norm",
            LayerSpec::Activation(a) => a.name(),
            LayerSpec::Dropout(_) => "dropout",
            LayerSpec::Flatten => "flatten",
        }
    }
}

/// Shape of a single sample (batch dimension excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Flat(i64),
    /// Channels-first feature map
    Spatial { channels: i64, height: i64, width: i64 },
}

impl Shape {
    /// Number of elements per sample
    pub fn numel(&self) -> i64 {
        match *self {
            Shape::Flat(n) => n,
            Shape::Spatial { channels, height, width } => channels * height * width,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Flat(n) => write!(f, "({})", n),
            Shape::Spatial { channels, height, width } => {
                write!(f, "({}, {}, {})", channels, height, width)
            }
        }
    }
}

/// Summary row for one built layer
#[derive(Debug, Clone)]
pub struct LayerSummary {
    pub name: String,
    pub output_shape: Shape,
    pub params: i64,
}

/// A built sequential network together with its shape information
#[derive(Debug)]
pub struct Network {
    seq: nn::SequentialT,
    input_shape: Shape,
    output_shape: Shape,
    layers: Vec<LayerSummary>,
}

impl Network {
    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    pub fn layers(&self) -> &[LayerSummary] {
        &self.layers
    }

    /// Total number of trainable parameters
    pub fn num_params(&self) -> i64 {
        self.layers.iter().map(|l| l.params).sum()
    }

    /// Render a table of layers, output shapes and parameter counts
    pub fn summary(&self) -> String {
        let mut out = format!("{:<20} {:<18} {:>10}\n", "Layer", "Output shape", "Params");
        out.push_str(&format!("{:<20} {:<18} {:>10}\n", "input", self.input_shape.to_string(), 0));
        for layer in &self.layers {
            out.push_str(&format!(
                "{:<20} {:<18} {:>10}\n",
                layer.name,
                layer.output_shape.to_string(),
                layer.params
            ));
        }
        out.push_str(&format!("Total trainable params: {}", self.num_params()));
        out
    }
}

impl ModuleT for Network {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.seq.forward_t(xs, train)
    }
}

fn spatial(shape: Shape, kind: &str) -> Result<(i64, i64, i64)> {
    match shape {
        Shape::Spatial { channels, height, width } => Ok((channels, height, width)),
        Shape::Flat(_) => bail!("{} layer needs a spatial input, got {}", kind, shape),
    }
}

/// "Same" padding along one axis as `(before, after, output size)`
///
/// An odd total goes one extra to the `after` side (bottom or right).
fn same_padding(size: i64, kernel: i64, stride: i64) -> (i64, i64, i64) {
    let out = (size + stride - 1) / stride;
    let total = ((out - 1) * stride + kernel - size).max(0);
    (total / 2, total - total / 2, out)
}

/// Build a sequential network from layer specifications
///
/// Variables are created under `vs`, one sub-path per layer named
/// `<kind>_<index>`. Fails if a layer cannot be applied to the shape
/// produced by the layers before it.
pub fn build_sequential(vs: &nn::Path, input: Shape, specs: &[LayerSpec]) -> Result<Network> {
    ensure!(input.numel() > 0, "input shape {} must be non-empty", input);

    let mut seq = nn::seq_t();
    let mut shape = input;
    let mut layers = Vec::with_capacity(specs.len());

    for (idx, spec) in specs.iter().enumerate() {
        let name = format!("{}_{}", spec.kind(), idx);
        let path = vs / name.as_str();
        let mut params = 0;

        match *spec {
            LayerSpec::Dense { units } => {
                ensure!(units > 0, "{}: units must be positive", name);
                let in_features = match shape {
                    Shape::Flat(n) => n,
                    _ => bail!("{}: dense layer needs a flat input, got {}", name, shape),
                };
                seq = seq.add(nn::linear(path, in_features, units, Default::default()));
                params = in_features * units + units;
                shape = Shape::Flat(units);
            }
            LayerSpec::Reshape { channels, height, width } => {
                let target = Shape::Spatial { channels, height, width };
                ensure!(
                    channels > 0 && height > 0 && width > 0 && target.numel() == shape.numel(),
                    "{}: cannot reshape {} into {}",
                    name,
                    shape,
                    target
                );
                seq = seq.add_fn(move |xs| xs.view([-1, channels, height, width]));
                shape = target;
            }
            LayerSpec::UpSample { factor } => {
                ensure!(factor > 0, "{}: factor must be positive", name);
                let (channels, height, width) = spatial(shape, &name)?;
                let (out_h, out_w) = (height * factor, width * factor);
                seq = seq.add_fn(move |xs| {
                    xs.upsample_nearest2d([out_h, out_w], None::<f64>, None::<f64>)
                });
                shape = Shape::Spatial { channels, height: out_h, width: out_w };
            }
            LayerSpec::Conv2d { filters, kernel, stride } => {
                ensure!(
                    filters > 0 && kernel > 0 && stride > 0,
                    "{}: filters, kernel and stride must be positive",
                    name
                );
                let (channels, height, width) = spatial(shape, &name)?;
                let (top, bottom, out_h) = same_padding(height, kernel, stride);
                let (left, right, out_w) = same_padding(width, kernel, stride);

                let padding = if top == bottom && left == right && top == left {
                    top
                } else {
                    seq = seq.add_fn(move |xs| xs.constant_pad_nd([left, right, top, bottom]));
                    0
                };
                let config = nn::ConvConfig {
                    stride,
                    padding,
                    ..Default::default()
                };
                seq = seq.add(nn::conv2d(path, channels, filters, kernel, config));
                params = channels * filters * kernel * kernel + filters;
                shape = Shape::Spatial { channels: filters, height: out_h, width: out_w };
            }
            LayerSpec::ZeroPad { bottom, right } => {
                ensure!(bottom >= 0 && right >= 0, "{}: padding must be non-negative", name);
                let (channels, height, width) = spatial(shape, &name)?;
                seq = seq.add_fn(move |xs| xs.constant_pad_nd([0, right, 0, bottom]));
                shape = Shape::Spatial { channels, height: height + bottom, width: width + right };
            }
            LayerSpec::BatchNorm { momentum, eps } => {
                ensure!((0.0..1.0).contains(&momentum), "{}: momentum must be in [0, 1)", name);
                // libtorch weights the batch statistics, not the running ones
                let config = nn::BatchNormConfig {
                    momentum: 1.0 - momentum,
                    eps,
                    ..Default::default()
                };
                let features = match shape {
                    Shape::Flat(n) => {
                        seq = seq.add(nn::batch_norm1d(path, n, config));
                        n
                    }
                    Shape::Spatial { channels, .. } => {
                        seq = seq.add(nn::batch_norm2d(path, channels, config));
                        channels
                    }
                };
                params = 2 * features;
            }
            LayerSpec::Activation(activation) => {
                seq = seq.add_fn(move |xs| activation.apply(xs));
            }
            LayerSpec::Dropout(rate) => {
                ensure!((0.0..1.0).contains(&rate), "{}: rate must be in [0, 1)", name);
                seq = seq.add_fn_t(move |xs, train| xs.dropout(rate, train));
            }
            LayerSpec::Flatten => {
                seq = seq.add_fn(|xs| xs.flatten(1, -1));
                shape = Shape::Flat(shape.numel());
            }
        }

        layers.push(LayerSummary { name, output_shape: shape, params });
    }

    Ok(Network {
        seq,
        input_shape: input,
        output_shape: shape,
        layers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_strided_conv_shapes() {
        let vs = VarStore::new(Device::Cpu);
        let input = Shape::Spatial { channels: 1, height: 28, width: 28 };
        let specs = [
            LayerSpec::Conv2d { filters: 8, kernel: 3, stride: 2 },
            LayerSpec::Conv2d { filters: 4, kernel: 3, stride: 2 },
            LayerSpec::ZeroPad { bottom: 1, right: 1 },
        ];
        let net = build_sequential(&vs.root(), input, &specs).unwrap();

        assert_eq!(net.output_shape(), Shape::Spatial { channels: 4, height: 8, width: 8 });

        let xs = Tensor::randn([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let ys = net.forward_t(&xs, false);
        assert_eq!(ys.size(), vec![2, 4, 8, 8]);
    }

    #[test]
    fn test_dense_reshape_upsample() {
        let vs = VarStore::new(Device::Cpu);
        let specs = [
            LayerSpec::Dense { units: 2 * 3 * 3 },
            LayerSpec::Reshape { channels: 2, height: 3, width: 3 },
            LayerSpec::UpSample { factor: 2 },
            LayerSpec::Flatten,
        ];
        let net = build_sequential(&vs.root(), Shape::Flat(5), &specs).unwrap();

        assert_eq!(net.output_shape(), Shape::Flat(2 * 6 * 6));
        assert_eq!(net.num_params(), 5 * 18 + 18);

        let ys = net.forward_t(&Tensor::randn([3, 5], (Kind::Float, Device::Cpu)), true);
        assert_eq!(ys.size(), vec![3, 72]);
    }

    #[test]
    fn test_rejects_incompatible_layers() {
        let vs = VarStore::new(Device::Cpu);
        let conv_on_flat = [LayerSpec::Conv2d { filters: 4, kernel: 3, stride: 1 }];
        assert!(build_sequential(&vs.root(), Shape::Flat(10), &conv_on_flat).is_err());

        let bad_reshape = [LayerSpec::Reshape { channels: 3, height: 3, width: 3 }];
        assert!(build_sequential(&vs.root(), Shape::Flat(10), &bad_reshape).is_err());

        let empty_kernel = [LayerSpec::Conv2d { filters: 4, kernel: 0, stride: 1 }];
        let input = Shape::Spatial { channels: 1, height: 8, width: 8 };
        assert!(build_sequential(&vs.root(), input, &empty_kernel).is_err());
    }

    #[test]
    fn test_same_padding_axis() {
        assert_eq!(same_padding(28, 3, 1), (1, 1, 28));
        assert_eq!(same_padding(28, 3, 2), (0, 1, 14));
        assert_eq!(same_padding(7, 3, 2), (1, 1, 4));
        assert_eq!(same_padding(8, 3, 2), (0, 1, 4));
        assert_eq!(same_padding(4, 1, 2), (0, 0, 2));
    }

    #[test]
    fn test_strided_conv_pads_bottom_right() {
        let vs = VarStore::new(Device::Cpu);
        let input = Shape::Spatial { channels: 1, height: 4, width: 4 };
        let specs = [LayerSpec::Conv2d { filters: 1, kernel: 3, stride: 2 }];
        let net = build_sequential(&vs.root(), input, &specs).unwrap();

        tch::no_grad(|| {
            let mut vars = vs.variables();
            let _ = vars.get_mut("conv2d_0.weight").unwrap().fill_(1.0);
            let _ = vars.get_mut("conv2d_0.bias").unwrap().fill_(0.0);
        });

        // A single pixel at (2, 2) lies in all four 3x3 windows once the
        // extra padding row and column sit at the bottom and right
        let xs = Tensor::zeros([1, 1, 4, 4], (Kind::Float, Device::Cpu));
        let _ = xs.narrow(2, 2, 1).narrow(3, 2, 1).fill_(1.0);
        let ys = net.forward_t(&xs, false);

        assert_eq!(ys.size(), vec![1, 1, 2, 2]);
        assert!(ys.equal(&Tensor::ones([1, 1, 2, 2], (Kind::Float, Device::Cpu))));
    }

    #[test]
    fn test_leaky_relu_slope() {
        let xs = Tensor::from_slice(&[-10.0f32, 0.0, 4.0]);
        let ys = Activation::LeakyRelu(0.2).apply(&xs);
        let values: Vec<f32> = Vec::<f32>::try_from(&ys).unwrap();
        assert_eq!(values, vec![-2.0, 0.0, 4.0]);
    }

    #[test]
    fn test_summary_lists_layers() {
        let vs = VarStore::new(Device::Cpu);
        let specs = [
            LayerSpec::Dense { units: 4 },
            LayerSpec::BatchNorm { momentum: 0.8, eps: 1e-3 },
            LayerSpec::Activation(Activation::Sigmoid),
        ];
        let net = build_sequential(&vs.root(), Shape::Flat(3), &specs).unwrap();
        let summary = net.summary();

        assert!(summary.contains("dense_0"));
        assert!(summary.contains("batch_norm_1"));
        assert!(summary.contains("sigmoid_2"));
        assert!(summary.ends_with("Total trainable params: 24"));
    }
}
