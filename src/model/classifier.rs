//! Convolutional classifier with a swappable head.
//!
//! The backbone is a stack of convolutional blocks followed by global
//! average pooling; the head is a single linear layer mapping the
//! feature width to the class count. Fine-tuning loads a pretrained
//! record (whose head is sized for the pretraining task) and replaces
//! the head with a freshly initialized layer for the target classes
//! while the backbone keeps its pretrained parameters.

use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};
use tracing::info;

use crate::utils::error::Error;

/// Configuration for the classifier architecture
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Number of output classes
    #[config(default = "5")]
    pub num_classes: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "32")]
    pub base_filters: usize,

    /// Dropout rate applied before the head
    #[config(default = "0.2")]
    pub dropout: f64,
}

impl ClassifierConfig {
    /// Initialize a classifier with random parameters
    pub fn init<B: Backend>(&self, device: &B::Device) -> Classifier<B> {
        let features = FeatureExtractor::new(self.in_channels, self.base_filters, device);
        let dropout = DropoutConfig::new(self.dropout).init();
        let head = LinearConfig::new(features.out_features(), self.num_classes).init(device);

        Classifier {
            features,
            dropout,
            head,
            num_classes: self.num_classes,
        }
    }
}

/// A convolutional block with Conv2d, BatchNorm, ReLU and optional MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
    pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

/// Convolutional feature extractor
///
/// Four blocks with doubling filter counts, closed by global average
/// pooling; emits a flat feature vector per image.
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    conv3: ConvBlock<B>,
    conv4: ConvBlock<B>,
    global_pool: AdaptiveAvgPool2d,
    out_features: usize,
}

impl<B: Backend> FeatureExtractor<B> {
    /// Create a new feature extractor
    pub fn new(in_channels: usize, base_filters: usize, device: &B::Device) -> Self {
        let conv1 = ConvBlock::new(in_channels, base_filters, 3, true, device);
        let conv2 = ConvBlock::new(base_filters, base_filters * 2, 3, true, device);
        let conv3 = ConvBlock::new(base_filters * 2, base_filters * 4, 3, true, device);
        let conv4 = ConvBlock::new(base_filters * 4, base_filters * 8, 3, true, device);
        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        Self {
            conv1,
            conv2,
            conv3,
            conv4,
            global_pool,
            out_features: base_filters * 8,
        }
    }

    /// Width of the emitted feature vector
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Forward pass: `[batch, channels, h, w]` -> `[batch, out_features]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }
}

/// Image classifier: feature extractor plus linear head
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    features: FeatureExtractor<B>,
    dropout: Dropout,
    head: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> Classifier<B> {
    /// Forward pass producing logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.features.forward(x);
        let x = self.dropout.forward(x);
        self.head.forward(x)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Replace the classification head with a freshly initialized linear
    /// layer for `num_classes` outputs, keeping all other parameters
    pub fn with_head(self, num_classes: usize, device: &B::Device) -> Self {
        let head = LinearConfig::new(self.features.out_features(), num_classes).init(device);
        Self {
            head,
            num_classes,
            ..self
        }
    }
}

/// Assemble a classifier for fine-tuning
///
/// Loads pretrained weights recorded for `pretrained_classes` outputs,
/// then swaps the head for a randomly initialized layer sized to
/// `config.num_classes`. Fails if the weights file is missing or does
/// not match the architecture.
pub fn load_pretrained<B: Backend>(
    config: ClassifierConfig,
    path: &Path,
    pretrained_classes: usize,
    device: &B::Device,
) -> crate::utils::error::Result<Classifier<B>> {
    let num_classes = config.num_classes;
    let pretrained = config
        .with_num_classes(pretrained_classes)
        .init::<B>(device)
        .load_file(path, &CompactRecorder::new(), device)
        .map_err(|e| {
            Error::Model(format!(
                "failed to load pretrained weights from {}: {:?}",
                path.display(),
                e
            ))
        })?;

    info!(
        "Loaded pretrained weights from {}; replacing {}-way head with {}-way head",
        path.display(),
        pretrained_classes,
        num_classes
    );

    Ok(pretrained.with_head(num_classes, device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = ClassifierConfig::new().with_num_classes(5).with_base_filters(4);
        let model = config.init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 5]);
        assert_eq!(model.num_classes(), 5);
    }

    #[test]
    fn test_with_head_changes_output_width() {
        let device = Default::default();
        let model = ClassifierConfig::new()
            .with_num_classes(1000)
            .with_base_filters(4)
            .init::<TestBackend>(&device);

        let model = model.with_head(5, &device);
        assert_eq!(model.num_classes(), 5);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        assert_eq!(model.forward(input).dims(), [1, 5]);
    }

    #[test]
    fn test_load_pretrained_swaps_head() {
        let device = Default::default();
        let tmp = TempDir::new().unwrap();
        let weights_path = tmp.path().join("pretrained");

        // Record a "pretrained" network with a 7-way head
        let pretrained = ClassifierConfig::new()
            .with_num_classes(7)
            .with_base_filters(4)
            .init::<TestBackend>(&device);
        pretrained
            .save_file(weights_path.clone(), &CompactRecorder::new())
            .unwrap();

        let config = ClassifierConfig::new().with_num_classes(3).with_base_filters(4);
        let model =
            load_pretrained::<TestBackend>(config, &weights_path, 7, &device).unwrap();

        assert_eq!(model.num_classes(), 3);
        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        assert_eq!(model.forward(input).dims(), [2, 3]);
    }

    #[test]
    fn test_load_pretrained_missing_file_fails() {
        let device = Default::default();
        let config = ClassifierConfig::new().with_base_filters(4);
        let result = load_pretrained::<TestBackend>(
            config,
            Path::new("/nonexistent/weights"),
            1000,
            &device,
        );
        assert!(matches!(result, Err(Error::Model(_))));
    }

    #[test]
    fn test_feature_extractor_width() {
        let device = Default::default();
        let features = FeatureExtractor::<TestBackend>::new(3, 8, &device);
        assert_eq!(features.out_features(), 64);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        assert_eq!(features.forward(input).dims(), [1, 64]);
    }
}
