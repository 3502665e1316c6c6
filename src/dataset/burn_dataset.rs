//! Burn dataset integration.
//!
//! Implements Burn's `Dataset` trait and a `Batcher` so the sample sets
//! can be wrapped by `DataLoaderBuilder` into shuffled, multi-worker
//! batch producers.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::ImageReader;
use serde::{Deserialize, Serialize};

use crate::dataset::loader::FolderDataset;
use crate::dataset::transform;
use crate::utils::error::Result;
use crate::{IMAGE_SIZE, NORM_MEAN, NORM_STD};

/// A preprocessed sample ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageItem {
    /// Image data as flattened CHW float array `[3 * edge * edge]`, in [0, 1]
    pub image: Vec<f32>,
    /// Class label index
    pub label: usize,
    /// Source path (for error reporting)
    pub path: String,
}

impl ImageItem {
    /// Load and preprocess one image from disk
    pub fn from_path(path: &Path, label: usize, edge: usize) -> Result<Self> {
        let img = ImageReader::open(path)?.decode()?;
        Ok(Self {
            image: transform::preprocess(&img, edge as u32),
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// Lazily loading Burn dataset over a [`FolderDataset`]'s samples
#[derive(Debug, Clone)]
pub struct FolderBurnDataset {
    samples: Vec<(std::path::PathBuf, usize)>,
    image_size: usize,
}

impl FolderBurnDataset {
    /// Create a dataset from (path, label) pairs
    pub fn new(samples: Vec<(std::path::PathBuf, usize)>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
        }
    }

    /// Wrap a loaded split
    pub fn from_loader(loader: &FolderDataset, image_size: usize) -> Self {
        let samples = loader
            .samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect();
        Self::new(samples, image_size)
    }
}

impl Dataset<ImageItem> for FolderBurnDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let (path, label) = self.samples.get(index)?;
        // An unreadable or corrupt image aborts the run
        match ImageItem::from_path(path, *label, self.image_size) {
            Ok(item) => Some(item),
            Err(err) => panic!("failed to load image {}: {}", path.display(), err),
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of images and their labels
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// Images with shape `[batch_size, 3, edge, edge]`, normalized
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking items into normalized tensors
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    image_size: usize,
}

impl ImageBatcher {
    /// Create a batcher for the default image size
    pub fn new() -> Self {
        Self {
            image_size: IMAGE_SIZE,
        }
    }

    /// Create a batcher with a custom image size
    pub fn with_image_size(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl Default for ImageBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let edge = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, edge, edge]),
            device,
        );
        let images = normalize(images);

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        ImageBatch { images, targets }
    }
}

/// Per-channel normalization `(x - mean) / std`
pub fn normalize<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = images.device();
    let mean = Tensor::<B, 4>::from_floats(TensorData::new(NORM_MEAN.to_vec(), [1, 3, 1, 1]), &device);
    let std = Tensor::<B, 4>::from_floats(TensorData::new(NORM_STD.to_vec(), [1, 3, 1, 1]), &device);
    (images - mean) / std
}

/// Inverse of [`normalize`]: `x * std + mean`
pub fn denormalize<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = images.device();
    let mean = Tensor::<B, 4>::from_floats(TensorData::new(NORM_MEAN.to_vec(), [1, 3, 1, 1]), &device);
    let std = Tensor::<B, 4>::from_floats(TensorData::new(NORM_STD.to_vec(), [1, 3, 1, 1]), &device);
    images * std + mean
}
