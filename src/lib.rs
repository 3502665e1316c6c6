//! # imgclass-finetune
//!
//! Fine-tunes a pretrained convolutional image classifier on a small
//! labeled dataset laid out as one directory per class, using the Burn
//! framework for tensors, autodiff and data loading.
//!
//! The pipeline is linear: assemble the model (pretrained backbone, fresh
//! classification head), load the `train` and `test` splits, iterate
//! epochs alternating a training and an evaluation phase, track the best
//! test accuracy, and persist best and final checkpoints.
//!
//! ## Modules
//!
//! - `dataset`: split scanning, preprocessing, Burn dataset/batcher glue
//! - `model`: classifier architecture and pretrained-weight assembly
//! - `training`: the epoch/phase loop, LR schedule and checkpointing
//! - `backend`: Burn backend selection (CPU by default, CUDA via feature)
//! - `utils`: logging, metrics and error types

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::loader::{FolderDataset, ImageSample, Split};
pub use dataset::{FolderBurnDataset, ImageBatch, ImageBatcher, ImageItem};
pub use model::{load_pretrained, Classifier, ClassifierConfig};
pub use training::scheduler::{LrSchedule, LrScheduler};
pub use training::trainer::{train, EpochRecord, TrainConfig, TrainReport};
pub use utils::error::{Error, Result};

/// Number of target classes for the fine-tuning task
pub const NUM_CLASSES: usize = 5;

/// Edge length images are resized and cropped to
pub const IMAGE_SIZE: usize = 299;

/// Per-channel normalization mean
pub const NORM_MEAN: [f32; 3] = [0.122, 0.122, 0.122];

/// Per-channel normalization standard deviation
pub const NORM_STD: [f32; 3] = [0.250, 0.250, 0.250];

/// Default training batch size
pub const BATCH_SIZE: usize = 128;

/// Default number of data-loading workers
pub const NUM_WORKERS: usize = 16;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
