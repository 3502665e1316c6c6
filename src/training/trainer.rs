//! The training loop.
//!
//! Runs a fixed number of epochs, each a train phase followed by a test
//! phase. The train phase advances the learning-rate schedule before its
//! first batch, then runs forward, loss, backward and one SGD step per
//! batch. The test phase evaluates the model on the inner backend with
//! gradient tracking and regularization disabled. Whenever the test
//! accuracy strictly exceeds the best seen so far, the parameters are
//! written to the best checkpoint; after the last epoch the final
//! parameters are written and the best checkpoint is loaded back from
//! disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::{FolderBurnDataset, FolderDataset, ImageBatch, ImageBatcher, Split};
use crate::model::Classifier;
use crate::training::checkpoint::{self, CheckpointMeta, BEST_CHECKPOINT, FINAL_CHECKPOINT};
use crate::training::scheduler::{LrSchedule, LrScheduler};
use crate::utils::error::{Error, Result};
use crate::utils::metrics::{EpochMetrics, PhaseTally};
use crate::{BATCH_SIZE, IMAGE_SIZE, NUM_CLASSES, NUM_WORKERS};

/// How often the train phase reports running accuracy, in batches
const PROGRESS_INTERVAL: usize = 10;

/// Hyperparameters and paths for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Dataset root containing `train/` and `test/` splits
    pub data_dir: PathBuf,
    /// Directory checkpoints are written to
    pub output_dir: PathBuf,
    /// Number of target classes
    pub num_classes: usize,
    /// Number of epochs
    pub epochs: usize,
    /// Batch size for both splits
    pub batch_size: usize,
    /// Data-loading worker count
    pub num_workers: usize,
    /// Base learning rate
    pub learning_rate: f64,
    /// SGD momentum
    pub momentum: f64,
    /// Learning-rate schedule
    pub schedule: LrSchedule,
    /// Edge length images are resized and cropped to
    pub image_size: usize,
    /// Seed for batch shuffling
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("imgdata"),
            output_dir: PathBuf::from("checkpoints"),
            num_classes: NUM_CLASSES,
            epochs: 5,
            batch_size: BATCH_SIZE,
            num_workers: NUM_WORKERS,
            learning_rate: 0.001,
            momentum: 0.5,
            schedule: LrSchedule::Step {
                step_size: 7,
                gamma: 0.1,
            },
            image_size: IMAGE_SIZE,
            seed: 42,
        }
    }
}

/// Metrics for one completed epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train: EpochMetrics,
    pub test: EpochMetrics,
    pub learning_rate: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    /// Best test accuracy observed across all epochs
    pub best_accuracy: f64,
    /// Wall-clock duration of the run in seconds
    pub elapsed_secs: f64,
    /// Per-epoch metrics in order
    pub history: Vec<EpochRecord>,
}

/// Fine-tune `model` on the dataset described by `config`
///
/// Returns the model restored to the best checkpoint observed during
/// the run (or the final-epoch parameters if no epoch improved on the
/// initial accuracy), together with the per-epoch history.
pub fn train<B: AutodiffBackend>(
    config: &TrainConfig,
    model: Classifier<B>,
    device: &B::Device,
) -> Result<(Classifier<B>, TrainReport)> {
    if config.epochs == 0 {
        return Err(Error::Config("number of epochs must be greater than zero".into()));
    }
    if config.batch_size == 0 {
        return Err(Error::Config("batch size must be greater than zero".into()));
    }

    let since = Instant::now();

    // Sample sets for both splits, identical preprocessing
    let train_set = FolderDataset::new(&config.data_dir, Split::Train)?;
    let test_set = FolderDataset::new(&config.data_dir, Split::Test)?;
    for set in [&train_set, &test_set] {
        if set.num_classes() != config.num_classes {
            return Err(Error::Dataset(format!(
                "{} split has {} classes, expected {}",
                set.split,
                set.num_classes(),
                config.num_classes
            )));
        }
    }

    let train_size = train_set.len();
    let test_size = test_set.len();
    info!(
        "Dataset: {} train / {} test samples, {} classes",
        train_size, test_size, config.num_classes
    );

    let batcher = ImageBatcher::with_image_size(config.image_size);
    let train_loader: Arc<dyn DataLoader<B, ImageBatch<B>>> =
        DataLoaderBuilder::new(batcher.clone())
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .set_device(device.clone())
            .build(FolderBurnDataset::from_loader(&train_set, config.image_size));
    let test_loader: Arc<dyn DataLoader<B::InnerBackend, ImageBatch<B::InnerBackend>>> =
        DataLoaderBuilder::new(batcher)
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .set_device(device.clone())
            .build(FolderBurnDataset::from_loader(&test_set, config.image_size));

    let mut optimizer = SgdConfig::new()
        .with_momentum(Some(MomentumConfig::new().with_momentum(config.momentum)))
        .init();
    let mut scheduler = LrScheduler::new(config.schedule.clone(), config.learning_rate);

    let progress = ProgressBar::new(config.epochs as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} epochs {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut model = model;
    let mut best_accuracy = 0.0f64;
    let mut history = Vec::with_capacity(config.epochs);
    let num_batches = train_size.div_ceil(config.batch_size);

    for epoch in 0..config.epochs {
        info!("Epoch {}/{}", epoch + 1, config.epochs);

        // Train phase; the schedule advances before the first batch
        scheduler.step();
        let lr = scheduler.lr();

        let loss_fn = CrossEntropyLossConfig::new().init(device);
        let mut tally = PhaseTally::new();

        for (batch_idx, batch) in train_loader.iter().enumerate() {
            let output = model.forward(batch.images.clone());
            let loss = loss_fn.forward(output.clone(), batch.targets.clone());

            let batch_size = batch.targets.dims()[0];
            let loss_value: f64 = loss.clone().into_scalar().elem();
            tally.record(loss_value, batch_size, count_correct(output, batch.targets));

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);

            if (batch_idx + 1) % PROGRESS_INTERVAL == 0 {
                info!(
                    "  Batch {:>4}/{}: running acc = {:.4}",
                    batch_idx + 1,
                    num_batches,
                    tally.running_accuracy()
                );
            }
        }

        let train_metrics = tally.finalize(train_size);
        info!(
            "train Loss: {:.4} Acc: {:.4}",
            train_metrics.loss, train_metrics.accuracy
        );

        // Test phase on the inner backend: no gradients, no dropout
        let test_metrics = evaluate(&model, test_loader.as_ref(), test_size, device);
        info!(
            "test Loss: {:.4} Acc: {:.4}",
            test_metrics.loss, test_metrics.accuracy
        );

        if test_metrics.accuracy > best_accuracy {
            best_accuracy = test_metrics.accuracy;
            let meta = CheckpointMeta::new(epoch, test_metrics.loss, test_metrics.accuracy, lr);
            checkpoint::save_model(&model, &config.output_dir, BEST_CHECKPOINT, &meta)?;
            info!("New best test accuracy: {:.4}", best_accuracy);
        }

        history.push(EpochRecord {
            epoch,
            train: train_metrics,
            test: test_metrics,
            learning_rate: lr,
        });

        progress.set_message(format!(
            "train {:.4} / test {:.4}",
            train_metrics.accuracy, test_metrics.accuracy
        ));
        progress.inc(1);
    }

    progress.finish_with_message("training complete");

    // Final parameters, written independently of the best checkpoint
    let final_meta = match history.last() {
        Some(rec) => CheckpointMeta::new(rec.epoch, rec.test.loss, rec.test.accuracy, rec.learning_rate),
        None => CheckpointMeta::new(0, 0.0, 0.0, config.learning_rate),
    };
    checkpoint::save_model(&model, &config.output_dir, FINAL_CHECKPOINT, &final_meta)?;

    // Restore the best-performing weights observed during the run
    let model = if checkpoint::record_path(&config.output_dir, BEST_CHECKPOINT).exists() {
        checkpoint::load_model(model, &config.output_dir, BEST_CHECKPOINT, device)?
    } else {
        warn!("No epoch improved on the initial accuracy; keeping final-epoch weights");
        model
    };

    let elapsed = since.elapsed();
    info!(
        "Training complete in {}m {}s",
        elapsed.as_secs() / 60,
        elapsed.as_secs() % 60
    );
    info!("Best test Acc: {:.4}", best_accuracy);

    Ok((
        model,
        TrainReport {
            best_accuracy,
            elapsed_secs: elapsed.as_secs_f64(),
            history,
        },
    ))
}

/// Evaluate the model over one full pass of `loader`
fn evaluate<B: AutodiffBackend>(
    model: &Classifier<B>,
    loader: &dyn DataLoader<B::InnerBackend, ImageBatch<B::InnerBackend>>,
    split_size: usize,
    device: &B::Device,
) -> EpochMetrics {
    let model = model.valid();
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut tally = PhaseTally::new();

    for batch in loader.iter() {
        let output = model.forward(batch.images.clone());
        let loss = loss_fn.forward(output.clone(), batch.targets.clone());

        let batch_size = batch.targets.dims()[0];
        let loss_value: f64 = loss.into_scalar().elem();
        tally.record(loss_value, batch_size, count_correct(output, batch.targets));
    }

    tally.finalize(split_size)
}

/// Count predictions matching the targets
fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions: Tensor<B, 1, Int> = output.argmax(1).squeeze(1);
    let agreed: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    agreed as usize
}
