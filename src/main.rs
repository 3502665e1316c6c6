//! Fine-tuning CLI.
//!
//! Fine-tunes a pretrained convolutional classifier on a
//! folder-per-class image dataset with `train/` and `test/` splits,
//! then writes best and final checkpoints.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use imgclass_finetune::backend::{backend_name, default_device, TrainingBackend};
use imgclass_finetune::model::{load_pretrained, ClassifierConfig};
use imgclass_finetune::training::scheduler::LrSchedule;
use imgclass_finetune::training::trainer::{train, TrainConfig};
use imgclass_finetune::utils::logging::{init_logging, LogConfig};

/// Fine-tune a pretrained image classifier
#[derive(Parser, Debug)]
#[command(
    name = "imgclass-finetune",
    version,
    about = "Fine-tune a pretrained image classifier on a folder-per-class dataset",
    long_about = "Fine-tune a pretrained convolutional classifier on a dataset laid out as \
                  <data_dir>/{train,test}/<class_name>/<image>. Tracks the best test accuracy \
                  across epochs and writes best and final checkpoints."
)]
struct Args {
    /// Path to a TOML training configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dataset root containing train/ and test/ splits
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Output directory for checkpoints
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of target classes
    #[arg(long, value_name = "N")]
    num_classes: Option<usize>,

    /// Number of training epochs
    #[arg(short, long, value_name = "N")]
    epochs: Option<usize>,

    /// Batch size
    #[arg(short, long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// Base learning rate
    #[arg(short, long, value_name = "LR")]
    lr: Option<f64>,

    /// SGD momentum
    #[arg(long, value_name = "M")]
    momentum: Option<f64>,

    /// Epochs between learning-rate decays
    #[arg(long, value_name = "N")]
    lr_step: Option<usize>,

    /// Learning-rate decay factor
    #[arg(long, value_name = "GAMMA")]
    lr_gamma: Option<f64>,

    /// Number of data-loading workers
    #[arg(long, value_name = "N")]
    num_workers: Option<usize>,

    /// Pretrained weights record to fine-tune from
    #[arg(short, long, value_name = "FILE")]
    pretrained: Option<PathBuf>,

    /// Class count of the pretrained head
    #[arg(long, value_name = "N", default_value = "1000")]
    pretrained_classes: usize,

    /// Random seed for batch shuffling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_logging(&log_config).context("failed to initialize logging")?;

    let mut config = match &args.config {
        Some(path) => load_config(path).context("failed to load configuration file")?,
        None => TrainConfig::default(),
    };
    apply_overrides(&mut config, &args);
    validate_config(&config)?;

    info!("imgclass-finetune v{}", imgclass_finetune::VERSION);
    info!("Backend: {}", backend_name());
    print_config_summary(&config);

    let device = default_device();
    let model_config = ClassifierConfig::new().with_num_classes(config.num_classes);
    let model = match &args.pretrained {
        Some(path) => {
            load_pretrained::<TrainingBackend>(model_config, path, args.pretrained_classes, &device)
                .context("failed to assemble pretrained model")?
        }
        None => {
            warn!("No pretrained weights given; training from random initialization");
            model_config.init::<TrainingBackend>(&device)
        }
    };

    let (_model, report) = train(&config, model, &device).context("training failed")?;

    info!("Best test accuracy: {:.4}", report.best_accuracy);
    info!("Checkpoints saved to: {}", config.output_dir.display());

    Ok(())
}

fn load_config(path: &PathBuf) -> Result<TrainConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: TrainConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

fn apply_overrides(config: &mut TrainConfig, args: &Args) {
    if let Some(ref data_dir) = args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(ref output) = args.output {
        config.output_dir = output.clone();
    }
    if let Some(num_classes) = args.num_classes {
        config.num_classes = num_classes;
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        config.learning_rate = lr;
    }
    if let Some(momentum) = args.momentum {
        config.momentum = momentum;
    }
    if let Some(num_workers) = args.num_workers {
        config.num_workers = num_workers;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    if args.lr_step.is_some() || args.lr_gamma.is_some() {
        let (mut step_size, mut gamma) = match config.schedule {
            LrSchedule::Step { step_size, gamma } => (step_size, gamma),
            LrSchedule::Constant => (7, 0.1),
        };
        if let Some(step) = args.lr_step {
            step_size = step;
        }
        if let Some(g) = args.lr_gamma {
            gamma = g;
        }
        config.schedule = LrSchedule::Step { step_size, gamma };
    }
}

fn validate_config(config: &TrainConfig) -> Result<()> {
    if !config.data_dir.exists() {
        anyhow::bail!("data directory does not exist: {}", config.data_dir.display());
    }
    if config.epochs == 0 {
        anyhow::bail!("number of epochs must be greater than 0");
    }
    if config.batch_size == 0 {
        anyhow::bail!("batch size must be greater than 0");
    }
    if config.learning_rate <= 0.0 {
        anyhow::bail!("learning rate must be positive");
    }
    if config.num_classes == 0 {
        anyhow::bail!("number of classes must be greater than 0");
    }
    Ok(())
}

fn print_config_summary(config: &TrainConfig) {
    info!("Configuration:");
    info!("  Data dir:      {}", config.data_dir.display());
    info!("  Output dir:    {}", config.output_dir.display());
    info!("  Classes:       {}", config.num_classes);
    info!("  Epochs:        {}", config.epochs);
    info!("  Batch size:    {}", config.batch_size);
    info!("  Workers:       {}", config.num_workers);
    info!("  Learning rate: {}", config.learning_rate);
    info!("  Momentum:      {}", config.momentum);
    info!("  Schedule:      {:?}", config.schedule);
    info!("  Image size:    {}", config.image_size);
    info!("  Seed:          {}", config.seed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> Args {
        Args {
            config: None,
            data_dir: None,
            output: None,
            num_classes: None,
            epochs: None,
            batch_size: None,
            lr: None,
            momentum: None,
            lr_step: None,
            lr_gamma: None,
            num_workers: None,
            pretrained: None,
            pretrained_classes: 1000,
            seed: None,
            verbose: false,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = TrainConfig::default();
        let mut args = default_args();
        args.epochs = Some(10);
        args.batch_size = Some(16);
        args.lr = Some(0.05);
        args.lr_gamma = Some(0.5);

        apply_overrides(&mut config, &args);

        assert_eq!(config.epochs, 10);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.learning_rate, 0.05);
        assert!(matches!(
            config.schedule,
            LrSchedule::Step { step_size: 7, gamma } if gamma == 0.5
        ));
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = TrainConfig {
            data_dir: tmp.path().to_path_buf(),
            ..TrainConfig::default()
        };
        assert!(validate_config(&config).is_ok());

        config.epochs = 0;
        assert!(validate_config(&config).is_err());

        config.epochs = 5;
        config.learning_rate = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_config() {
        let toml_str = "epochs = 3\nbatch_size = 32\n";
        let config: TrainConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 32);
        // Unspecified fields fall back to defaults
        assert_eq!(config.num_classes, imgclass_finetune::NUM_CLASSES);
    }
}
