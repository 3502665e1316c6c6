//! Training loop, learning-rate scheduling and checkpointing.

pub mod checkpoint;
pub mod scheduler;
pub mod trainer;

pub use checkpoint::{CheckpointMeta, BEST_CHECKPOINT, FINAL_CHECKPOINT};
pub use scheduler::{LrSchedule, LrScheduler};
pub use trainer::{train, EpochRecord, TrainConfig, TrainReport};
