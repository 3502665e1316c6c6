//! Dataset loading, preprocessing and batching.
//!
//! - `loader`: scans the `<root>/{train,test}/<class>/<image>` layout
//!   into labeled sample sets
//! - `transform`: the fixed preprocessing applied identically to both
//!   splits
//! - `burn_dataset`: Burn `Dataset`/`Batcher` implementations feeding the
//!   training loop

pub mod burn_dataset;
pub mod loader;
pub mod transform;

pub use burn_dataset::{denormalize, normalize, FolderBurnDataset, ImageBatch, ImageBatcher, ImageItem};
pub use loader::{FolderDataset, ImageSample, Split};
