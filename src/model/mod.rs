//! Model assembly.
//!
//! A convolutional classifier split into a feature extractor and a
//! linear classification head, so fine-tuning can keep the pretrained
//! backbone while swapping the head for the target class count.

pub mod classifier;

pub use classifier::{load_pretrained, Classifier, ClassifierConfig, ConvBlock, FeatureExtractor};
