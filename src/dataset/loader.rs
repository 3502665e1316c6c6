//! Image-folder dataset loader.
//!
//! Scans a dataset laid out as one subdirectory per split, each holding
//! one subdirectory per class:
//!
//! ```text
//! root_dir/
//! ├── train/
//! │   ├── class_a/
//! │   │   ├── image1.jpg
//! │   │   └── image2.jpg
//! │   └── class_b/
//! │       └── ...
//! └── test/
//!     └── ...
//! ```
//!
//! Class label indices are assigned by sorted class-directory name, so
//! rescanning the same layout always yields the same mapping.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Error, Result};

/// File extensions recognized as images
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Dataset partition, named after its subdirectory on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Subdirectory name for this split
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single labeled image sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (the directory name)
    pub class_name: String,
}

/// One split of a folder-per-class image dataset
///
/// Read-only after construction: the sample list and the class mapping
/// never change for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct FolderDataset {
    /// Which split this sample set belongs to
    pub split: Split,
    /// All samples in the split
    pub samples: Vec<ImageSample>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
    /// Class names in label order
    class_names: Vec<String>,
}

impl FolderDataset {
    /// Scan one split of the dataset under `root_dir`
    ///
    /// Fails if the split directory is missing, contains no class
    /// directories, or contains no images.
    pub fn new<P: AsRef<Path>>(root_dir: P, split: Split) -> Result<Self> {
        let split_dir = root_dir.as_ref().join(split.as_str());
        info!("Loading {} split from: {}", split, split_dir.display());

        if !split_dir.is_dir() {
            return Err(Error::Dataset(format!(
                "split directory does not exist: {}",
                split_dir.display()
            )));
        }

        // Discover class directories; sorted order fixes the label indices
        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&split_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(Error::Dataset(format!(
                "no class directories found in {}",
                split_dir.display()
            )));
        }

        let class_to_idx: HashMap<String, usize> = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut samples = Vec::new();
        for class_name in &class_names {
            let class_dir = split_dir.join(class_name);
            let label = class_to_idx[class_name];

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                        samples.push(ImageSample {
                            path,
                            label,
                            class_name: class_name.clone(),
                        });
                    }
                }
            }

            debug!("Class '{}' mapped to label {}", class_name, label);
        }

        if samples.is_empty() {
            return Err(Error::Dataset(format!(
                "no images found in {}",
                split_dir.display()
            )));
        }

        info!(
            "Loaded {} samples across {} classes ({} split)",
            samples.len(),
            class_names.len(),
            split
        );

        Ok(Self {
            split,
            samples,
            class_to_idx,
            class_names,
        })
    }

    /// Number of samples in the split
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the split holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes in the split
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Class names in label order
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Sample count per class, indexed by label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Lay out `<root>/<split>/<class>/img_<i>.jpg` with empty files;
    /// the loader only inspects paths, not contents.
    fn write_layout(root: &Path, split: &str, classes: &[(&str, usize)]) {
        for (class, count) in classes {
            let dir = root.join(split).join(class);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..*count {
                fs::write(dir.join(format!("img_{}.jpg", i)), []).unwrap();
            }
        }
    }

    #[test]
    fn test_sorted_label_assignment() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "train", &[("zebra", 1), ("apple", 1), ("mango", 1)]);

        let dataset = FolderDataset::new(tmp.path(), Split::Train).unwrap();
        assert_eq!(dataset.num_classes(), 3);
        assert_eq!(dataset.class_to_idx["apple"], 0);
        assert_eq!(dataset.class_to_idx["mango"], 1);
        assert_eq!(dataset.class_to_idx["zebra"], 2);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "train", &[("b", 2), ("a", 3), ("c", 1)]);

        let first = FolderDataset::new(tmp.path(), Split::Train).unwrap();
        let second = FolderDataset::new(tmp.path(), Split::Train).unwrap();

        assert_eq!(first.class_to_idx, second.class_to_idx);
        assert_eq!(first.len(), second.len());
        assert_eq!(first.class_counts(), second.class_counts());
    }

    #[test]
    fn test_class_counts() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "test", &[("a", 3), ("b", 5)]);

        let dataset = FolderDataset::new(tmp.path(), Split::Test).unwrap();
        assert_eq!(dataset.len(), 8);
        assert_eq!(dataset.class_counts(), vec![3, 5]);
    }

    #[test]
    fn test_non_image_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "train", &[("a", 2)]);
        fs::write(tmp.path().join("train/a/notes.txt"), []).unwrap();

        let dataset = FolderDataset::new(tmp.path(), Split::Train).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_missing_split_fails() {
        let tmp = TempDir::new().unwrap();
        write_layout(tmp.path(), "train", &[("a", 1)]);

        let result = FolderDataset::new(tmp.path(), Split::Test);
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_empty_split_fails() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("train")).unwrap();

        let result = FolderDataset::new(tmp.path(), Split::Train);
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_split_names() {
        assert_eq!(Split::Train.to_string(), "train");
        assert_eq!(Split::Test.to_string(), "test");
    }
}
