use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    annotation::LabelFormat,
    error::{OcrDataError, Result},
};

/// How many times the batch sequence is replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    Times(usize),
    Forever,
}

impl Repeat {
    /// A negative count means forever.
    pub fn from_count(count: i64) -> Self {
        match usize::try_from(count) {
            Ok(times) => Repeat::Times(times),
            Err(_) => Repeat::Forever,
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Times(1)
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct DataYaml {
    annotation_paths: Option<String>,
    table_path: Option<String>,
    #[serde(default)]
    label_format: LabelFormat,
    image_height: Option<u32>,
    image_width: Option<u32>,
    #[serde(default)]
    blank_index: i32,
}

#[derive(Serialize, Deserialize, Debug)]
struct LoaderYaml {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    shuffle: bool,
    #[serde(default = "default_repeat")]
    repeat: i64,
    #[serde(default)]
    seed: u64,
    #[serde(default)]
    num_workers: Option<usize>,
    #[serde(default = "default_prefetch_batches")]
    prefetch_batches: usize,
}

impl Default for LoaderYaml {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            shuffle: false,
            repeat: default_repeat(),
            seed: 0,
            num_workers: None,
            prefetch_batches: default_prefetch_batches(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "UPPERCASE")]
struct OcrDataConfigYaml {
    #[serde(default)]
    data: DataYaml,
    #[serde(default)]
    loader: LoaderYaml,
}

fn default_batch_size() -> usize {
    1
}

fn default_repeat() -> i64 {
    1
}

fn default_prefetch_batches() -> usize {
    2
}

pub const DEFAULT_IMAGE_HEIGHT: u32 = 32;
pub const DEFAULT_IMAGE_WIDTH: u32 = 100;

#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Comma-separated annotation files.
    pub annotation_paths: String,
    pub image_height: u32,
    pub image_width: u32,
    pub table_path: String,
    pub blank_index: i32,
    pub batch_size: usize,
    pub shuffle: bool,
    pub repeat: Repeat,
    pub seed: u64,
    pub label_format: LabelFormat,
    /// Size of the decode pool, rayon's default when `None`.
    pub num_workers: Option<usize>,
    /// Encoded batches allowed to wait ahead of the consumer.
    pub prefetch_batches: usize,
}

impl LoaderConfig {
    pub fn new(
        annotation_paths: impl Into<String>,
        image_height: u32,
        image_width: u32,
        table_path: impl Into<String>,
    ) -> Self {
        Self {
            annotation_paths: annotation_paths.into(),
            image_height,
            image_width,
            table_path: table_path.into(),
            blank_index: 0,
            batch_size: default_batch_size(),
            shuffle: false,
            repeat: Repeat::default(),
            seed: 0,
            label_format: LabelFormat::default(),
            num_workers: None,
            prefetch_batches: default_prefetch_batches(),
        }
    }

    pub fn with_blank_index(mut self, blank_index: i32) -> Self {
        self.blank_index = blank_index;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_label_format(mut self, label_format: LabelFormat) -> Self {
        self.label_format = label_format;
        self
    }

    pub fn with_num_workers(mut self, num_workers: Option<usize>) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_prefetch_batches(mut self, prefetch_batches: usize) -> Self {
        self.prefetch_batches = prefetch_batches;
        self
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml_with_paths(path, None, None)
    }

    /// Reads a YAML config; `annotation_paths`/`table_path`, when given, take
    /// precedence over the file's `DATA` section.
    pub fn from_yaml_with_paths<P: AsRef<Path>>(
        path: P,
        annotation_paths: Option<String>,
        table_path: Option<String>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            OcrDataError::config(format!(
                "failed to read config '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml_str(&content, annotation_paths, table_path)
    }

    pub fn from_yaml_str(
        content: &str,
        annotation_paths: Option<String>,
        table_path: Option<String>,
    ) -> Result<Self> {
        let yaml: OcrDataConfigYaml = serde_yaml::from_str(content)?;

        let annotation_paths = annotation_paths
            .or(yaml.data.annotation_paths)
            .ok_or_else(|| OcrDataError::config("annotation_paths is required"))?;
        let table_path = table_path
            .or(yaml.data.table_path)
            .ok_or_else(|| OcrDataError::config("table_path is required"))?;

        let config = Self {
            annotation_paths,
            image_height: yaml.data.image_height.unwrap_or(DEFAULT_IMAGE_HEIGHT),
            image_width: yaml.data.image_width.unwrap_or(DEFAULT_IMAGE_WIDTH),
            table_path,
            blank_index: yaml.data.blank_index,
            batch_size: yaml.loader.batch_size,
            shuffle: yaml.loader.shuffle,
            repeat: Repeat::from_count(yaml.loader.repeat),
            seed: yaml.loader.seed,
            label_format: yaml.data.label_format,
            num_workers: yaml.loader.num_workers,
            prefetch_batches: yaml.loader.prefetch_batches,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(OcrDataError::config("batch_size must be positive"));
        }
        if self.image_height == 0 || self.image_width == 0 {
            return Err(OcrDataError::config(format!(
                "image size must be positive, got {}x{}",
                self.image_height, self.image_width
            )));
        }
        if self.annotation_paths.split(',').all(|p| p.trim().is_empty()) {
            return Err(OcrDataError::config("no annotation paths given"));
        }
        if self.table_path.trim().is_empty() {
            return Err(OcrDataError::config("table_path is empty"));
        }
        if self.prefetch_batches == 0 {
            return Err(OcrDataError::config("prefetch_batches must be positive"));
        }
        if self.num_workers == Some(0) {
            return Err(OcrDataError::config("num_workers must be positive"));
        }

        Ok(())
    }
}
