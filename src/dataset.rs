use std::{path::PathBuf, sync::Arc};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};

use crate::{
    annotation::AnnotationParser, error::Result, image_data, sparse::SparseLabels,
    utils::vocabulary::VocabularyTable,
};

/// One annotation entry before anything is read from disk.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image_path: PathBuf,
    pub label: String,
}

/// Raw samples discovered from a set of annotation files.
pub struct AnnotationDataset {
    samples: Vec<Sample>,
}

impl AnnotationDataset {
    pub fn new(annotation_paths: &str, parser: &AnnotationParser) -> Result<Self> {
        Ok(Self {
            samples: parser.parse(annotation_paths)?,
        })
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl Dataset<Sample> for AnnotationDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EncodedSample {
    /// Row-major `[height, width]` luma values in `[0, 1]`.
    pub image: Vec<f32>,
    pub image_height: usize,
    pub image_width: usize,
    pub label_ids: Vec<i32>,
}

/// Turns a [`Sample`] into image values plus vocabulary ids.
#[derive(Clone, Debug)]
pub struct SampleEncoder {
    vocabulary: Arc<VocabularyTable>,
    image_height: u32,
    image_width: u32,
}

impl SampleEncoder {
    pub fn new(vocabulary: Arc<VocabularyTable>, image_height: u32, image_width: u32) -> Self {
        Self {
            vocabulary,
            image_height,
            image_width,
        }
    }

    pub fn encode(&self, sample: &Sample) -> Result<EncodedSample> {
        let image =
            image_data::read_image(&sample.image_path, self.image_height, self.image_width)?;
        let label_ids = self.vocabulary.encode(&sample.label);

        Ok(EncodedSample {
            image,
            image_height: self.image_height as usize,
            image_width: self.image_width as usize,
            label_ids,
        })
    }
}

#[derive(Clone, Debug)]
pub struct OcrBatch<B: Backend> {
    /// `[batch, height, width, 1]`
    pub images: Tensor<B, 4>,
    pub labels: SparseLabels,
}

impl<B: Backend> OcrBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.batch_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OcrBatcher;

impl<B: Backend> Batcher<B, EncodedSample, OcrBatch<B>> for OcrBatcher {
    fn batch(&self, items: Vec<EncodedSample>, device: &B::Device) -> OcrBatch<B> {
        let batch_size = items.len();
        let (height, width) = items
            .first()
            .map_or((0, 0), |item| (item.image_height, item.image_width));

        let mut images = Vec::with_capacity(batch_size * height * width);
        let mut targets = Vec::with_capacity(batch_size);
        for item in items {
            images.extend(item.image);
            targets.push(item.label_ids);
        }

        let data =
            TensorData::new(images, [batch_size, height, width, 1]).convert::<B::FloatElem>();
        let images = Tensor::<B, 4>::from_data(data, device);
        let labels = SparseLabels::from_sequences(&targets);

        OcrBatch { images, labels }
    }
}
