use std::{
    sync::{
        mpsc::{self, Receiver, SyncSender},
        Arc,
    },
    thread,
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::backend::Backend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

use crate::{
    annotation::AnnotationParser,
    dataset::{AnnotationDataset, EncodedSample, OcrBatch, OcrBatcher, SampleEncoder},
    error::{OcrDataError, Result},
    parse_config::{LoaderConfig, Repeat},
    utils::vocabulary::VocabularyTable,
};

/// Turns annotation files into a restartable sequence of [`OcrBatch`]es.
///
/// Samples whose image cannot be decoded are dropped from their batch, so a
/// batch may hold fewer than `batch_size` samples.
pub struct OcrDataLoader<B: Backend> {
    plan: Arc<BatchPlan>,
    vocabulary: Arc<VocabularyTable>,
    prefetch_batches: usize,
    device: B::Device,
}

impl<B: Backend> OcrDataLoader<B> {
    pub fn new(config: LoaderConfig, device: B::Device) -> Result<Self> {
        config.validate()?;

        let vocabulary = Arc::new(VocabularyTable::load(
            &config.table_path,
            config.blank_index,
        )?);
        let parser = AnnotationParser::with_format(config.label_format);
        let dataset = AnnotationDataset::new(&config.annotation_paths, &parser)?;
        let encoder = SampleEncoder::new(
            vocabulary.clone(),
            config.image_height,
            config.image_width,
        );

        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("ocr-decode-{i}"));
        if let Some(num_workers) = config.num_workers {
            builder = builder.num_threads(num_workers);
        }
        let pool = builder
            .build()
            .map_err(|e| OcrDataError::config(format!("failed to build decode pool: {}", e)))?;

        tracing::debug!(
            "loader ready: {} samples, batch_size={}, shuffle={}, repeat={:?}",
            dataset.len(),
            config.batch_size,
            config.shuffle,
            config.repeat
        );

        Ok(Self {
            plan: Arc::new(BatchPlan {
                dataset,
                encoder,
                pool,
                batch_size: config.batch_size,
                shuffle: config.shuffle,
                repeat: config.repeat,
                seed: config.seed,
            }),
            vocabulary,
            prefetch_batches: config.prefetch_batches,
            device,
        })
    }

    /// Number of annotated samples, including ones that may later fail to decode.
    pub fn len(&self) -> usize {
        self.plan.dataset.len()
    }

    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vocabulary(&self) -> Arc<VocabularyTable> {
        self.vocabulary.clone()
    }

    /// Starts the batch sequence from the beginning. Every call yields the
    /// same sequence for the same seed.
    pub fn iter(&self) -> OcrBatchIter<B> {
        let (sender, receiver) = mpsc::sync_channel(self.prefetch_batches);
        let plan = self.plan.clone();
        thread::spawn(move || plan.produce(sender));

        OcrBatchIter {
            receiver,
            device: self.device.clone(),
        }
    }
}

/// Pull-based batch sequence. Dropping it stops the producer.
pub struct OcrBatchIter<B: Backend> {
    receiver: Receiver<Vec<EncodedSample>>,
    device: B::Device,
}

impl<B: Backend> Iterator for OcrBatchIter<B> {
    type Item = OcrBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        let items = self.receiver.recv().ok()?;
        let batch: OcrBatch<B> = OcrBatcher.batch(items, &self.device);
        Some(batch)
    }
}

struct BatchPlan {
    dataset: AnnotationDataset,
    encoder: SampleEncoder,
    pool: ThreadPool,
    batch_size: usize,
    shuffle: bool,
    repeat: Repeat,
    seed: u64,
}

impl BatchPlan {
    fn produce(&self, sender: SyncSender<Vec<EncodedSample>>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        let mut pass = 0;

        while self.has_pass(pass) {
            if self.shuffle {
                order.shuffle(&mut rng);
            }

            let mut emitted = 0;
            for chunk in order.chunks(self.batch_size) {
                let items = self.encode_chunk(chunk);
                if items.is_empty() {
                    continue;
                }
                if sender.send(items).is_err() {
                    // consumer dropped the iterator
                    return;
                }
                emitted += 1;
            }

            if emitted == 0 {
                tracing::warn!("pass {} produced no batch, stopping", pass);
                return;
            }
            pass += 1;
        }
    }

    fn has_pass(&self, pass: usize) -> bool {
        match self.repeat {
            Repeat::Times(times) => pass < times,
            Repeat::Forever => true,
        }
    }

    /// Encodes one chunk on the decode pool, keeping chunk order and
    /// dropping samples that fail.
    fn encode_chunk(&self, chunk: &[usize]) -> Vec<EncodedSample> {
        let encoded: Vec<Option<EncodedSample>> = self.pool.install(|| {
            chunk
                .par_iter()
                .map(|&index| {
                    let sample = self.dataset.get(index)?;
                    match self.encoder.encode(&sample) {
                        Ok(item) => Some(item),
                        Err(err) => {
                            tracing::warn!("dropping sample {}: {}", index, err);
                            None
                        }
                    }
                })
                .collect()
        });

        encoded.into_iter().flatten().collect()
    }
}
