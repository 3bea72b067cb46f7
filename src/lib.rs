pub mod annotation;
pub mod dataset;
pub mod error;
pub mod image_data;
pub mod loader;
pub mod parse_config;
pub mod sparse;
pub mod utils;

pub use error::{OcrDataError, Result};
pub use loader::{OcrBatchIter, OcrDataLoader};
pub use parse_config::{LoaderConfig, Repeat};
