use std::path::PathBuf;

use burn::backend::{ndarray::NdArrayDevice, NdArray};
use clap::Parser;
use ocr_dataloader::{
    parse_config::{DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH},
    utils::init_tracing,
    LoaderConfig, OcrDataLoader,
};

/// Loads an OCR dataset and prints one batch.
#[derive(Parser)]
#[command(name = "ocr-dataloader")]
struct Args {
    /// Comma-separated annotation files
    #[arg(short = 'p', long = "annotation_paths")]
    annotation_paths: String,

    /// Character table, one character per line
    #[arg(short = 't', long = "table_path")]
    table_path: String,

    /// Optional YAML file with DATA/LOADER settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LoaderConfig::from_yaml_with_paths(
            path,
            Some(args.annotation_paths),
            Some(args.table_path),
        )?,
        None => LoaderConfig::new(
            args.annotation_paths,
            DEFAULT_IMAGE_HEIGHT,
            DEFAULT_IMAGE_WIDTH,
            args.table_path,
        )
        .with_batch_size(2)
        .with_shuffle(true),
    };
    let blank_index = config.blank_index;

    let dataloader = OcrDataLoader::<NdArray>::new(config, NdArrayDevice::Cpu)?;
    println!("Total have {} data", dataloader.len());

    match dataloader.iter().next() {
        Some(batch) => {
            println!("The image's shape: {:?}", batch.images.dims());
            println!("label is");
            for row in batch.labels.to_dense(blank_index) {
                println!("{:?}", row);
            }
        }
        None => tracing::info!("no batch could be decoded"),
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_flag_is_optional() {
        let args = Args::try_parse_from([
            "ocr-dataloader",
            "--annotation_paths",
            "a.txt,b.txt",
            "--table_path",
            "table.txt",
        ])
        .unwrap();
        assert_eq!(args.annotation_paths, "a.txt,b.txt");
        assert_eq!(args.table_path, "table.txt");
        assert!(args.config.is_none());

        let args = Args::try_parse_from([
            "ocr-dataloader",
            "-p",
            "a.txt",
            "-t",
            "table.txt",
            "-c",
            "config.yaml",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("config.yaml")));
    }

    #[test]
    fn test_table_path_is_required() {
        let res = Args::try_parse_from(["ocr-dataloader", "-p", "a.txt"]);
        assert!(res.is_err());
    }
}
