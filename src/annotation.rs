use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    dataset::Sample,
    error::{OcrDataError, Result},
};

/// Derives the label of one annotation line from its whitespace tokens.
///
/// `tokens[0]` is always the image filename.
pub trait LabelRule: Send + Sync {
    fn label(&self, tokens: &[&str]) -> Option<String>;
}

/// MjSynth convention: `XX_label_XX.jpg XX`, the label is the second
/// `_`-separated field of the filename.
///
/// This only fits MjSynth (<https://www.robots.ox.ac.uk/~vgg/data/text/>);
/// other datasets need their own rule.
#[derive(Clone, Copy, Debug, Default)]
pub struct MjSynthLabel;

impl LabelRule for MjSynthLabel {
    fn label(&self, tokens: &[&str]) -> Option<String> {
        let filename = tokens.first()?;
        filename.split('_').nth(1).map(str::to_string)
    }
}

/// `XX.jpg label`: the label is the token after the filename.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdjacentLabel;

impl LabelRule for AdjacentLabel {
    fn label(&self, tokens: &[&str]) -> Option<String> {
        tokens.get(1).map(|label| label.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelFormat {
    #[default]
    #[serde(rename = "mjsynth")]
    MjSynth,
    Adjacent,
}

impl LabelFormat {
    pub fn rule(self) -> Box<dyn LabelRule> {
        match self {
            LabelFormat::MjSynth => Box::new(MjSynthLabel),
            LabelFormat::Adjacent => Box::new(AdjacentLabel),
        }
    }
}

pub struct AnnotationParser {
    rule: Box<dyn LabelRule>,
}

impl Default for AnnotationParser {
    fn default() -> Self {
        Self::new(MjSynthLabel)
    }
}

impl AnnotationParser {
    pub fn new<R: LabelRule + 'static>(rule: R) -> Self {
        Self {
            rule: Box::new(rule),
        }
    }

    pub fn with_format(format: LabelFormat) -> Self {
        Self {
            rule: format.rule(),
        }
    }

    /// Reads every annotation file of the comma-separated `annotation_paths`
    /// and concatenates their samples in file order, then line order.
    ///
    /// Malformed lines are skipped with a warning.
    pub fn parse(&self, annotation_paths: &str) -> Result<Vec<Sample>> {
        let paths = split_annotation_paths(annotation_paths);
        if paths.is_empty() {
            return Err(OcrDataError::config("no annotation paths given"));
        }

        let mut samples = Vec::new();
        for path in paths {
            samples.extend(self.parse_file(Path::new(path))?);
        }

        Ok(samples)
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<Sample>> {
        let content = fs::read_to_string(path).map_err(|e| {
            OcrDataError::config(format!(
                "failed to read annotation file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut samples = Vec::new();
        let mut skipped = 0;
        for (idx, row) in content.lines().enumerate() {
            if row.trim().is_empty() {
                continue;
            }
            match self.parse_line(path, row) {
                Ok(sample) => samples.push(sample),
                Err(reason) => {
                    let err = OcrDataError::Parse {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        reason,
                    };
                    tracing::warn!("skipping line: {}", err);
                    skipped += 1;
                }
            }
        }

        tracing::debug!(
            "{}: {} samples, {} lines skipped",
            path.display(),
            samples.len(),
            skipped
        );

        Ok(samples)
    }

    fn parse_line(
        &self,
        annotation_path: &Path,
        row: &str,
    ) -> std::result::Result<Sample, String> {
        let tokens: Vec<&str> = row.split_whitespace().collect();
        let filename = tokens.first().ok_or_else(|| "no tokens".to_string())?;
        let label = self
            .rule
            .label(&tokens)
            .ok_or_else(|| format!("cannot derive a label from '{}'", row.trim()))?;

        Ok(Sample {
            image_path: resolve_image_path(annotation_path, filename),
            label,
        })
    }
}

fn split_annotation_paths(annotation_paths: &str) -> Vec<&str> {
    annotation_paths
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .collect()
}

/// Resolves `filename` against the directory holding `annotation_path`.
pub fn resolve_image_path(annotation_path: &Path, filename: &str) -> PathBuf {
    annotation_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(filename)
}
