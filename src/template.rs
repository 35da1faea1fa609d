use std::path::{Path, PathBuf};

use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OptionLabel, Size};

/// Canonical sheet size used when the definition does not name one.
pub const DEFAULT_CANONICAL_SIZE: Size<u32> = Size::new(400, 500);

/// The on-disk answer sheet definition. `fields` and `labels` are
/// index-aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDefinition {
    #[serde(default)]
    pub title: String,
    pub canonical_size: Option<Size<u32>>,
    pub fields: Vec<[u32; 4]>,
    pub labels: Vec<String>,
    pub mark_threshold: Option<f32>,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unable to read sheet definition {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("unable to parse sheet definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("sheet definition has no fields")]
    Empty,
    #[error("sheet definition has {fields} fields but {labels} labels")]
    LengthMismatch { fields: usize, labels: usize },
    #[error("field {index} has invalid label {label:?}, expected <question>-<option>")]
    InvalidLabel { index: usize, label: String },
    #[error("field {index} ({label}) is empty or lies outside the {width}x{height} sheet")]
    RegionOutOfBounds {
        index: usize,
        label: String,
        width: u32,
        height: u32,
    },
    #[error("mark threshold {0} is not a percentage")]
    InvalidMarkThreshold(f32),
}

/// Accepts fill percentages from 0 to 100.
pub fn check_mark_threshold(threshold: f32) -> Result<f32, TemplateError> {
    if (0.0..=100.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(TemplateError::InvalidMarkThreshold(threshold))
    }
}

/// A rectangular region of the canonical sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FieldRegion {
    pub fn fits_within(&self, size: Size<u32>) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).map_or(false, |right| right <= size.width)
            && self.y.checked_add(self.height).map_or(false, |bottom| bottom <= size.height)
    }

    pub fn to_rect(self) -> Rect {
        Rect::at(self.x as i32, self.y as i32).of_size(self.width, self.height)
    }
}

/// Which question a field belongs to and which option it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLabel {
    pub question: u32,
    pub option: OptionLabel,
}

impl FieldLabel {
    /// Parses labels of the form `3-B`.
    pub fn parse(s: &str) -> Option<Self> {
        let (question, option) = s.trim().split_once('-')?;
        let question = question.trim().parse::<u32>().ok()?;
        let option = option.trim();
        if question == 0 || option.is_empty() {
            return None;
        }
        Some(Self {
            question,
            option: OptionLabel::from(option.to_string()),
        })
    }
}

impl std::fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.question, self.option)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    pub region: FieldRegion,
    pub label: FieldLabel,
}

/// The validated, read-only field template shared by every image.
#[derive(Debug, Clone)]
pub struct AnswerTemplate {
    pub title: String,
    pub canonical_size: Size<u32>,
    pub fields: Vec<TemplateField>,
    pub question_count: u32,
    pub mark_threshold: Option<f32>,
}

impl AnswerTemplate {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| TemplateError::Read(path.to_path_buf(), e))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let definition: SheetDefinition = serde_json::from_str(json)?;
        Self::try_from(definition)
    }
}

impl TryFrom<SheetDefinition> for AnswerTemplate {
    type Error = TemplateError;

    fn try_from(definition: SheetDefinition) -> Result<Self, Self::Error> {
        if definition.fields.len() != definition.labels.len() {
            return Err(TemplateError::LengthMismatch {
                fields: definition.fields.len(),
                labels: definition.labels.len(),
            });
        }
        if definition.fields.is_empty() {
            return Err(TemplateError::Empty);
        }
        let mark_threshold = definition
            .mark_threshold
            .map(check_mark_threshold)
            .transpose()?;

        let canonical_size = definition.canonical_size.unwrap_or(DEFAULT_CANONICAL_SIZE);
        let fields = definition
            .fields
            .iter()
            .zip(definition.labels.iter())
            .enumerate()
            .map(|(index, (&[x, y, width, height], label))| {
                let parsed = FieldLabel::parse(label).ok_or_else(|| TemplateError::InvalidLabel {
                    index,
                    label: label.clone(),
                })?;
                let region = FieldRegion {
                    x,
                    y,
                    width,
                    height,
                };
                if !region.fits_within(canonical_size) {
                    return Err(TemplateError::RegionOutOfBounds {
                        index,
                        label: label.clone(),
                        width: canonical_size.width,
                        height: canonical_size.height,
                    });
                }
                Ok(TemplateField {
                    region,
                    label: parsed,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let question_count = fields
            .iter()
            .map(|field| field.label.question)
            .max()
            .unwrap_or_default();

        Ok(Self {
            title: definition.title,
            canonical_size,
            fields,
            question_count,
            mark_threshold,
        })
    }
}
