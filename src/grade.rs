use std::{
    path::PathBuf,
    sync::{mpsc, Arc},
    time::{Duration, Instant},
};

use image::DynamicImage;
use log::{debug, warn};
use logging_timer::time;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::{
    binarize::{binarize, BinarizeOptions},
    consolidate::consolidate_answers,
    debug::{draw_boundary_debug_image_mut, draw_field_marks_debug_image_mut, ImageDebugWriter},
    fields::{evaluate_fields, FieldMark},
    locate::{locate_sheet, LocateError, LocateOptions},
    score::GradingResult,
    template::AnswerTemplate,
    types::OptionLabel,
};

#[derive(Debug, Clone, Default)]
pub struct GradeOptions {
    pub locate: LocateOptions,
    pub binarize: BinarizeOptions,
    /// Fill percentage at which a field counts as marked. Derived from the
    /// binarization method when unset.
    pub mark_threshold: Option<f32>,
    /// Wall-clock limit for a whole batch.
    pub deadline: Option<Duration>,
    pub debug: bool,
}

impl GradeOptions {
    pub fn mark_threshold(&self) -> f32 {
        self.mark_threshold
            .unwrap_or_else(|| self.binarize.method.default_mark_threshold())
    }
}

#[derive(Debug, Error)]
pub enum GradeImageError {
    #[error("unable to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("unable to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error("grading did not finish before the deadline")]
    DeadlineExceeded,
}

/// Where a photo's encoded bytes come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Memory(Vec<u8>),
}

impl ImageSource {
    pub fn decode(&self) -> Result<DynamicImage, GradeImageError> {
        match self {
            ImageSource::File(path) => {
                let bytes =
                    std::fs::read(path).map_err(|e| GradeImageError::Read(path.clone(), e))?;
                Ok(image::load_from_memory(&bytes)?)
            }
            ImageSource::Memory(bytes) => Ok(image::load_from_memory(bytes)?),
        }
    }
}

/// One slot of a batch response: the grading result, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ImageOutcome {
    Graded(GradingResult),
    Failed { error: String },
}

impl From<Result<GradingResult, GradeImageError>> for ImageOutcome {
    fn from(result: Result<GradingResult, GradeImageError>) -> Self {
        match result {
            Ok(graded) => ImageOutcome::Graded(graded),
            Err(e) => ImageOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeResponse {
    pub results: Vec<ImageOutcome>,
}

/// Turns the evaluated fields of one sheet into its answers and score.
fn grade_marks(
    marks: &[FieldMark],
    expected: &[OptionLabel],
    template: &AnswerTemplate,
) -> GradingResult {
    let answers = consolidate_answers(marks, template.question_count);
    GradingResult::new(answers, expected)
}

/// Runs the whole pipeline on one decoded photo.
#[time]
pub fn grade_photo(
    photo: &DynamicImage,
    expected: &[OptionLabel],
    template: &AnswerTemplate,
    options: &GradeOptions,
    debug: &ImageDebugWriter,
) -> Result<GradingResult, LocateError> {
    let located = locate_sheet(photo, &options.locate)?;
    debug.write("boundary", &located.working_image, |canvas| {
        draw_boundary_debug_image_mut(canvas, &located)
    });

    let mask = binarize(&located.normalized, &options.binarize);
    let marks = evaluate_fields(&mask, template, options.mark_threshold());
    debug.write("fields", &located.normalized, |canvas| {
        draw_field_marks_debug_image_mut(canvas, template, &marks)
    });

    Ok(grade_marks(&marks, expected, template))
}

/// Grades photos against one shared, read-only template.
#[derive(Debug, Clone)]
pub struct Grader {
    template: Arc<AnswerTemplate>,
    options: Arc<GradeOptions>,
}

impl Grader {
    /// The template's canonical size and mark threshold take precedence over
    /// the ones in `options`, unless a mark threshold was set explicitly.
    pub fn new(template: AnswerTemplate, mut options: GradeOptions) -> Self {
        options.locate.canonical_size = template.canonical_size;
        if options.mark_threshold.is_none() {
            options.mark_threshold = template.mark_threshold;
        }
        Self {
            template: Arc::new(template),
            options: Arc::new(options),
        }
    }

    pub fn template(&self) -> &AnswerTemplate {
        &self.template
    }

    pub fn options(&self) -> &GradeOptions {
        &self.options
    }

    pub fn grade(
        &self,
        source: &ImageSource,
        expected: &[OptionLabel],
    ) -> Result<GradingResult, GradeImageError> {
        let debug = match source {
            ImageSource::File(path) if self.options.debug => ImageDebugWriter::new(path.clone()),
            _ => ImageDebugWriter::disabled(),
        };
        let photo = source.decode()?;
        let result = grade_photo(&photo, expected, &self.template, &self.options, &debug)?;
        Ok(result)
    }

    /// Grades every photo independently, keeping submission order. A photo
    /// that fails, or is still running at the deadline, fails alone.
    #[time]
    pub fn grade_batch(&self, sources: Vec<ImageSource>, expected: &[OptionLabel]) -> GradeResponse {
        let results = match self.options.deadline {
            None => sources
                .par_iter()
                .map(|source| self.grade(source, expected))
                .collect::<Vec<_>>(),
            Some(deadline) => self.grade_batch_with_deadline(sources, expected, deadline),
        };

        GradeResponse {
            results: results
                .into_iter()
                .enumerate()
                .map(|(index, result)| {
                    if let Err(e) = &result {
                        warn!("image {}: {}", index, e);
                    }
                    ImageOutcome::from(result)
                })
                .collect(),
        }
    }

    fn grade_batch_with_deadline(
        &self,
        sources: Vec<ImageSource>,
        expected: &[OptionLabel],
        deadline: Duration,
    ) -> Vec<Result<GradingResult, GradeImageError>> {
        let deadline_at = Instant::now() + deadline;
        let expected: Arc<[OptionLabel]> = expected.into();
        let count = sources.len();
        let (sender, receiver) = mpsc::channel();

        for (index, source) in sources.into_iter().enumerate() {
            let grader = self.clone();
            let expected = Arc::clone(&expected);
            let sender = sender.clone();
            rayon::spawn(move || {
                let result = grader.grade(&source, &expected);
                // the receiver is gone once the deadline has passed
                let _ = sender.send((index, result));
            });
        }
        drop(sender);

        let mut results = (0..count).map(|_| None).collect::<Vec<_>>();
        let mut remaining = count;
        while remaining > 0 {
            let timeout = deadline_at.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(timeout) {
                Ok((index, result)) => {
                    results[index] = Some(result);
                    remaining -= 1;
                }
                Err(_) => break,
            }
        }
        if remaining > 0 {
            debug!("{} of {} images missed the deadline", remaining, count);
        }

        results
            .into_iter()
            .map(|result| result.unwrap_or(Err(GradeImageError::DeadlineExceeded)))
            .collect()
    }
}
