use std::path::{Path, PathBuf};

use image::RgbImage;
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use log::{debug, warn};

use crate::{
    fields::FieldMark,
    image_utils::{BLUE, GREEN, RED},
    locate::LocatedSheet,
    template::AnswerTemplate,
};

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_string_lossy(),
        label
    ));
    result
}

/// Writes annotated copies of intermediate images next to the input photo.
#[derive(Debug, Clone)]
pub struct ImageDebugWriter {
    input_path: Option<PathBuf>,
}

impl ImageDebugWriter {
    pub fn new(input_path: PathBuf) -> Self {
        Self {
            input_path: Some(input_path),
        }
    }

    pub fn disabled() -> Self {
        Self { input_path: None }
    }

    /// Draws on a copy of `base` and saves it, if enabled.
    pub fn write(&self, label: &str, base: &RgbImage, draw: impl FnOnce(&mut RgbImage)) {
        let input_path = match &self.input_path {
            Some(input_path) => input_path,
            None => return,
        };

        let mut canvas = base.clone();
        draw(&mut canvas);

        let output_path = debug_image_path(input_path, label);
        match canvas.save(&output_path) {
            Ok(()) => debug!("wrote debug image {}", output_path.display()),
            Err(e) => warn!("unable to write {}: {}", output_path.display(), e),
        }
    }
}

/// Outlines where the sheet was found in the working-resolution photo.
pub fn draw_boundary_debug_image_mut(canvas: &mut RgbImage, located: &LocatedSheet) {
    draw_hollow_rect_mut(canvas, located.boundary.to_rect(), GREEN);

    if let Some(quad) = located.corners {
        let corners = quad.corners();
        for (i, start) in corners.iter().enumerate() {
            let end = corners[(i + 1) % corners.len()];
            draw_line_segment_mut(canvas, (start.x, start.y), (end.x, end.y), BLUE);
        }
    }
}

/// Outlines every field of the template on the normalized sheet, marked
/// fields in blue and the rest in red.
pub fn draw_field_marks_debug_image_mut(
    canvas: &mut RgbImage,
    template: &AnswerTemplate,
    marks: &[FieldMark],
) {
    for (field, mark) in template.fields.iter().zip(marks) {
        let color = if mark.is_marked { BLUE } else { RED };
        draw_hollow_rect_mut(canvas, field.region.to_rect(), color);
    }
}
