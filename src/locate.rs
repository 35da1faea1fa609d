use image::{
    imageops::{self, FilterType},
    DynamicImage, GrayImage, Rgb, RgbImage,
};
use imageproc::{
    contours::{find_contours, BorderType},
    distance_transform::Norm,
    edges::canny,
    filter::gaussian_blur_f32,
    geometric_transformations::{warp_into, Interpolation, Projection},
    geometry::arc_length,
    morphology::dilate,
    point::Point,
};
use log::debug;
use logging_timer::time;
use thiserror::Error;

use crate::{
    geometry::{
        approximate_closed_polygon, bounding_box, polygon_area, to_f32_points, Quadrilateral,
    },
    image_utils::adaptive_threshold_inverted,
    template::DEFAULT_CANONICAL_SIZE,
    types::{BoundaryBox, Size},
};

/// Resolution every photo is resized to before the sheet is searched for.
pub const DEFAULT_WORKING_SIZE: Size<u32> = Size::new(600, 700);

/// How the sheet boundary is found within a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocateStrategy {
    /// Crop to the bounding box of the largest region outlined by an adaptive
    /// threshold. Fails when no region is large enough.
    LargestRegion,

    /// Warp the largest four-cornered outline found by edge detection onto
    /// the canonical rectangle. Falls back to the whole photo.
    #[default]
    Quadrilateral,
}

impl std::str::FromStr for LocateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "largest" | "largest-region" => Ok(LocateStrategy::LargestRegion),
            "quad" | "quadrilateral" => Ok(LocateStrategy::Quadrilateral),
            _ => Err(format!("unknown locate strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocateOptions {
    pub strategy: LocateStrategy,
    pub working_size: Size<u32>,
    pub canonical_size: Size<u32>,
    pub blur_sigma: f32,
    /// Neighborhood radius and offset of the adaptive threshold used by
    /// [`LocateStrategy::LargestRegion`].
    pub block_radius: u32,
    pub block_offset: u8,
    pub canny_low: f32,
    pub canny_high: f32,
    pub edge_dilation: u8,
    /// Outlines enclosing this many pixels or fewer are never the sheet.
    pub min_contour_area: f32,
    /// Polygon approximation tolerance as a fraction of the outline perimeter.
    pub polygon_epsilon: f32,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            strategy: LocateStrategy::default(),
            working_size: DEFAULT_WORKING_SIZE,
            canonical_size: DEFAULT_CANONICAL_SIZE,
            blur_sigma: 1.1,
            block_radius: 5,
            block_offset: 12,
            canny_low: 50.0,
            canny_high: 150.0,
            edge_dilation: 2,
            min_contour_area: 1000.0,
            polygon_epsilon: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("no outline larger than {min_area} px found in the photo")]
    NoSheetContour { min_area: u32 },
}

/// A sheet found within a photo.
#[derive(Debug, Clone)]
pub struct LocatedSheet {
    /// The photo at working resolution.
    pub working_image: RgbImage,
    /// The sheet alone, at canonical size.
    pub normalized: RgbImage,
    pub boundary: BoundaryBox,
    /// The corners the sheet was warped from, if a perspective warp was used.
    pub corners: Option<Quadrilateral>,
}

/// Finds the answer sheet within `photo` and produces a canonical-size image
/// of it.
#[time]
pub fn locate_sheet(
    photo: &DynamicImage,
    options: &LocateOptions,
) -> Result<LocatedSheet, LocateError> {
    let working_image = imageops::resize(
        &photo.to_rgb8(),
        options.working_size.width,
        options.working_size.height,
        FilterType::Triangle,
    );

    match options.strategy {
        LocateStrategy::LargestRegion => locate_largest_region(working_image, options),
        LocateStrategy::Quadrilateral => Ok(locate_quadrilateral(working_image, options)),
    }
}

/// Outer boundaries of the top-level foreground regions of `mask`.
fn outer_contours(mask: &GrayImage) -> Vec<Vec<Point<f32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| to_f32_points(&contour.points))
        .collect()
}

fn blurred_grayscale(img: &RgbImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(&imageops::grayscale(img), sigma)
}

fn resize_to(img: &RgbImage, size: Size<u32>) -> RgbImage {
    imageops::resize(img, size.width, size.height, FilterType::Triangle)
}

#[time]
fn locate_largest_region(
    working_image: RgbImage,
    options: &LocateOptions,
) -> Result<LocatedSheet, LocateError> {
    let blurred = blurred_grayscale(&working_image, options.blur_sigma);
    let outlined = adaptive_threshold_inverted(&blurred, options.block_radius, options.block_offset);
    let dilated = dilate(&outlined, Norm::LInf, 1);

    let largest = outer_contours(&dilated)
        .into_iter()
        .map(|contour| (polygon_area(&contour), contour))
        .filter(|(area, _)| *area > options.min_contour_area)
        .max_by(|(a, _), (b, _)| a.total_cmp(b));

    let boundary = match largest.and_then(|(_, contour)| bounding_box(&contour)) {
        Some(boundary) => boundary,
        None => {
            return Err(LocateError::NoSheetContour {
                min_area: options.min_contour_area as u32,
            })
        }
    };
    debug!("largest region: {:?}", boundary);

    let cropped = imageops::crop_imm(
        &working_image,
        boundary.x,
        boundary.y,
        boundary.width,
        boundary.height,
    )
    .to_image();

    Ok(LocatedSheet {
        normalized: resize_to(&cropped, options.canonical_size),
        working_image,
        boundary,
        corners: None,
    })
}

/// Finds the largest outline that approximates to exactly four vertices.
fn find_sheet_quadrilateral(edges: &GrayImage, options: &LocateOptions) -> Option<Quadrilateral> {
    outer_contours(edges)
        .into_iter()
        .filter_map(|contour| {
            let area = polygon_area(&contour);
            if area <= options.min_contour_area {
                return None;
            }
            let epsilon = options.polygon_epsilon * arc_length(&contour, true) as f32;
            match approximate_closed_polygon(&contour, epsilon)[..] {
                [a, b, c, d] => {
                    Quadrilateral::from_vertices([a, b, c, d]).map(|quad| (area, quad))
                }
                _ => None,
            }
        })
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, quad)| quad)
}

#[time]
fn locate_quadrilateral(working_image: RgbImage, options: &LocateOptions) -> LocatedSheet {
    let blurred = blurred_grayscale(&working_image, options.blur_sigma);
    let edges = canny(&blurred, options.canny_low, options.canny_high);
    let edges = dilate(&edges, Norm::LInf, options.edge_dilation);

    let Size { width, height } = options.canonical_size;
    let projection = find_sheet_quadrilateral(&edges, options).and_then(|quad| {
        let canonical_corners = [
            (0.0, 0.0),
            (width as f32, 0.0),
            (width as f32, height as f32),
            (0.0, height as f32),
        ];
        Projection::from_control_points(quad.control_points(), canonical_corners)
            .map(|projection| (quad, projection))
    });

    match projection {
        Some((quad, projection)) => {
            debug!("sheet corners: {:?}", quad);
            let mut normalized = RgbImage::new(width, height);
            warp_into(
                &working_image,
                &projection,
                Interpolation::Bilinear,
                Rgb([255, 255, 255]),
                &mut normalized,
            );
            let boundary = bounding_box(&quad.corners())
                .unwrap_or_else(|| BoundaryBox::whole(options.working_size));
            LocatedSheet {
                working_image,
                normalized,
                boundary,
                corners: Some(quad),
            }
        }
        None => {
            debug!("no sheet outline found, using the whole photo");
            LocatedSheet {
                normalized: resize_to(&working_image, options.canonical_size),
                boundary: BoundaryBox::whole(options.working_size),
                working_image,
                corners: None,
            }
        }
    }
}
