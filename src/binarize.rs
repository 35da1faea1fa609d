use image::{imageops, GrayImage, RgbImage};
use imageproc::{distance_transform::Norm, filter::gaussian_blur_f32, morphology::close};
use logging_timer::time;

use crate::image_utils::{adaptive_threshold_inverted, global_threshold_inverted};

/// How ink is separated from paper on the normalized sheet.
///
/// The method and the mark threshold are tuned together: the global cutoff
/// keeps only the darkest ink and pairs with a lower mark threshold, while the
/// adaptive cutoff outlines marks relative to their surroundings and pairs
/// with a higher one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinarizeMethod {
    /// Ink is anything darker than its neighborhood mean by more than `offset`.
    Adaptive { block_radius: u32, offset: u8 },

    /// Ink is anything at or below `level`. Only suitable for evenly lit
    /// photos.
    Global { level: u8 },
}

impl Default for BinarizeMethod {
    fn default() -> Self {
        BinarizeMethod::Adaptive {
            block_radius: 12,
            offset: 10,
        }
    }
}

impl BinarizeMethod {
    /// The fill percentage at which a field counts as marked when no
    /// threshold is configured explicitly.
    pub fn default_mark_threshold(&self) -> f32 {
        match self {
            BinarizeMethod::Adaptive { .. } => 45.0,
            BinarizeMethod::Global { .. } => 25.0,
        }
    }
}

impl std::str::FromStr for BinarizeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adaptive" => Ok(BinarizeMethod::default()),
            "global" => Ok(BinarizeMethod::Global { level: 70 }),
            _ => Err(format!("unknown binarization method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinarizeOptions {
    pub method: BinarizeMethod,
    pub blur_sigma: f32,
    /// Radius of the closing applied to the mask, if any.
    pub closing_radius: Option<u8>,
}

impl Default for BinarizeOptions {
    fn default() -> Self {
        Self {
            method: BinarizeMethod::default(),
            blur_sigma: 1.1,
            closing_radius: Some(1),
        }
    }
}

/// Converts the normalized sheet into a mask where ink is white and paper is
/// black.
#[time]
pub fn binarize(sheet: &RgbImage, options: &BinarizeOptions) -> GrayImage {
    let gray = imageops::grayscale(sheet);
    let blurred = if options.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, options.blur_sigma)
    } else {
        gray
    };

    let mask = match options.method {
        BinarizeMethod::Adaptive {
            block_radius,
            offset,
        } => adaptive_threshold_inverted(&blurred, block_radius, offset),
        BinarizeMethod::Global { level } => global_threshold_inverted(&blurred, level),
    };

    match options.closing_radius {
        Some(radius) if radius > 0 => close(&mask, Norm::LInf, radius),
        _ => mask,
    }
}
