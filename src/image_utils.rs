use image::{GrayImage, Luma, Rgb};
use imageproc::{contrast::threshold, filter::box_filter};

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// Marks a pixel as foreground (white) when it is darker than the mean of its
/// `(2 * block_radius + 1)` square neighborhood by more than `offset`;
/// everything else becomes background (black).
///
/// Because the cutoff follows the local mean, a gradual change in lighting
/// across the image shifts the cutoff along with it.
///
/// ```text
///      INPUT (shadowed left)           OUTPUT
/// ┌─────────────────────────┐  ┌─────────────────────────┐
/// │▓▓▓▓▓▒▒▒▒▒▒░░░░░░░      │  │                         │
/// │▓▓█▓▓▒▒▒▒▒▒░░░░░░█      │  │  █               █      │
/// │▓▓▓▓▓▒▒▒▒▒▒░░░░░░░      │  │                         │
/// └─────────────────────────┘  └─────────────────────────┘
/// ```
pub fn adaptive_threshold_inverted(img: &GrayImage, block_radius: u32, offset: u8) -> GrayImage {
    let local_mean = box_filter(img, block_radius, block_radius);
    let mut out = GrayImage::from_pixel(img.width(), img.height(), BLACK);
    for (x, y, pixel) in img.enumerate_pixels() {
        let cutoff = local_mean.get_pixel(x, y).0[0].saturating_sub(offset);
        if pixel.0[0] < cutoff {
            out.put_pixel(x, y, WHITE);
        }
    }
    out
}

/// Marks every pixel at or below `level` as foreground (white).
pub fn global_threshold_inverted(img: &GrayImage, level: u8) -> GrayImage {
    let mut out = threshold(img, level);
    image::imageops::invert(&mut out);
    out
}

/// Determines the number of pixels in an image that match the given luma.
pub fn count_pixels(img: &GrayImage, luma: &Luma<u8>) -> u32 {
    img.pixels().filter(|p| *p == luma).count() as u32
}

/// Determines the ratio of pixels in an image that match the given luma.
pub fn ratio(img: &GrayImage, luma: &Luma<u8>) -> f32 {
    let total = img.width() * img.height();
    if total == 0 {
        return 0.0;
    }
    count_pixels(img, luma) as f32 / total as f32
}
