//! Image preprocessing filters for OCR
//!
//! Optional enhancements for photographs of instrument displays, which often
//! have glare, low contrast or light-on-dark text.

use image::{imageops, DynamicImage, RgbImage};
use tracing::{debug, warn};

use crate::config::OcrPreprocessing;

/// Apply preprocessing filters based on settings
///
/// Returns an unchanged copy when preprocessing is disabled.
pub fn apply_preprocessing(image: &DynamicImage, settings: &OcrPreprocessing) -> DynamicImage {
    if !settings.enabled {
        debug!("OCR preprocessing disabled");
        return image.clone();
    }

    debug!(
        "OCR preprocessing enabled: grayscale={}, invert={}, contrast={}, sharpen={}, scale={}",
        settings.grayscale, settings.invert, settings.contrast, settings.sharpen, settings.scale
    );

    // Upscale first so the other filters work on the final resolution
    let mut buffer = upscale(image, settings.scale);

    if (settings.contrast - 1.0).abs() > 0.01 {
        buffer = imageops::contrast(&buffer, contrast_percent(settings.contrast));
    }

    if settings.sharpen > 0.01 {
        buffer = apply_sharpen(&buffer, settings.sharpen);
    }

    if settings.grayscale {
        buffer = DynamicImage::ImageRgb8(buffer).grayscale().to_rgb8();
    }

    if settings.invert {
        imageops::invert(&mut buffer);
    }

    DynamicImage::ImageRgb8(buffer)
}

/// Integer upscale; a factor whose target size overflows leaves the image as it is
fn upscale(image: &DynamicImage, scale: u32) -> RgbImage {
    if scale <= 1 {
        return image.to_rgb8();
    }
    match (
        image.width().checked_mul(scale),
        image.height().checked_mul(scale),
    ) {
        (Some(width), Some(height)) => {
            imageops::resize(&image.to_rgb8(), width, height, imageops::FilterType::Triangle)
        }
        _ => {
            warn!(
                "Upscale x{} of {}x{} image overflows, keeping original size",
                scale,
                image.width(),
                image.height()
            );
            image.to_rgb8()
        }
    }
}

/// `imageops::contrast` squares its percentage, so a multiplier `factor`
/// around the midpoint maps to `(sqrt(factor) - 1) * 100`
fn contrast_percent(factor: f32) -> f32 {
    (factor.max(0.0).sqrt() - 1.0) * 100.0
}

/// 3x3 sharpen kernel; edge pixels are left as they are
fn apply_sharpen(buffer: &RgbImage, strength: f32) -> RgbImage {
    let (width, height) = buffer.dimensions();
    let mut result = buffer.clone();
    if width < 3 || height < 3 {
        return result;
    }

    let center_weight = 1.0 + 4.0 * strength;
    let neighbor_weight = -strength;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            for c in 0..3 {
                let at = |x: u32, y: u32| buffer.get_pixel(x, y).0[c] as f32;
                let neighbors = at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y);
                let sharpened = at(x, y) * center_weight + neighbors * neighbor_weight;
                result.get_pixel_mut(x, y).0[c] = sharpened.clamp(0.0, 255.0) as u8;
            }
        }
    }

    result
}
