//! Percentage-based downscaling

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::config::QualityDecrease;

/// Resampling filter used for every downscale
pub const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Target dimensions for a downscale; each axis is scaled independently
pub fn target_dimensions(width: u32, height: u32, decrease: QualityDecrease) -> (u32, u32) {
    (decrease.scale(width), decrease.scale(height))
}

/// Shrink `image` by `decrease`, or pass it through when no decrease is set
pub fn downscale(image: DynamicImage, decrease: Option<QualityDecrease>) -> DynamicImage {
    let Some(decrease) = decrease else {
        return image;
    };

    let (target_width, target_height) = target_dimensions(image.width(), image.height(), decrease);

    if target_width == image.width() && target_height == image.height() {
        debug!("No resize needed, dimensions already match target");
        return image;
    }

    debug!(
        "Resizing {}x{} -> {}x{} ({}% decrease)",
        image.width(),
        image.height(),
        target_width,
        target_height,
        decrease.percent()
    );

    image.resize_exact(target_width, target_height, RESIZE_FILTER)
}
