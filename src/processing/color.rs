//! Color-mode normalization before JPEG encoding
//!
//! JPEG stores 8-bit grayscale or 8-bit RGB only. Every decoded layout is
//! mapped through [`NORMALIZATION_TABLE`] to one of those two. Palette and CMYK
//! sources never reach this table as such: their decoders already expand them
//! to RGB or RGBA.

use image::{ColorType, DynamicImage};
use tracing::debug;

/// Channel layout of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Luma8,
    LumaAlpha8,
    Rgb8,
    Rgba8,
    Luma16,
    LumaAlpha16,
    Rgb16,
    Rgba16,
    Rgb32F,
    Rgba32F,
}

/// What has to happen to a layout before it can be encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    Keep,
    ToRgb8,
    ToLuma8,
}

/// Mode to conversion mapping. Adding a mode is a one-line edit here.
pub const NORMALIZATION_TABLE: &[(ColorMode, Normalization)] = &[
    (ColorMode::Luma8, Normalization::Keep),
    (ColorMode::LumaAlpha8, Normalization::ToRgb8),
    (ColorMode::Rgb8, Normalization::Keep),
    (ColorMode::Rgba8, Normalization::ToRgb8),
    (ColorMode::Luma16, Normalization::ToLuma8),
    (ColorMode::LumaAlpha16, Normalization::ToRgb8),
    (ColorMode::Rgb16, Normalization::ToRgb8),
    (ColorMode::Rgba16, Normalization::ToRgb8),
    (ColorMode::Rgb32F, Normalization::ToRgb8),
    (ColorMode::Rgba32F, Normalization::ToRgb8),
];

impl ColorMode {
    /// Layout of a decoded image, `None` for layouts this table does not know
    pub fn of(image: &DynamicImage) -> Option<Self> {
        match image.color() {
            ColorType::L8 => Some(Self::Luma8),
            ColorType::La8 => Some(Self::LumaAlpha8),
            ColorType::Rgb8 => Some(Self::Rgb8),
            ColorType::Rgba8 => Some(Self::Rgba8),
            ColorType::L16 => Some(Self::Luma16),
            ColorType::La16 => Some(Self::LumaAlpha16),
            ColorType::Rgb16 => Some(Self::Rgb16),
            ColorType::Rgba16 => Some(Self::Rgba16),
            ColorType::Rgb32F => Some(Self::Rgb32F),
            ColorType::Rgba32F => Some(Self::Rgba32F),
            _ => None,
        }
    }

    /// Conversion required for this layout
    pub fn normalization(self) -> Normalization {
        NORMALIZATION_TABLE
            .iter()
            .find(|(mode, _)| *mode == self)
            .map_or(Normalization::ToRgb8, |(_, normalization)| *normalization)
    }
}

/// Convert `image` into a layout the JPEG encoder accepts
pub fn normalize(image: DynamicImage) -> DynamicImage {
    let mode = ColorMode::of(&image);
    let normalization = mode.map_or(Normalization::ToRgb8, ColorMode::normalization);

    match normalization {
        Normalization::Keep => image,
        Normalization::ToRgb8 => {
            debug!("Converting {:?} to RGB8", mode);
            DynamicImage::ImageRgb8(image.into_rgb8())
        }
        Normalization::ToLuma8 => {
            debug!("Converting {:?} to L8", mode);
            DynamicImage::ImageLuma8(image.into_luma8())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, GrayImage, LumaA, Rgba, RgbaImage};

    #[test]
    fn test_table_covers_every_mode() {
        let modes = [
            ColorMode::Luma8,
            ColorMode::LumaAlpha8,
            ColorMode::Rgb8,
            ColorMode::Rgba8,
            ColorMode::Luma16,
            ColorMode::LumaAlpha16,
            ColorMode::Rgb16,
            ColorMode::Rgba16,
            ColorMode::Rgb32F,
            ColorMode::Rgba32F,
        ];
        for mode in modes {
            assert!(NORMALIZATION_TABLE.iter().any(|(m, _)| *m == mode), "{mode:?} missing");
        }
    }

    #[test]
    fn test_alpha_modes_need_conversion() {
        assert_eq!(ColorMode::Rgba8.normalization(), Normalization::ToRgb8);
        assert_eq!(ColorMode::LumaAlpha8.normalization(), Normalization::ToRgb8);
        assert_eq!(ColorMode::Rgb8.normalization(), Normalization::Keep);
        assert_eq!(ColorMode::Luma8.normalization(), Normalization::Keep);
    }

    #[test]
    fn test_normalize_rgba() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0])));
        let normalized = normalize(image);

        assert_eq!(normalized.color(), ColorType::Rgb8);
        assert_eq!(normalized.as_rgb8().unwrap().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_normalize_luma_alpha() {
        let image = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(2, 2, LumaA([200, 128])));
        assert_eq!(normalize(image).color(), ColorType::Rgb8);
    }

    #[test]
    fn test_normalize_keeps_gray() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        assert_eq!(normalize(image).color(), ColorType::L8);
    }

    #[test]
    fn test_normalize_sixteen_bit() {
        let image = DynamicImage::new_rgb16(2, 2);
        assert_eq!(normalize(image).color(), ColorType::Rgb8);

        let image = DynamicImage::new_luma16(2, 2);
        assert_eq!(normalize(image).color(), ColorType::L8);
    }
}
