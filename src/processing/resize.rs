//! Long-edge resampling

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Dimensions after capping the long edge at `limit`.
///
/// Never upscales. The short edge is scaled proportionally and truncated,
/// with a floor of one pixel.
pub fn fit_long_edge(width: u32, height: u32, limit: u32) -> (u32, u32) {
    let scale = |edge: u32, long: u32| -> u32 {
        let scaled = u64::from(limit) * u64::from(edge) / u64::from(long.max(1));
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    };

    if width > height && width > limit {
        (limit, scale(height, width))
    } else if width <= height && height > limit {
        (scale(width, height), limit)
    } else {
        (width, height)
    }
}

/// Downscale so the long edge fits `limit`, then settle the colour type.
///
/// The result is RGBA8 only when `keep_alpha` is set and the source has four
/// channels. Everything else becomes RGB8, including grey+alpha sources.
pub fn resample(image: DynamicImage, limit: u32, keep_alpha: bool) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (target_width, target_height) = fit_long_edge(width, height, limit);
    let four_channels = image.color().channel_count() == 4;

    let resized = if (target_width, target_height) == (width, height) {
        image
    } else {
        debug!("Resizing {}x{} -> {}x{}", width, height, target_width, target_height);
        image.resize_exact(target_width, target_height, FilterType::Lanczos3)
    };

    if keep_alpha && four_channels {
        DynamicImage::ImageRgba8(resized.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(resized.into_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, LumaA, Rgb, Rgba};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let intensity = ((x + y) % 255) as u8;
            Rgb([intensity, intensity, intensity])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_fit_long_edge() {
        assert_eq!(fit_long_edge(4000, 2000, 2400), (2400, 1200));
        assert_eq!(fit_long_edge(2000, 4000, 2400), (1200, 2400));
        assert_eq!(fit_long_edge(3000, 3000, 2400), (2400, 2400));
        // truncation, as opposed to rounding
        assert_eq!(fit_long_edge(3000, 1999, 1000), (1000, 666));
    }

    #[test]
    fn test_fit_long_edge_never_upscales() {
        assert_eq!(fit_long_edge(800, 600, 2400), (800, 600));
        assert_eq!(fit_long_edge(2400, 10, 2400), (2400, 10));
    }

    #[test]
    fn test_fit_long_edge_keeps_one_pixel() {
        assert_eq!(fit_long_edge(10_000, 1, 100), (100, 1));
    }

    #[test]
    fn test_resample_dimensions() {
        let resized = resample(create_test_image(400, 200), 100, false);
        assert_eq!((resized.width(), resized.height()), (100, 50));
    }

    #[test]
    fn test_alpha_handling() {
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 4, Rgba([0, 0, 0, 10])));

        let kept = resample(rgba.clone(), 100, true);
        assert!(kept.color().has_alpha());

        let dropped = resample(rgba, 100, false);
        assert!(!dropped.color().has_alpha());

        // keep_alpha never invents a channel
        let rgb = resample(create_test_image(4, 4), 100, true);
        assert!(!rgb.color().has_alpha());
    }

    #[test]
    fn test_grey_alpha_is_flattened() {
        let grey = DynamicImage::ImageLumaA8(ImageBuffer::from_pixel(4, 4, LumaA([200, 10])));

        let out = resample(grey, 100, true);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }
}
