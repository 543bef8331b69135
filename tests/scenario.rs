use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use imgresample::discovery::{filter_images, list_files};
use imgresample::{process_batch, BatchConfig, Concurrency, ImageResampler, OutputFormat};
use tempfile::TempDir;

fn write_image(path: &Path, img: &DynamicImage) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

#[test]
fn large_image_is_downscaled_and_corrupt_image_reported() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let wide = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4000, 2000, Rgb([30, 60, 90])));
    write_image(&input.path().join("shots/wide.png"), &wide);
    std::fs::write(input.path().join("broken.png"), b"\x89PNG but not really").unwrap();
    std::fs::write(input.path().join("notes.txt"), b"not an image").unwrap();

    let config = BatchConfig::new(input.path(), output.path())
        .size_limit(2400)
        .format(OutputFormat::Png)
        .concurrency(Concurrency::Fixed(2))
        .normalized();
    config.validate().unwrap();

    let files = list_files(input.path()).unwrap();
    assert_eq!(files.len(), 3);
    let images = filter_images(files);
    assert_eq!(images.len(), 2);

    let report = process_batch(&config, &images, Arc::new(ImageResampler::new()), false).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("broken.png"));
    assert!(report.errors[0].contains("decode"));

    let resized = image::open(output.path().join("shots/wide.png")).unwrap();
    assert_eq!((resized.width(), resized.height()), (2400, 1200));
    assert!(!output.path().join("broken.png").exists());
    assert!(!output.path().join("notes.png").exists());
}

#[test]
fn alpha_survives_webp_but_not_jpeg() {
    let input = TempDir::new().unwrap();
    let translucent = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(300, 600, Rgba([255, 0, 0, 100])));
    write_image(&input.path().join("logo.png"), &translucent);
    let images = filter_images(list_files(input.path()).unwrap());

    for (format, has_alpha) in [(OutputFormat::Webp, true), (OutputFormat::Jpeg, false)] {
        let output = TempDir::new().unwrap();
        let config = BatchConfig::new(input.path(), output.path())
            .size_limit(200)
            .format(format)
            .keep_alpha(true)
            .normalized();

        let report = process_batch(&config, &images, Arc::new(ImageResampler::new()), false).unwrap();
        assert!(report.is_clean(), "{:?}", report.errors);

        let written = image::open(output.path().join(format!("logo.{}", format.extension()))).unwrap();
        assert_eq!((written.width(), written.height()), (100, 200));
        assert_eq!(written.color().has_alpha(), has_alpha);
    }
}

#[test]
fn empty_input_produces_empty_report() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let config = BatchConfig::new(input.path(), output.path()).normalized();

    let images = filter_images(list_files(input.path()).unwrap());
    assert!(images.is_empty());

    let report = process_batch(&config, &images, Arc::new(ImageResampler::new()), false).unwrap();
    assert_eq!(report.total, 0);
    assert!(report.is_clean());
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}
