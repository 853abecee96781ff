//! Integration test: synthesize an image, segment it, and export every
//! output format.

#![allow(clippy::unwrap_used)]

use basin_pipeline::{BOUNDARY, PipelineConfig};

/// Two dark disks on a light background, encoded as PNG.
fn two_disks_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(48, 32, |x, y| {
        let inside = |cx: i64, cy: i64| {
            let dx = i64::from(x) - cx;
            let dy = i64::from(y) - cy;
            dx * dx + dy * dy <= 81
        };
        if inside(14, 16) || inside(34, 16) {
            image::Rgba([30, 30, 30, 255])
        } else {
            image::Rgba([230, 230, 230, 255])
        }
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[test]
fn segmentation_exports_to_png_and_text() {
    let _ = env_logger::builder().is_test(true).try_init();

    let staged =
        basin_pipeline::process_staged(&two_disks_png(), &PipelineConfig::default()).unwrap();
    assert!(staged.labels.is_resolved());
    assert!(staged.region_count > 0);

    let boundaries = basin_export::boundaries_png(&staged.labels).unwrap();
    let decoded = image::load_from_memory(&boundaries).unwrap().to_luma8();
    assert_eq!(decoded.dimensions(), (48, 32));
    for (pixel, &label) in decoded.pixels().zip(staged.labels.as_slice()) {
        assert_eq!(pixel.0[0] == 255, label == BOUNDARY);
    }

    let regions = basin_export::regions_png(&staged.labels).unwrap();
    let decoded = image::load_from_memory(&regions).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (48, 32));

    let gradient = basin_export::gradient_png(&staged.gradient).unwrap();
    let decoded = image::load_from_memory(&gradient).unwrap().to_luma8();
    assert_eq!(decoded.pixels().map(|p| p.0[0]).max(), Some(255));

    let text = basin_export::to_label_text(&staged.labels);
    assert_eq!(text.lines().count(), 32);
    assert!(text.lines().all(|line| line.split(' ').count() == 48));
}
