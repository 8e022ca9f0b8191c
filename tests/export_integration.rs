//! Render → encode → save round trips through the public API

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use image::{ImageFormat, Rgba, RgbaImage};
use stockframe::export::{DirectorySaver, ExportOptions, Exporter, MimeType, SaveTarget};
use stockframe::rendering::{Composition, LoadedImage, Rasterizer, RenderOptions, Target};
use stockframe::Error;

#[derive(Clone, Default)]
struct RecordingSaver {
    calls: Arc<Mutex<Vec<String>>>,
}

impl SaveTarget for RecordingSaver {
    fn save(&self, _bytes: &[u8], file_name: &str) -> stockframe::Result<PathBuf> {
        self.calls.lock().unwrap().push(file_name.to_string());
        Ok(PathBuf::from(file_name))
    }
}

fn png_data_uri(img: &RgbaImage) -> String {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
    )
}

#[test]
fn default_export_is_1200_by_1600_png() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = Exporter::new(DirectorySaver::new(dir.path()));
    let composition = Composition::parse(
        r#"<div id="card" style="background: #204060; padding: 20px">
             <div style="height: 100px; background: rgb(255, 200, 0)"></div>
           </div>"#,
    );

    let path = exporter
        .render_and_export(
            &Rasterizer::default(),
            &composition,
            Target::Id("card"),
            "card",
            &ExportOptions::default(),
        )
        .unwrap();
    assert_eq!(path, dir.path().join("card.png"));

    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (1200, 1600));
    // Card background at the corner, the inner strip inside the padding.
    assert_eq!(decoded.get_pixel(2, 2), &Rgba([0x20, 0x40, 0x60, 255]));
    assert_eq!(decoded.get_pixel(100, 100), &Rgba([255, 200, 0, 255]));
}

#[test]
fn missing_target_never_reaches_the_saver() {
    let saver = RecordingSaver::default();
    let exporter = Exporter::new(saver.clone());
    let composition = Composition::parse(r#"<div id="card"></div>"#);

    let err = exporter
        .render_and_export(
            &Rasterizer::default(),
            &composition,
            Target::Id("does-not-exist"),
            "card",
            &ExportOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::TargetNotFound(_)));
    assert!(saver.calls.lock().unwrap().is_empty());
}

#[test]
fn unpreloaded_image_fails_render_without_saving() {
    let saver = RecordingSaver::default();
    let exporter = Exporter::new(saver.clone());
    let composition = Composition::parse(r#"<div id="card"><img src="https://images.example/a.jpg"></div>"#);

    let err = exporter
        .render_and_export(
            &Rasterizer::default(),
            &composition,
            Target::Id("card"),
            "card",
            &ExportOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::RenderFailed(_)));
    assert!(saver.calls.lock().unwrap().is_empty());
}

#[test]
fn data_uri_image_pixels_reach_the_output() {
    let red = RgbaImage::from_pixel(60, 80, Rgba([255, 0, 0, 255]));
    let html = format!(
        r#"<div id="card"><img src="{}" style="width: 600px; height: 800px"></div>"#,
        png_data_uri(&red)
    );
    let composition = Composition::parse(&html);
    let rasterizer = Rasterizer::default();
    let request = stockframe::rendering::RasterRequest::new("card");

    let bitmap = rasterizer.render(&composition, &request).unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (1200, 1600));
    assert_eq!(bitmap.as_rgba().get_pixel(600, 800), &Rgba([255, 0, 0, 255]));
}

#[test]
fn preloaded_image_is_fitted_into_the_card() {
    let mut rasterizer = Rasterizer::default();
    rasterizer.add_image(LoadedImage::new(
        "https://images.example/wide.jpg",
        RgbaImage::from_pixel(1200, 900, Rgba([0, 255, 0, 255])),
    ));
    let composition = Composition::parse(r#"<div id="card"><img src="https://images.example/wide.jpg"></div>"#);
    let request = stockframe::rendering::RasterRequest::new("card").with_options(RenderOptions {
        scale: 1.0,
        ..Default::default()
    });

    let pixels = rasterizer.render(&composition, &request).unwrap().into_rgba();
    // 1200x900 fits as 600x450; below it the canvas stays transparent.
    assert_eq!(pixels.get_pixel(300, 200), &Rgba([0, 255, 0, 255]));
    assert_eq!(pixels.get_pixel(300, 460)[3], 0);
}

#[test]
fn jpeg_export_uses_jpeg_extension() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = Exporter::new(DirectorySaver::new(dir.path()));
    let composition = Composition::parse(r#"<div id="card" style="background: white"></div>"#);
    let options = ExportOptions {
        render: RenderOptions {
            width: 60,
            height: 80,
            scale: 1.0,
            ..Default::default()
        },
        mime: MimeType::Jpeg,
        quality: 0.8,
    };

    let path = exporter
        .render_and_export(&Rasterizer::default(), &composition, Target::Id("card"), "", &options)
        .unwrap();
    assert_eq!(path.file_name().unwrap(), "image.jpeg");
    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (60, 80));
}
