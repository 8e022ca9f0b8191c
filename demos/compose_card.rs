//! Compose a card from an inline image and text, then save it as PNG
//!
//! Runs offline: the photo is generated and embedded as a data URI.

use base64::Engine as _;
use image::{ImageFormat, Rgba, RgbaImage};
use stockframe::export::{DirectorySaver, ExportOptions, Exporter};
use stockframe::fonts::FontManager;
use stockframe::rendering::{Composition, Rasterizer, Target};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("Stockframe - Compose Card Example\n");

    // A vertical gradient stands in for a downloaded photo.
    let photo = RgbaImage::from_fn(1200, 800, |_, y| {
        let t = (y * 255 / 800) as u8;
        Rgba([40, 90u8.saturating_add(t / 2), 255 - t, 255])
    });
    let mut png = std::io::Cursor::new(Vec::new());
    photo.write_to(&mut png, ImageFormat::Png)?;
    let data_uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png.into_inner())
    );

    let html = format!(
        r##"<div id="card" style="background: #111; color: #eee">
              <img src="{data_uri}">
              <div style="padding: 24px">
                <h1>Blue hour</h1>
                <p>Twenty minutes after sunset the whole valley turns cobalt.</p>
              </div>
              <div style="position: absolute; left: 24px; bottom: 24px; font-size: 12px; color: #999">stockframe</div>
            </div>"##
    );

    let composition = Composition::parse(&html);
    let rasterizer = Rasterizer::new(FontManager::system());
    let out_dir = std::env::temp_dir().join("stockframe-demo");
    let exporter = Exporter::new(DirectorySaver::new(&out_dir));

    let path = exporter.render_and_export(
        &rasterizer,
        &composition,
        Target::Id("card"),
        "blue-hour",
        &ExportOptions::default(),
    )?;
    println!("Saved {}", path.display());
    Ok(())
}
