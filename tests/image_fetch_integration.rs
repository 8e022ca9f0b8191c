//! Image preloading through the real HTTP fetcher against a local stub

use std::thread;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use stockframe::export::{HttpImageFetcher, ImageLoader};
use stockframe::Error;
use tiny_http::{Header, Response, Server};

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// `/ok.png` serves a 3x2 PNG, `/big.png` a 4 KiB body, anything else 404.
fn start_stub() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let (status, body) = match request.url() {
                "/ok.png" => (200, png_bytes(3, 2)),
                "/big.png" => (200, vec![0u8; 4096]),
                _ => (404, b"not found".to_vec()),
            };
            let resp = Response::from_data(body)
                .with_status_code(status)
                .with_header("Content-Type: image/png".parse::<Header>().unwrap());
            let _ = request.respond(resp);
        }
    });
    format!("http://{}", addr)
}

fn loader(max_bytes: u64) -> ImageLoader {
    let fetcher = HttpImageFetcher::new(Duration::from_secs(5), "stockframe-tests").unwrap();
    ImageLoader::with_fetcher(fetcher).with_max_bytes(max_bytes)
}

#[test]
fn fetches_and_decodes_png() {
    let base = start_stub();
    let url = format!("{}/ok.png", base);

    let image = loader(1024).preload_image(&url).unwrap();
    assert_eq!(image.url, url);
    assert_eq!((image.natural_width(), image.natural_height()), (3, 2));
    assert_eq!(image.pixels.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
}

#[test]
fn not_found_is_image_load_error() {
    let base = start_stub();
    let url = format!("{}/missing.png", base);

    match loader(1024).preload_image(&url).unwrap_err() {
        Error::ImageLoad { url: failed, message } => {
            assert_eq!(failed, url);
            assert!(message.contains("404"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn body_over_limit_is_rejected() {
    let base = start_stub();
    let url = format!("{}/big.png", base);

    match loader(1024).preload_image(&url).unwrap_err() {
        Error::ImageLoad { url: failed, message } => {
            assert_eq!(failed, url);
            assert!(message.contains("1024 byte limit"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}
