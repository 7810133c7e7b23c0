//! Image encoding: `DynamicImage` → PNG bytes, plus decoding of raw PDF
//! image samples that have no standalone file format of their own.
//!
//! PNG is lossless, so re-extracting the same page yields byte-identical
//! output.

use image::{DynamicImage, GrayImage, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Build an image from uncompressed 8-bit PDF samples.
///
/// The component count is inferred from the sample length: 1 is gray, 3 is
/// RGB and 4 is CMYK (converted to RGB). Anything else is rejected.
pub fn image_from_samples(
    width: u32,
    height: u32,
    bits_per_component: u8,
    samples: &[u8],
) -> Result<DynamicImage, String> {
    if bits_per_component != 8 {
        return Err(format!("unsupported bits per component: {bits_per_component}"));
    }
    let pixels = width as usize * height as usize;
    if pixels == 0 {
        return Err("image has zero size".into());
    }
    let size_error = || format!("sample buffer of {} bytes does not fit {width}x{height}", samples.len());

    match samples.len() / pixels {
        1 => GrayImage::from_raw(width, height, samples[..pixels].to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(size_error),
        3 => RgbImage::from_raw(width, height, samples[..pixels * 3].to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(size_error),
        4 => {
            let rgb = samples[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|px| cmyk_to_rgb(px[0], px[1], px[2], px[3]))
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(size_error)
        }
        _ => Err(size_error()),
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - k as u16;
    let ch = |v: u8| ((255 - v as u16) * k / 255) as u8;
    [ch(c), ch(m), ch(y)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn encoding_is_deterministic() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(17, 9, |x, y| {
            image::Rgb([x as u8 * 10, y as u8 * 20, 7])
        }));
        assert_eq!(encode_png(&img).unwrap(), encode_png(&img).unwrap());
    }

    #[test]
    fn samples_infer_components() {
        let gray = image_from_samples(2, 2, 8, &[0, 1, 2, 3]).unwrap();
        assert!(matches!(gray, DynamicImage::ImageLuma8(_)));

        let rgb = image_from_samples(1, 2, 8, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert!(matches!(rgb, DynamicImage::ImageRgb8(_)));

        let cmyk = image_from_samples(1, 1, 8, &[0, 0, 0, 0]).unwrap();
        assert_eq!(cmyk.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn samples_reject_bad_input() {
        assert!(image_from_samples(2, 2, 1, &[0; 4]).is_err());
        assert!(image_from_samples(4, 4, 8, &[0; 3]).is_err());
        assert!(image_from_samples(0, 4, 8, &[]).is_err());
    }
}
