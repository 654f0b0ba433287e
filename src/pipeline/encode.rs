//! Image encoding: image file → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! Everything is re-encoded as PNG so text edges survive without JPEG
//! artefacts, and `detail: "high"` keeps the small print of a flyer legible
//! to GPT-4-class models.

use crate::error::Flyer2MdError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode an in-memory image as a base64 PNG ready for the VLM API.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Decode the image at `path` and encode it for the VLM API.
pub async fn encode_file(path: &Path) -> Result<ImageData, Flyer2MdError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let fail = |detail: String| Flyer2MdError::NormalizationFailed {
            path: owned.clone(),
            detail,
        };
        let img = image::open(&owned).map_err(|e| fail(e.to_string()))?;
        encode_image(&img).map_err(|e| fail(e.to_string()))
    })
    .await
    .map_err(|e| Flyer2MdError::Internal(format!("Encode task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_image(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[tokio::test]
    async fn encode_file_reads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flyer.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        let data = encode_file(&path).await.expect("encode file");
        assert!(!data.data.is_empty());
    }
}
