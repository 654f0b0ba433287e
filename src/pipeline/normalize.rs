//! Image normalisation ahead of recognition.
//!
//! Vision encoders tile the image into fixed-size patches (28 px for the
//! Qwen-VL family) and bill by pixel count. A phone photo of a flyer is
//! usually far larger than needed, so the image is:
//!
//! 1. scaled down (aspect ratio kept, never up) to a pixel budget, ~700 000 px;
//! 2. cropped by flooring each dimension to a multiple of the patch size;
//! 3. resampled with CatmullRom (bicubic), which keeps text edges clean
//!    without Lanczos ringing;
//! 4. saved as PNG under the output directory with a timestamp name.
//!
//! Decoding and resampling are CPU-bound and run on `spawn_blocking`.

use crate::config::ExtractionConfig;
use crate::error::Flyer2MdError;
use crate::pipeline::persist;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Compute the normalised `(width, height)` for an image.
///
/// Dimensions never drop below one `multiple`, so a degenerate input still
/// yields a single valid patch.
pub fn target_dimensions(width: u32, height: u32, target_pixels: u64, multiple: u32) -> (u32, u32) {
    let multiple = multiple.max(1);
    let pixels = u64::from(width) * u64::from(height);
    let scale = if pixels > target_pixels && pixels > 0 {
        (target_pixels as f64 / pixels as f64).sqrt()
    } else {
        1.0
    };

    let floor_to = |dim: u32| -> u32 {
        let scaled = (f64::from(dim) * scale).floor() as u32;
        ((scaled / multiple) * multiple).max(multiple)
    };
    (floor_to(width), floor_to(height))
}

/// Resize an in-memory image to its normalised dimensions.
pub fn normalize_image(img: &DynamicImage, target_pixels: u64, multiple: u32) -> DynamicImage {
    let (w, h) = target_dimensions(img.width(), img.height(), target_pixels, multiple);
    if (w, h) == (img.width(), img.height()) {
        return img.clone();
    }
    img.resize_exact(w, h, FilterType::CatmullRom)
}

/// Normalise the image at `input` and save it as a fresh PNG in the output
/// directory. Returns the new path.
pub async fn normalize(input: &Path, config: &ExtractionConfig) -> Result<PathBuf, Flyer2MdError> {
    let stem = persist::timestamp_stem(chrono::Local::now());
    let output = persist::reserve_path(&config.output_dir, &stem, "png", config.collision_policy).await?;

    let src = input.to_path_buf();
    let dst = output.clone();
    let target_pixels = config.target_pixels;
    let multiple = config.dimension_multiple;

    let result = tokio::task::spawn_blocking(move || {
        normalize_blocking(&src, &dst, target_pixels, multiple)
    })
    .await
    .map_err(|e| Flyer2MdError::Internal(format!("Normalise task panicked: {}", e)))?;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&output).await;
        return Err(e);
    }

    info!("Normalised image → {}", output.display());
    Ok(output)
}

fn normalize_blocking(
    src: &Path,
    dst: &Path,
    target_pixels: u64,
    multiple: u32,
) -> Result<(), Flyer2MdError> {
    let fail = |detail: String| Flyer2MdError::NormalizationFailed {
        path: src.to_path_buf(),
        detail,
    };

    let img = image::open(src).map_err(|e| fail(e.to_string()))?;
    let resized = normalize_image(&img, target_pixels, multiple);
    debug!(
        "Resized {}x{} → {}x{}",
        img.width(),
        img.height(),
        resized.width(),
        resized.height()
    );

    resized
        .save_with_format(dst, ImageFormat::Png)
        .map_err(|e| fail(e.to_string()))
}
