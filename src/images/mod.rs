//! Image acquisition and transcoding
//!
//! Each referenced image is downloaded, decoded, optionally composited onto
//! white, re-encoded as JPEG and written to a path derived from the product
//! code and the image's role. Writes go through a temporary file in the
//! destination directory and are renamed into place, so an interrupted write
//! never leaves a truncated file at the final path.

use crate::crawler::Fetcher;
use crate::model::{EnrichedProduct, ItemFailure, ProductDetail, ProductImages};
use crate::state::RunPhase;
use crate::FetchError;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Extension of every written image
pub const IMAGE_EXTENSION: &str = "jpg";

/// Image acquisition errors
///
/// Never fatal to a product: the matching path field is left unset.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image worker failed: {0}")]
    Task(String),
}

/// What an image depicts, which decides its file name and treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Primary gallery image
    Product,
    /// Specification sheet
    Specification,
    /// Wiring diagram
    Wiring,
    /// Dimension drawing
    Dimension,
}

impl ImageRole {
    /// File name suffix placed after the product code
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Product => "",
            Self::Specification => "-SPEC",
            Self::Wiring => "-WD",
            Self::Dimension => "-DMS",
        }
    }

    /// Only the primary image is composited onto white
    pub fn white_background(&self) -> bool {
        matches!(self, Self::Product)
    }

    /// Deterministic file name for a product's image in this role
    pub fn file_name(&self, code: &str) -> String {
        format!("{}{}.{}", sanitize_code(code), self.suffix(), IMAGE_EXTENSION)
    }
}

/// Makes a product code safe to use as a file name
pub fn sanitize_code(code: &str) -> String {
    let cleaned: String = code
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Decodes an image and re-encodes it as an opaque JPEG
///
/// # Arguments
///
/// * `bytes` - Encoded source image (any supported format)
/// * `white_background` - Composite transparent areas over white first
/// * `quality` - JPEG quality (1-100)
pub fn transcode(bytes: &[u8], white_background: bool, quality: u8) -> Result<Vec<u8>, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(ImageError::Decode)?;

    let rgb = if white_background {
        let top = decoded.to_rgba8();
        let mut canvas = RgbaImage::from_pixel(top.width(), top.height(), Rgba([255, 255, 255, 255]));
        imageops::overlay(&mut canvas, &top, 0, 0);
        DynamicImage::ImageRgba8(canvas).to_rgb8()
    } else {
        decoded.to_rgb8()
    };

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder).map_err(ImageError::Encode)?;
    Ok(encoded)
}

/// Writes `bytes` to `path` via a temporary file and a rename
///
/// The parent directory is created when missing.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Downloads one image and stores it at `destination`
///
/// Decoding, encoding and the file write run on the blocking pool.
pub async fn acquire_and_transcode(
    fetcher: &Fetcher,
    image_url: &str,
    destination: &Path,
    white_background: bool,
    quality: u8,
) -> Result<(), ImageError> {
    let bytes = fetcher.fetch(image_url).await?;
    let destination = destination.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let encoded = transcode(&bytes, white_background, quality)?;
        write_atomic(&destination, &encoded)?;
        Ok::<(), ImageError>(())
    })
    .await
    .map_err(|e| ImageError::Task(e.to_string()))?
}

/// Destinations written during one run
///
/// File names derive from product codes alone, so two products sharing a
/// code share their image paths. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct ClaimedPaths {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ClaimedPaths {
    /// Records a destination, returning false if it was already claimed
    pub fn claim(&self, path: &Path) -> bool {
        match self.paths.lock() {
            Ok(mut paths) => paths.insert(path.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().insert(path.to_path_buf()),
        }
    }
}

/// Per-product image stage
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    fetcher: Fetcher,
    directory: PathBuf,
    quality: u8,
    claimed: ClaimedPaths,
}

impl ImagePipeline {
    pub fn new(fetcher: Fetcher, directory: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            fetcher,
            directory: directory.into(),
            quality,
            claimed: ClaimedPaths::default(),
        }
    }

    /// Acquires every image referenced by a detail record
    ///
    /// Only the first gallery image is kept as the primary image. Each
    /// failed image leaves its path unset and is reported alongside the
    /// product; the product itself always comes back. A path already written
    /// for an earlier product with the same code is overwritten with a warning.
    pub async fn process(&self, detail: ProductDetail) -> (EnrichedProduct, Vec<ItemFailure>) {
        let code = detail.code().to_string();
        let mut images = ProductImages::default();
        let mut failures = Vec::new();

        let jobs = [
            (ImageRole::Product, detail.gallery_image_urls.first()),
            (ImageRole::Specification, detail.spec_image_url.as_ref()),
            (ImageRole::Wiring, detail.wiring_image_url.as_ref()),
            (ImageRole::Dimension, detail.dimension_image_url.as_ref()),
        ];

        for (role, url) in jobs {
            let Some(url) = url else {
                continue;
            };

            let destination = self.directory.join(role.file_name(&code));
            if !self.claimed.claim(&destination) {
                tracing::warn!(
                    "Duplicate code {}: overwriting {}",
                    code,
                    destination.display()
                );
            }
            match acquire_and_transcode(
                &self.fetcher,
                url,
                &destination,
                role.white_background(),
                self.quality,
            )
            .await
            {
                Ok(()) => {
                    tracing::debug!("Saved {}", destination.display());
                    let slot = match role {
                        ImageRole::Product => &mut images.product_local_path,
                        ImageRole::Specification => &mut images.spec_local_path,
                        ImageRole::Wiring => &mut images.wiring_local_path,
                        ImageRole::Dimension => &mut images.dimension_local_path,
                    };
                    *slot = Some(destination);
                }
                Err(e) => {
                    tracing::warn!("Image {} for {} unavailable: {}", url, code, e);
                    failures.push(ItemFailure::new(
                        RunPhase::ProcessingImages,
                        code.clone(),
                        format!("{}: {}", url, e),
                    ));
                }
            }
        }

        (EnrichedProduct::new(detail, images), failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn transparent_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn decode_rgb(bytes: &[u8]) -> RgbImage {
        image::load_from_memory(bytes).unwrap().to_rgb8()
    }

    #[test]
    fn test_file_names_by_role() {
        assert_eq!(ImageRole::Product.file_name("PS-05N"), "PS-05N.jpg");
        assert_eq!(ImageRole::Specification.file_name("PS-05N"), "PS-05N-SPEC.jpg");
        assert_eq!(ImageRole::Wiring.file_name("PS-05N"), "PS-05N-WD.jpg");
        assert_eq!(ImageRole::Dimension.file_name("PS-05N"), "PS-05N-DMS.jpg");
    }

    #[test]
    fn test_claimed_paths_flag_repeats() {
        let claimed = ClaimedPaths::default();
        let shared = claimed.clone();
        let path = Path::new("images").join(ImageRole::Product.file_name("PS-05N"));

        assert!(claimed.claim(&path));
        assert!(!shared.claim(&path));
        let wiring = Path::new("images").join(ImageRole::Wiring.file_name("PS-05N"));
        assert!(claimed.claim(&wiring));
    }

    #[test]
    fn test_sanitize_code() {
        assert_eq!(sanitize_code("PS-05N"), "PS-05N");
        assert_eq!(sanitize_code("A/B C"), "A_B_C");
        assert_eq!(sanitize_code("../etc"), "_etc");
        assert_eq!(sanitize_code("  "), "_");
    }

    #[test]
    fn test_only_product_role_gets_white_background() {
        assert!(ImageRole::Product.white_background());
        assert!(!ImageRole::Specification.white_background());
        assert!(!ImageRole::Wiring.white_background());
        assert!(!ImageRole::Dimension.white_background());
    }

    #[test]
    fn test_white_background_fills_transparency() {
        let jpeg = transcode(&transparent_png(), true, 85).unwrap();
        let pixel = decode_rgb(&jpeg).get_pixel(1, 1).0;
        assert!(pixel.iter().all(|&c| c >= 245), "got {:?}", pixel);
    }

    #[test]
    fn test_without_background_alpha_is_dropped() {
        let jpeg = transcode(&transparent_png(), false, 85).unwrap();
        let pixel = decode_rgb(&jpeg).get_pixel(1, 1).0;
        assert!(pixel.iter().all(|&c| c <= 10), "got {:?}", pixel);
    }

    #[test]
    fn test_transcode_is_deterministic() {
        let png = transparent_png();
        assert_eq!(transcode(&png, true, 85).unwrap(), transcode(&png, true, 85).unwrap());
    }

    #[test]
    fn test_undecodable_bytes() {
        let result = transcode(b"definitely not an image", true, 85);
        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_write_atomic_creates_dirs_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("PS-05N.jpg");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
