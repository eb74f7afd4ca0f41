//! Image fetching and the raster operations the documents need: cover crop,
//! contain fit, two-up composition and size-bounded JPEG encoding.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};
use tracing::warn;

use crate::error::ExportError;
use crate::settings::{
    cm_to_px, ExportSettings, COLUMN_HEIGHT_CM, COLUMN_WIDTH_CM, IMAGE_DPI, JPEG_MIN_QUALITY,
    JPEG_QUALITY, JPEG_QUALITY_STEP, MAX_IMAGE_BYTES,
};

/// Source of image bytes. `None` means the image is unavailable; callers carry
/// on without it.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>>;
}

/// Accepts `http(s)://` and protocol-relative URLs; bare hosts get `https://`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Some(trimmed.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if lowered.contains("://")
        || lowered.starts_with("data:")
        || trimmed.contains(char::is_whitespace)
    {
        return None;
    }
    Some(format!("https://{trimmed}"))
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(settings: &ExportSettings) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.image_timeout)
            .user_agent(settings.image_user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let Some(target) = normalize_url(url) else {
            warn!(
                event_name = "export.image.invalid_url",
                url = %url,
                "skipping image with unusable url"
            );
            return None;
        };

        match self.download(&target).await {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                warn!(
                    event_name = "export.image.fetch_failed",
                    url = %target,
                    error = %error,
                    "image fetch failed; continuing without it"
                );
                None
            }
        }
    }
}

/// Fixed URL-to-bytes table. Records every URL asked for.
#[derive(Default)]
pub struct MemoryImageFetcher {
    images: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.images.insert(url.into(), bytes);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }
        self.images.get(url).cloned()
    }
}

/// Scales to fill `width` x `height` and center-crops the overflow.
pub fn cover_crop(source: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (source_width, source_height) = source.dimensions();
    if source_width == 0 || source_height == 0 {
        return DynamicImage::new_rgb8(width, height);
    }

    let scale = f64::max(
        f64::from(width) / f64::from(source_width),
        f64::from(height) / f64::from(source_height),
    );
    let scaled_width = ((f64::from(source_width) * scale).ceil() as u32).max(width);
    let scaled_height = ((f64::from(source_height) * scale).ceil() as u32).max(height);
    let scaled = source.resize_exact(scaled_width, scaled_height, FilterType::Lanczos3);

    let left = (scaled_width - width) / 2;
    let top = (scaled_height - height) / 2;
    scaled.crop_imm(left, top, width, height)
}

/// Shrinks to fit inside the bounds keeping the aspect ratio. Never enlarges.
pub fn contain_fit(source: &DynamicImage, max_width: u32, max_height: Option<u32>) -> DynamicImage {
    let (source_width, source_height) = source.dimensions();
    if source_width == 0 || source_height == 0 {
        return source.clone();
    }

    let mut scale = f64::min(1.0, f64::from(max_width) / f64::from(source_width));
    if let Some(max_height) = max_height {
        scale = scale.min(f64::from(max_height) / f64::from(source_height));
    }
    if scale >= 1.0 {
        return source.clone();
    }

    let width = ((f64::from(source_width) * scale).round() as u32).max(1);
    let height = ((f64::from(source_height) * scale).round() as u32).max(1);
    source.resize_exact(width, height, FilterType::Lanczos3)
}

/// Two cover-cropped columns side by side, no gap.
pub fn compose_two_up(
    left: &DynamicImage,
    right: &DynamicImage,
    column_width: u32,
    column_height: u32,
) -> RgbImage {
    let mut canvas = RgbImage::new(column_width * 2, column_height);
    imageops::replace(&mut canvas, &cover_crop(left, column_width, column_height).to_rgb8(), 0, 0);
    imageops::replace(
        &mut canvas,
        &cover_crop(right, column_width, column_height).to_rgb8(),
        i64::from(column_width),
        0,
    );
    canvas
}

fn encode_at(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
        image.write_with_encoder(encoder)?;
    }
    Ok(buffer)
}

/// Encodes at the default quality, stepping down until the result fits
/// `max_bytes` or the quality floor is reached.
pub fn encode_jpeg(image: &RgbImage, max_bytes: usize) -> Result<Vec<u8>, ExportError> {
    let mut quality = JPEG_QUALITY;
    loop {
        let bytes = encode_at(image, quality)?;
        if bytes.len() <= max_bytes || quality <= JPEG_MIN_QUALITY {
            return Ok(bytes);
        }
        quality = quality.saturating_sub(JPEG_QUALITY_STEP).max(JPEG_MIN_QUALITY);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

impl EncodedImage {
    fn from_rgb(image: &RgbImage) -> Result<Self, ExportError> {
        Ok(Self {
            bytes: encode_jpeg(image, MAX_IMAGE_BYTES)?,
            width_px: image.width(),
            height_px: image.height(),
        })
    }
}

/// Fetch-and-shape steps used by the Word builder. Every method answers `None`
/// when the image cannot be produced; the reason is logged.
pub struct ImagePipeline<'a> {
    fetcher: &'a dyn ImageFetcher,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(fetcher: &'a dyn ImageFetcher) -> Self {
        Self { fetcher }
    }

    async fn load(&self, url: &str) -> Option<DynamicImage> {
        let bytes = self.fetcher.fetch(url).await?;
        match image::load_from_memory(&bytes) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                warn!(
                    event_name = "export.image.decode_failed",
                    url = %url,
                    error = %error,
                    "image could not be decoded; continuing without it"
                );
                None
            }
        }
    }

    fn finish(&self, image: &RgbImage, url: &str) -> Option<EncodedImage> {
        match EncodedImage::from_rgb(image) {
            Ok(encoded) => Some(encoded),
            Err(error) => {
                warn!(
                    event_name = "export.image.encode_failed",
                    url = %url,
                    error = %error,
                    "image could not be encoded; continuing without it"
                );
                None
            }
        }
    }

    /// Two-column block. Both images must load, a lone image is never shown.
    pub async fn two_up(&self, left_url: &str, right_url: &str) -> Option<EncodedImage> {
        let left = self.load(left_url).await?;
        let right = self.load(right_url).await?;
        let column_width = cm_to_px(COLUMN_WIDTH_CM, IMAGE_DPI);
        let column_height = cm_to_px(COLUMN_HEIGHT_CM, IMAGE_DPI);
        self.finish(&compose_two_up(&left, &right, column_width, column_height), left_url)
    }

    /// One cover-cropped column image.
    pub async fn column(&self, url: &str) -> Option<EncodedImage> {
        let source = self.load(url).await?;
        let column_width = cm_to_px(COLUMN_WIDTH_CM, IMAGE_DPI);
        let column_height = cm_to_px(COLUMN_HEIGHT_CM, IMAGE_DPI);
        self.finish(&cover_crop(&source, column_width, column_height).to_rgb8(), url)
    }

    /// Uncropped image no wider than `max_width_px`.
    pub async fn contained(&self, url: &str, max_width_px: u32) -> Option<EncodedImage> {
        let source = self.load(url).await?;
        self.finish(&contain_fit(&source, max_width_px, None).to_rgb8(), url)
    }
}
