use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::services::media_store::{converted_file_name, MediaStore};
use crate::utils::image_processor::{self, JPEG_QUALITY};

/// Camera RAW extensions whose embedded JPEG preview becomes the display file.
pub const RAW_EXTENSIONS: &[&str] = &["nef", "dng", "cr2", "cr3", "arw", "rw2", "orf", "raf", "srw"];

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no embedded JPEG preview found in RAW file")]
    NoEmbeddedPreview,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HEIF decoding is not available in this build")]
    HeifUnavailable,

    #[error("HEIF decoding failed: {0}")]
    Heif(String),

    #[error("conversion task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Already displayable by a browser.
    Standard,
    Raw,
    Heif,
}

/// Classifies an upload by its original file name and declared content type.
pub fn classify(file_name: &str, content_type: Option<&str>) -> MediaKind {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if RAW_EXTENSIONS.contains(&ext.as_str()) {
        return MediaKind::Raw;
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if ext == "heic" || ext == "heif" || content_type.contains("heic") || content_type.contains("heif") {
        return MediaKind::Heif;
    }

    MediaKind::Standard
}

/// A file that has been written to the media store by the upload reader.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Name inside the media store.
    pub file_name: String,
    /// Name the client sent.
    pub original_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedMedia {
    /// Name of the displayable file inside the media store.
    pub file_name: String,
    /// True when the upload itself is the displayable file.
    pub kept_original: bool,
}

/// Decodes HEIF/HEIC files into an upright image.
pub trait HeifDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ConversionError>;
}

/// Used when the crate is built without the `heic` feature.
pub struct UnavailableHeifDecoder;

impl HeifDecoder for UnavailableHeifDecoder {
    fn decode(&self, _path: &Path) -> Result<DynamicImage, ConversionError> {
        Err(ConversionError::HeifUnavailable)
    }
}

#[cfg(feature = "heic")]
pub struct LibHeifDecoder;

#[cfg(feature = "heic")]
impl HeifDecoder for LibHeifDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ConversionError> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let heif_err = |e: libheif_rs::HeifError| ConversionError::Heif(e.to_string());
        let path_str = path
            .to_str()
            .ok_or_else(|| ConversionError::Heif("non UTF-8 path".to_string()))?;

        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_file(path_str).map_err(heif_err)?;
        let handle = ctx.primary_image_handle().map_err(heif_err)?;
        // libheif applies the container's rotation and mirroring while decoding
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(heif_err)?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| ConversionError::Heif("missing interleaved plane".to_string()))?;

        let width = plane.width;
        let height = plane.height;
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_len]);
        }

        image::RgbImage::from_raw(width, height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| ConversionError::Heif("decoded buffer size mismatch".to_string()))
    }
}

pub fn default_heif_decoder() -> Arc<dyn HeifDecoder> {
    #[cfg(feature = "heic")]
    {
        Arc::new(LibHeifDecoder)
    }
    #[cfg(not(feature = "heic"))]
    {
        Arc::new(UnavailableHeifDecoder)
    }
}

/// Turns uploads into files a browser can display.
#[derive(Clone)]
pub struct MediaConverter {
    store: MediaStore,
    heif: Arc<dyn HeifDecoder>,
}

impl MediaConverter {
    pub fn new(store: MediaStore) -> Self {
        Self::with_heif_decoder(store, default_heif_decoder())
    }

    pub fn with_heif_decoder(store: MediaStore, heif: Arc<dyn HeifDecoder>) -> Self {
        Self { store, heif }
    }

    /// Converts RAW and HEIF uploads to JPEG and unlinks the original;
    /// anything else is passed through untouched.
    pub async fn convert(&self, upload: &StoredUpload) -> Result<ConvertedMedia, ConversionError> {
        let kind = classify(&upload.original_name, upload.content_type.as_deref());
        if kind == MediaKind::Standard {
            debug!(file = %upload.file_name, "Upload is already displayable");
            return Ok(ConvertedMedia {
                file_name: upload.file_name.clone(),
                kept_original: true,
            });
        }

        let source = self.store.path_for(&upload.file_name)?;
        let target_name = converted_file_name(&upload.original_name);
        let target = self.store.path_for(&target_name)?;

        let heif = Arc::clone(&self.heif);
        let task_target = target.clone();
        let result = tokio::task::spawn_blocking(move || match kind {
            MediaKind::Raw => image_processor::extract_raw_preview(&source, &task_target),
            MediaKind::Heif => {
                let img = heif.decode(&source)?;
                image_processor::write_jpeg(&img, &task_target, JPEG_QUALITY)
            }
            MediaKind::Standard => Ok(()),
        })
        .await
        .map_err(|e| ConversionError::Task(e.to_string()))?;

        if let Err(e) = result {
            // a partially written target is useless
            self.store.remove(&target_name).await;
            return Err(e);
        }

        self.store.remove(&upload.file_name).await;
        info!(
            original = %upload.original_name,
            converted = %target_name,
            kind = ?kind,
            "Converted upload to JPEG"
        );

        Ok(ConvertedMedia {
            file_name: target_name,
            kept_original: false,
        })
    }
}
