/// Tour image uploads
///
/// A tour accepts one cover image (`imageCover`) and up to three gallery
/// images (`images`) as multipart fields. Every image is decoded, cropped to
/// 2000×1333 and re-encoded as JPEG quality 90 under
/// `<public>/img/tours/tour-<id>-<millis>-cover.jpeg` and
/// `tour-<id>-<millis>-<n>.jpeg`. Decoding and encoding run on the blocking
/// pool; the cover and the gallery are processed concurrently and either
/// both succeed or the upload fails.

use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use futures::future::try_join_all;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;

/// Output width in pixels
pub const IMAGE_WIDTH: u32 = 2000;

/// Output height in pixels
pub const IMAGE_HEIGHT: u32 = 1333;

pub const JPEG_QUALITY: u8 = 90;

/// Multipart field carrying the cover image
pub const COVER_FIELD: &str = "imageCover";

/// Multipart field carrying gallery images
pub const GALLERY_FIELD: &str = "images";

pub const MAX_GALLERY_IMAGES: usize = 3;

/// Body limit of the upload route
pub const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Tour images directory relative to the public directory
pub const TOUR_IMAGE_DIR: &str = "img/tours";

/// Errors raised while accepting or processing images
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Part is not `image/*`
    #[error("Not an image! Please upload only images.")]
    NotAnImage,

    /// More files than the field allows
    #[error("Too many files for '{field}' (at most {max})")]
    TooMany { field: String, max: usize },

    /// Field other than `imageCover` or `images`
    #[error("Unexpected field '{0}'")]
    UnexpectedField(String),

    /// Bytes could not be decoded as an image
    #[error("Could not read image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Could not save image: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task panicked or was cancelled
    #[error("Image task failed: {0}")]
    Task(String),
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Files accepted for a tour, not yet processed
#[derive(Debug, Default)]
pub struct TourUploads {
    pub cover: Option<Upload>,
    pub images: Vec<Upload>,
}

/// Filenames written for a tour; `None` where nothing was uploaded
#[derive(Debug, Default, PartialEq)]
pub struct SavedImages {
    pub cover: Option<String>,
    pub images: Option<Vec<String>>,
}

impl TourUploads {
    /// Reads every multipart field into memory
    ///
    /// # Errors
    ///
    /// Malformed multipart bodies and rejected files (see [`TourUploads::push`]).
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut uploads = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;

            uploads.push(&name, Upload { content_type, data })?;
        }

        Ok(uploads)
    }

    /// Accepts a file for a field
    ///
    /// # Errors
    ///
    /// - `ImageError::NotAnImage` unless the content type is `image/*`
    /// - `ImageError::TooMany` past one cover or three gallery images
    /// - `ImageError::UnexpectedField` for other field names
    pub fn push(&mut self, field: &str, upload: Upload) -> Result<(), ImageError> {
        if field != COVER_FIELD && field != GALLERY_FIELD {
            return Err(ImageError::UnexpectedField(field.to_string()));
        }

        let is_image = upload
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ImageError::NotAnImage);
        }

        if field == COVER_FIELD {
            if self.cover.is_some() {
                return Err(ImageError::TooMany {
                    field: field.to_string(),
                    max: 1,
                });
            }
            self.cover = Some(upload);
        } else {
            if self.images.len() == MAX_GALLERY_IMAGES {
                return Err(ImageError::TooMany {
                    field: field.to_string(),
                    max: MAX_GALLERY_IMAGES,
                });
            }
            self.images.push(upload);
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cover.is_none() && self.images.is_empty()
    }
}

/// Crops and scales to 2000×1333 and encodes as JPEG
pub fn resize_to_jpeg(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let source = image::load_from_memory(data).map_err(|e| ImageError::Decode(e.to_string()))?;
    let resized = source
        .resize_to_fill(IMAGE_WIDTH, IMAGE_HEIGHT, FilterType::CatmullRom)
        .to_rgb8();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&resized)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(out)
}

async fn process(data: Bytes, path: PathBuf) -> Result<(), ImageError> {
    let jpeg = tokio::task::spawn_blocking(move || resize_to_jpeg(&data))
        .await
        .map_err(|e| ImageError::Task(e.to_string()))??;

    tokio::fs::write(&path, jpeg).await?;
    debug!(path = %path.display(), "Saved tour image");
    Ok(())
}

/// Processes and writes a tour's uploads into `dir`
///
/// # Errors
///
/// The first decode, encode or I/O failure; files already written are left
/// in place.
pub async fn save_tour_images(
    dir: &Path,
    tour_id: Uuid,
    uploads: TourUploads,
) -> Result<SavedImages, ImageError> {
    tokio::fs::create_dir_all(dir).await?;
    let stamp = Utc::now().timestamp_millis();
    let TourUploads { cover, images } = uploads;

    let cover = async move {
        match cover {
            Some(upload) => {
                let filename = format!("tour-{}-{}-cover.jpeg", tour_id, stamp);
                process(upload.data, dir.join(&filename)).await?;
                Ok::<_, ImageError>(Some(filename))
            }
            None => Ok(None),
        }
    };

    let gallery = try_join_all(images.into_iter().enumerate().map(|(i, upload)| {
        let filename = format!("tour-{}-{}-{}.jpeg", tour_id, stamp, i + 1);
        let path = dir.join(&filename);
        async move {
            process(upload.data, path).await?;
            Ok::<_, ImageError>(filename)
        }
    }));

    let (cover, images) = futures::try_join!(cover, gallery)?;

    Ok(SavedImages {
        cover,
        images: if images.is_empty() { None } else { Some(images) },
    })
}
