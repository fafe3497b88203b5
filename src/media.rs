//! File storage for queued uploads and published crops, plus the image
//! decoding the queue needs.

use chrono::{Datelike, Utc};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ImageConfig;
use crate::db::CropBounds;

pub struct MediaStore {
    root: PathBuf,
    images: ImageConfig,
}

/// What an upload turned out to be once decoded.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, images: ImageConfig) -> Self {
        Self {
            root: root.into(),
            images,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Unique file name. A process-wide counter keeps names distinct even
    /// within the same second.
    fn unique_name(stem: &str, extension: &str) -> String {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let now = Utc::now();
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}_{}_{}.{}",
            stem,
            now.timestamp(),
            now.timestamp_subsec_micros(),
            seq,
            extension
        )
    }

    fn write(&self, relative: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)
    }

    /// Store a raw upload under `queued-images/YYYY/MM/DD/`. Returns the path
    /// relative to the media root.
    pub fn store_upload(&self, bytes: &[u8], extension: &str) -> io::Result<String> {
        let today = Utc::now();
        let relative = format!(
            "queued-images/{:04}/{:02}/{:02}/{}",
            today.year(),
            today.month(),
            today.day(),
            Self::unique_name("upload", extension)
        );
        self.write(&relative, bytes)?;
        Ok(relative)
    }

    /// Store a published crop under `images/`.
    pub fn store_published(&self, person_id: i64, png: &[u8]) -> io::Result<String> {
        let relative = format!("images/{}", Self::unique_name(&person_id.to_string(), "png"));
        self.write(&relative, png)?;
        Ok(relative)
    }

    pub fn read(&self, relative: &str) -> io::Result<Vec<u8>> {
        fs::read(self.absolute(relative))
    }

    pub fn remove(&self, relative: &str) -> io::Result<()> {
        fs::remove_file(self.absolute(relative))
    }

    /// URL the public site serves a stored file under.
    pub fn public_url(&self, relative: &str) -> String {
        let base = &self.images.base_url;
        let url = if base.ends_with('/') {
            format!("{}{}", base, relative)
        } else {
            format!("{}/{}", base, relative)
        };
        match url.strip_prefix("http://") {
            Some(rest) if self.images.force_https_images => format!("https://{}", rest),
            _ => url,
        }
    }
}

/// Decode just enough of `bytes` to know it is an image and how big.
pub fn inspect(bytes: &[u8]) -> image::ImageResult<ImageInfo> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();
    Ok(ImageInfo {
        format,
        width,
        height,
    })
}

pub fn decode(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Crop and re-encode as PNG. Converts to RGBA first: CMYK-ish sources
/// cannot be written as PNG, and any alpha channel is kept.
pub fn crop_to_png(img: &DynamicImage, crop: &CropBounds) -> image::ImageResult<Vec<u8>> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let cropped = rgba.crop_imm(crop.min_x, crop.min_y, crop.width(), crop.height());

    let mut out = Cursor::new(Vec::new());
    cropped.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
