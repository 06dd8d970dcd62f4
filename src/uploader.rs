//! Accepting images: validation, preview decoding and bundled samples.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{ImageAsset, SelectedFile};

/// Largest accepted upload, inclusive.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Sample name → bundled file name.
pub const SAMPLES: [(&str, &str); 3] = [
    ("portrait", "portrait.jpg"),
    ("group", "group.jpg"),
    ("family", "family.jpg"),
];

const OCTET_STREAM: &str = "application/octet-stream";

/// Something that can hand over the bytes of a bundled sample file.
pub trait SampleSource {
    /// Fetch `file_name`. Any failure is reported as [`Error::FetchFailed`].
    fn fetch(&self, file_name: &str) -> Result<SelectedFile>;
}

/// Samples stored as plain files under one directory.
#[derive(Debug, Clone)]
pub struct SampleDir {
    root: PathBuf,
}

impl SampleDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SampleSource for SampleDir {
    fn fetch(&self, file_name: &str) -> Result<SelectedFile> {
        let path = self.root.join(file_name);
        let bytes = fs::read(&path).map_err(|e| Error::FetchFailed {
            name: file_name.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        Ok(SelectedFile::new(file_name, mime_from_path(&path), bytes))
    }
}

/// Validates selections and loads samples through `S`.
#[derive(Debug, Clone)]
pub struct Uploader<S> {
    samples: S,
}

impl<S: SampleSource> Uploader<S> {
    pub fn new(samples: S) -> Self {
        Self { samples }
    }

    /// Validate `file` and decode it for preview.
    pub fn select(&self, file: SelectedFile) -> Result<ImageAsset> {
        validate(&file)?;

        let decoded = image::load_from_memory(&file.bytes)?;
        let preview = decoded.to_rgba8();
        let (natural_width, natural_height) = preview.dimensions();
        if natural_width == 0 || natural_height == 0 {
            return Err(Error::Decode("image has zero dimensions".to_string()));
        }
        debug!(
            name = %file.name,
            mime = %file.mime_type,
            size = file.size(),
            natural_width,
            natural_height,
            "image accepted"
        );

        let byte_size = file.size();
        Ok(ImageAsset {
            name: file.name,
            raw_bytes: Arc::from(file.bytes),
            mime_type: file.mime_type,
            natural_width,
            natural_height,
            byte_size,
            preview: Arc::new(preview),
        })
    }

    /// Fetch a bundled sample by its short name and run it through [`Uploader::select`].
    pub fn load_sample(&self, name: &str) -> Result<ImageAsset> {
        let file_name = sample_file_name(name)?;
        debug!(sample = name, file_name, "fetching sample");
        let file = self.samples.fetch(file_name)?;
        self.select(file)
    }
}

/// Type and size checks, without decoding.
pub fn validate(file: &SelectedFile) -> Result<()> {
    if !file.mime_type.starts_with("image/") {
        return Err(Error::InvalidType {
            mime_type: file.mime_type.clone(),
        });
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Err(Error::TooLarge {
            size: file.size(),
            max: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}

pub fn sample_file_name(name: &str) -> Result<&'static str> {
    SAMPLES
        .iter()
        .find(|(sample, _)| *sample == name)
        .map(|(_, file_name)| *file_name)
        .ok_or_else(|| Error::UnknownSample(name.to_string()))
}

/// MIME type guessed from the file extension; unknown extensions are not images.
pub fn mime_from_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or(OCTET_STREAM)
}

/// Read a local file into a [`SelectedFile`].
pub fn read_file(path: &Path) -> Result<SelectedFile> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SelectedFile::new(name, mime_from_path(path), bytes))
}

/// Human-readable size in base-1024 units, two decimals at most.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    while unit + 1 < UNITS.len() && bytes >= 1024u64.pow(unit as u32 + 1) {
        unit += 1;
    }
    let value = bytes as f64 / 1024f64.powi(unit as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
