//! Frame output.
//!
//! Frames land at `{root}/{video identifier}/frame_{index:08}.{ext}`. The
//! path depends only on the video identifier and the native frame index,
//! never on which worker produced it, so per-worker output trees can be
//! merged by a plain prefix-preserving copy and re-runs overwrite the same
//! files.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::Cursor,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use image::{DynamicImage, ImageFormat as EncodedFormat};
use serde::Serialize;

use crate::error::FrameShardError;

/// Zero-padding width of frame indices in file names. Eight digits keep
/// lexicographic and numeric order identical up to 100 million frames.
pub const FRAME_INDEX_WIDTH: usize = 8;

/// Encoded image format of written frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// Baseline JPEG. Alpha is dropped before encoding.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
    /// TIFF.
    Tiff,
}

impl ImageFormat {
    /// File extension used in output names.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }

    fn to_encoded_format(self) -> EncodedFormat {
        match self {
            ImageFormat::Png => EncodedFormat::Png,
            ImageFormat::Jpeg => EncodedFormat::Jpeg,
            ImageFormat::Bmp => EncodedFormat::Bmp,
            ImageFormat::Tiff => EncodedFormat::Tiff,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = FrameShardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "bmp" => Ok(ImageFormat::Bmp),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            other => Err(FrameShardError::configuration(format!(
                "unsupported image format: {other}"
            ))),
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// A frame that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    /// Path relative to the output root.
    pub relative_path: PathBuf,
    /// Size of the encoded image.
    pub bytes_written: u64,
}

/// Output root plus naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    format: ImageFormat,
}

impl OutputLayout {
    /// Lay frames out under `root` in the given image format.
    pub fn new<P: Into<PathBuf>>(root: P, format: ImageFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Output root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Image format of written frames.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Output path of a frame, relative to the root.
    ///
    /// The per-video directory is the video identifier itself, extension
    /// included, so `clip.mp4` and `clip.mov` never share a directory. For
    /// the flat identifiers of a directory listing that is just the file
    /// name; nested identifiers such as `x/a.mp4` keep their parents, so
    /// `x/a.mp4` and `y/a.mp4` stay apart too. Root, prefix and `.`/`..`
    /// components are dropped so the result never escapes the output root.
    pub fn relative_path(&self, video: &Path, native_index: u64) -> PathBuf {
        let directory: PathBuf = video
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        directory.join(format!(
            "frame_{native_index:0width$}.{extension}",
            width = FRAME_INDEX_WIDTH,
            extension = self.format.extension(),
        ))
    }

    /// Absolute output path of a frame.
    pub fn frame_path(&self, video: &Path, native_index: u64) -> PathBuf {
        self.root.join(self.relative_path(video, native_index))
    }

    /// Encode `image` and write it to its frame path, creating directories
    /// as needed. Existing files are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Write`] if encoding, directory creation
    /// or the write itself fails.
    pub fn write(
        &self,
        video: &Path,
        native_index: u64,
        image: &DynamicImage,
    ) -> Result<OutputRecord, FrameShardError> {
        let relative_path = self.relative_path(video, native_index);
        let path = self.root.join(&relative_path);
        let write_error = |reason: String| FrameShardError::Write {
            path: path.clone(),
            reason,
        };

        let bytes = self
            .encode(image)
            .map_err(|error| write_error(format!("encoding failed: {error}")))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| write_error(error.to_string()))?;
        }
        fs::write(&path, &bytes).map_err(|error| write_error(error.to_string()))?;

        log::trace!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(OutputRecord {
            relative_path,
            bytes_written: bytes.len() as u64,
        })
    }

    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, FrameShardError> {
        let mut buffer = Cursor::new(Vec::new());
        let format = self.format.to_encoded_format();
        if self.format == ImageFormat::Jpeg && image.color().has_alpha() {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, format)?;
        } else {
            image.write_to(&mut buffer, format)?;
        }
        Ok(buffer.into_inner())
    }
}
