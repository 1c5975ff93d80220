//! Worker configuration.
//!
//! [`WorkerOptions`] is a builder that threads the sampling policy, output
//! image settings and progress reporting through the
//! [`Worker`](crate::Worker) without polluting every function signature.
//! [`ResourceConfig`] and [`identity_from_env`] turn what the surrounding
//! job orchestrator provides into a [`WorkerIdentity`].
//!
//! # Example
//!
//! ```
//! use frameshard::{ImageFormat, PixelFormat, SampleRatePolicy, WorkerOptions};
//!
//! let options = WorkerOptions::new()
//!     .with_policy(SampleRatePolicy::from_frames_per_second(2.0)?)
//!     .with_image_format(ImageFormat::Jpeg)
//!     .with_pixel_format(PixelFormat::Gray8)
//!     .with_resolution(Some(640), None);
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```

use std::{
    env,
    fmt::{Debug, Formatter, Result as FmtResult},
    fs,
    path::Path,
    sync::Arc,
};

use ffmpeg_next::format::Pixel;
use serde::Deserialize;

use crate::{
    error::FrameShardError,
    progress::{NoOpProgress, ProgressCallback},
    sampler::SampleRatePolicy,
    shard::WorkerIdentity,
    writer::ImageFormat,
};

/// Environment variable holding the zero-based worker ordinal.
pub const WORKER_INDEX_ENV: &str = "FRAMESHARD_WORKER_INDEX";
/// Environment variable holding the total worker count.
pub const WORKER_COUNT_ENV: &str = "FRAMESHARD_WORKER_COUNT";

/// Colour model of decoded frames before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb8,
    /// 8-bit RGBA with alpha pre-set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Pixel format and resolution of the frames handed to the writer.
///
/// When no dimensions are set the source resolution is used. Setting one
/// dimension together with `maintain_aspect_ratio` computes the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutputOptions {
    /// Output pixel format.
    pub pixel_format: PixelFormat,
    /// Target width. `None` keeps the source width.
    pub width: Option<u32>,
    /// Target height. `None` keeps the source height.
    pub height: Option<u32>,
    /// Preserve the source aspect ratio when only one dimension is given.
    pub maintain_aspect_ratio: bool,
}

impl Default for FrameOutputOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Rgb8,
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl FrameOutputOptions {
    /// Resolve the final `(width, height)` for a source of the given size.
    pub fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(width), Some(height)) => (width, height),
            (Some(width), None) if self.maintain_aspect_ratio && source_width > 0 => {
                let ratio = width as f64 / source_width as f64;
                let height = (source_height as f64 * ratio).round() as u32;
                (width, height.max(1))
            }
            (Some(width), None) => (width, source_height),
            (None, Some(height)) if self.maintain_aspect_ratio && source_height > 0 => {
                let ratio = height as f64 / source_height as f64;
                let width = (source_width as f64 * ratio).round() as u32;
                (width.max(1), height)
            }
            (None, Some(height)) => (source_width, height),
            (None, None) => (source_width, source_height),
        }
    }
}

/// Settings for a worker run.
///
/// All fields have defaults: every frame, PNG output at source resolution
/// in RGB8, no progress reporting.
#[derive(Clone)]
pub struct WorkerOptions {
    pub(crate) policy: SampleRatePolicy,
    pub(crate) image_format: ImageFormat,
    pub(crate) frame_output: FrameOutputOptions,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Fire the progress callback every N written frames.
    pub(crate) batch_size: u64,
}

impl Debug for WorkerOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("WorkerOptions")
            .field("policy", &self.policy)
            .field("image_format", &self.image_format)
            .field("frame_output", &self.frame_output)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            policy: SampleRatePolicy::EveryFrame,
            image_format: ImageFormat::Png,
            frame_output: FrameOutputOptions::default(),
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Set the sampling policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SampleRatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the encoded image format of written frames.
    #[must_use]
    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    /// Set the pixel format of decoded frames.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.frame_output.pixel_format = format;
        self
    }

    /// Set a custom output resolution. `None` keeps the source value.
    #[must_use]
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.frame_output.width = width;
        self.frame_output.height = height;
        self
    }

    /// Control aspect-ratio preservation when only one dimension is set.
    #[must_use]
    pub fn with_maintain_aspect_ratio(mut self, maintain: bool) -> Self {
        self.frame_output.maintain_aspect_ratio = maintain;
        self
    }

    /// Set the complete frame output configuration.
    #[must_use]
    pub fn with_frame_output(mut self, options: FrameOutputOptions) -> Self {
        self.frame_output = options;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Fire the progress callback every `size` written frames (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured sampling policy.
    pub fn policy(&self) -> SampleRatePolicy {
        self.policy
    }

    /// The configured image format.
    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }

    /// The configured frame output settings.
    pub fn frame_output(&self) -> &FrameOutputOptions {
        &self.frame_output
    }

    /// Validate everything that would make a run pointless.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] for an invalid sampling
    /// rate or a zero output dimension.
    pub fn validate(&self) -> Result<(), FrameShardError> {
        self.policy.validate()?;
        if self.frame_output.width == Some(0) || self.frame_output.height == Some(0) {
            return Err(FrameShardError::configuration(
                "output width and height must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Cluster resource document written by the job orchestrator.
///
/// Each instance receives the full host list and its own host name, e.g.
/// `{"current_host": "algo-2", "hosts": ["algo-1", "algo-2"]}`. Extra
/// fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceConfig {
    /// Name of the host this process runs on.
    pub current_host: String,
    /// Every host participating in the job.
    pub hosts: Vec<String>,
}

impl ResourceConfig {
    /// Parse a resource document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if the text is not a valid
    /// resource document.
    pub fn from_json(text: &str) -> Result<Self, FrameShardError> {
        serde_json::from_str(text).map_err(|error| {
            FrameShardError::configuration(format!("invalid resource config: {error}"))
        })
    }

    /// Read and parse a resource document.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if the file cannot be read
    /// or parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FrameShardError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|error| {
            FrameShardError::configuration(format!(
                "cannot read resource config {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }

    /// Derive this host's identity.
    ///
    /// Hosts are sorted so the ordinal does not depend on the order the
    /// orchestrator happened to list them in.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if the host list is empty,
    /// contains duplicates, or does not contain `current_host`.
    pub fn identity(&self) -> Result<WorkerIdentity, FrameShardError> {
        let mut hosts: Vec<&str> = self.hosts.iter().map(String::as_str).collect();
        hosts.sort_unstable();
        let count = hosts.len();
        hosts.dedup();
        if hosts.len() != count {
            return Err(FrameShardError::configuration(
                "resource config lists the same host more than once",
            ));
        }

        let ordinal = hosts
            .iter()
            .position(|host| *host == self.current_host)
            .ok_or_else(|| {
                FrameShardError::configuration(format!(
                    "current host {:?} is not in the host list",
                    self.current_host
                ))
            })?;
        WorkerIdentity::new(ordinal, count)
    }
}

/// Read the worker identity from [`WORKER_INDEX_ENV`] and
/// [`WORKER_COUNT_ENV`].
///
/// Returns `Ok(None)` when neither variable is set.
///
/// # Errors
///
/// Returns [`FrameShardError::Configuration`] if only one of them is set or
/// either is not a valid identity component.
pub fn identity_from_env() -> Result<Option<WorkerIdentity>, FrameShardError> {
    let index = env::var(WORKER_INDEX_ENV).ok();
    let count = env::var(WORKER_COUNT_ENV).ok();
    identity_from_values(index.as_deref(), count.as_deref())
}

/// Parse a worker identity from optional raw ordinal and count strings.
///
/// # Errors
///
/// Same conditions as [`identity_from_env`].
pub fn identity_from_values(
    index: Option<&str>,
    count: Option<&str>,
) -> Result<Option<WorkerIdentity>, FrameShardError> {
    match (index, count) {
        (None, None) => Ok(None),
        (Some(index), Some(count)) => {
            let ordinal = parse_component(index, "worker index")?;
            let count = parse_component(count, "worker count")?;
            WorkerIdentity::new(ordinal, count).map(Some)
        }
        (Some(_), None) => Err(FrameShardError::configuration(
            "worker index is set but worker count is not",
        )),
        (None, Some(_)) => Err(FrameShardError::configuration(
            "worker count is set but worker index is not",
        )),
    }
}

fn parse_component(value: &str, name: &str) -> Result<usize, FrameShardError> {
    value.trim().parse::<usize>().map_err(|_| {
        FrameShardError::configuration(format!(
            "{name} must be a non-negative integer, got {value:?}"
        ))
    })
}
