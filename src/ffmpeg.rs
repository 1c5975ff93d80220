//! FFmpeg library setup.
//!
//! FFmpeg keeps its own logger, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade, and prints straight to
//! stderr. A batch worker decoding hundreds of files usually wants that
//! quieter than FFmpeg's default, so [`set_ffmpeg_log_level`] is exposed
//! here without requiring users to depend on `ffmpeg-next` directly.
//!
//! # Example
//!
//! ```no_run
//! use frameshard::FfmpegLogLevel;
//!
//! // Only let FFmpeg print real errors.
//! frameshard::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::sync::OnceLock;

use ffmpeg_next::util::log::Level;

use crate::error::FrameShardError;

static INITIALISED: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialise the FFmpeg libraries once per process.
pub(crate) fn init() -> Result<(), FrameShardError> {
    INITIALISED
        .get_or_init(|| ffmpeg_next::init().map_err(|error| error.to_string()))
        .clone()
        .map_err(FrameShardError::Ffmpeg)
}

/// FFmpeg's own log verbosity, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors, such as a corrupt packet.
    Error,
    /// Warnings. FFmpeg's own default.
    Warning,
    /// Informational messages.
    Info,
    /// Decoder debugging output.
    Debug,
}

impl From<FfmpegLogLevel> for Level {
    fn from(level: FfmpegLogLevel) -> Self {
        match level {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

/// Set FFmpeg's internal log level.
///
/// This only affects what FFmpeg prints to stderr, not records emitted
/// through the `log` crate.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.into());
}
