//! Error types for the `frameshard` crate.
//!
//! This module defines [`FrameShardError`], the unified error type returned by
//! all fallible operations in the crate. Only
//! [`Configuration`](FrameShardError::Configuration) errors are fatal to a
//! worker; every other variant is tied to a single video or frame and ends up
//! recorded in the [`JobReport`](crate::JobReport) instead of aborting the
//! batch.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `frameshard` operations.
///
/// Variants carry enough context (paths, frame indices, upstream messages)
/// to be copied verbatim into a per-video report entry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameShardError {
    /// Invalid worker identity, sample rate, or input root. Aborts the worker
    /// before any video is opened.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The video could not be opened (missing, zero-byte, corrupt container,
    /// no video stream, unsupported codec).
    #[error("Unreadable video {path}: {reason}")]
    UnreadableVideo {
        /// Path that was passed to the decoder backend.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// Decoding failed part-way through a stream. The video is truncated at
    /// this point rather than abandoned.
    #[error("Decode fault in {path} after frame {frame}: {reason}")]
    DecodeFault {
        /// Path of the video being decoded.
        path: PathBuf,
        /// Number of native frames delivered before the fault.
        frame: u64,
        /// Underlying decoder message.
        reason: String,
    },

    /// A sampled frame could not be encoded or written.
    #[error("Failed to write frame to {path}: {reason}")]
    Write {
        /// Destination path of the frame image.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),

    /// A report or resource document could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),
}

impl FrameShardError {
    /// Returns `true` if the error must terminate the worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameShardError::Configuration(_))
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        FrameShardError::Configuration(message.into())
    }
}

impl From<FfmpegError> for FrameShardError {
    fn from(error: FfmpegError) -> Self {
        FrameShardError::Ffmpeg(error.to_string())
    }
}
