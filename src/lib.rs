//! # frameshard
//!
//! Sharded still-frame extraction: many independent worker processes share
//! one pool of input videos, each takes a deterministic slice of it, decodes
//! its videos with FFmpeg via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next), samples frames at
//! a configurable rate, and writes them to a per-worker output tree whose
//! paths never collide with any other worker's.
//!
//! ## Quick Start
//!
//! ```no_run
//! use frameshard::{
//!     FfmpegBackend, InputFileSet, SampleRatePolicy, Worker, WorkerIdentity, WorkerOptions,
//! };
//!
//! // Worker 2 of 8, one frame per second.
//! let input = InputFileSet::from_directory("/data/videos", &[])?;
//! let options = WorkerOptions::new()
//!     .with_policy(SampleRatePolicy::from_frames_per_second(1.0)?);
//! let worker = Worker::new(WorkerIdentity::new(2, 8)?, "/data/frames", options)?;
//!
//! let report = worker.run(&input, &FfmpegBackend::new())?;
//! report.save("/data/frames/report-worker-2.json")?;
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```
//!
//! ## How work is split
//!
//! - **Sharding** sorts the input file names and deals them round-robin, so
//!   every worker derives the same partition with no coordination.
//! - **Sampling** either keeps every native frame or keeps the first frame
//!   at or past each multiple of `native_fps / target_fps`.
//! - **Output** goes to `{output}/{video file name}/frame_{index:08}.{ext}`.
//! - **Fault isolation**: an unreadable video is skipped, a mid-stream
//!   decode error truncates that video, a failed write skips that frame.
//!   All of it is recorded in the [`JobReport`].
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`Worker::run_parallel`] decodes the videos of a shard concurrently |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
mod conversion;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod progress;
pub mod report;
pub mod sampler;
pub mod shard;
pub mod worker;
pub mod writer;

pub use configuration::{
    FrameOutputOptions, PixelFormat, ResourceConfig, WORKER_COUNT_ENV, WORKER_INDEX_ENV,
    WorkerOptions, identity_from_env, identity_from_values,
};
pub use decoder::{DecodedFrame, FfmpegBackend, FrameSource, VideoBackend, VideoHandle};
pub use error::FrameShardError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use progress::{ProgressCallback, ProgressInfo};
pub use report::{JobReport, ReportSummary, VideoOutcome, VideoReport};
pub use sampler::{FrameSampler, SampleRatePolicy};
pub use shard::{InputFileSet, Shard, WorkerIdentity, assign};
pub use worker::{Worker, run};
pub use writer::{FRAME_INDEX_WIDTH, ImageFormat, OutputLayout, OutputRecord};
