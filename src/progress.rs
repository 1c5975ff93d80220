//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring a worker run and
//! [`ProgressInfo`] for progress snapshots. Progress is measured in videos
//! (the unit whose total is known up front); frame counts ride along for
//! display.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frameshard::{
//!     FfmpegBackend, InputFileSet, ProgressCallback, ProgressInfo, Worker,
//!     WorkerIdentity, WorkerOptions,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "{}/{} videos, {} frames",
//!             info.videos_completed, info.total_videos, info.frames_written,
//!         );
//!     }
//! }
//!
//! let input = InputFileSet::from_directory("videos", &[])?;
//! let options = WorkerOptions::new().with_progress(Arc::new(PrintProgress));
//! let worker = Worker::new(WorkerIdentity::single(), "frames", options)?;
//! let report = worker.run(&input, &FfmpegBackend::new())?;
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

/// A snapshot of worker progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Videos fully processed (any outcome).
    pub videos_completed: u64,
    /// Videos in this worker's shard.
    pub total_videos: u64,
    /// Frames written so far across the shard.
    pub frames_written: u64,
    /// Completion percentage (0.0 - 100.0) by videos.
    pub percentage: Option<f32>,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on per-video throughput.
    pub estimated_remaining: Option<Duration>,
    /// Video the update refers to.
    pub current_video: Option<PathBuf>,
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be [`Send`] and [`Sync`] because updates may come
/// from several threads when videos are processed in parallel. Callbacks
/// observe the run; they cannot stop it.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` written frames and after each video.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks counters and emits callbacks. Shareable across threads.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total_videos: u64,
    batch_size: u64,
    start_time: Instant,
    videos_completed: AtomicU64,
    frames_written: AtomicU64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total_videos: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            total_videos,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            videos_completed: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
        }
    }

    /// Record one written frame, reporting on batch boundaries.
    pub(crate) fn frame_written(&self, video: &Path) {
        let written = self.frames_written.fetch_add(1, Ordering::AcqRel) + 1;
        if written % self.batch_size == 0 {
            self.report(Some(video));
        }
    }

    /// Record a finished video and always report.
    pub(crate) fn video_finished(&self, video: &Path) {
        self.videos_completed.fetch_add(1, Ordering::AcqRel);
        self.report(Some(video));
    }

    fn report(&self, video: Option<&Path>) {
        let elapsed = self.start_time.elapsed();
        let videos_completed = self.videos_completed.load(Ordering::Acquire);

        let percentage = (self.total_videos > 0)
            .then(|| (videos_completed as f32 / self.total_videos as f32) * 100.0);

        let estimated_remaining = (videos_completed > 0).then(|| {
            let remaining = self.total_videos.saturating_sub(videos_completed);
            elapsed.mul_f64(remaining as f64 / videos_completed as f64)
        });

        let info = ProgressInfo {
            videos_completed,
            total_videos: self.total_videos,
            frames_written: self.frames_written.load(Ordering::Acquire),
            percentage,
            elapsed,
            estimated_remaining,
            current_video: video.map(Path::to_path_buf),
        };

        self.callback.on_progress(&info);
    }
}
