//! The worker driver.
//!
//! A [`Worker`] computes its shard, then for each video: opens a decode
//! session, feeds every native frame through a [`FrameSampler`], writes the
//! sampled frames, and records a [`VideoReport`]. Anything that goes wrong
//! with one video or one frame is absorbed into the report; only invalid
//! configuration stops the worker, and it does so before any video is
//! opened.
//!
//! # Example
//!
//! ```no_run
//! use frameshard::{
//!     FfmpegBackend, InputFileSet, SampleRatePolicy, Worker, WorkerIdentity, WorkerOptions,
//! };
//!
//! let input = InputFileSet::from_directory("/opt/input", &[])?;
//! let identity = WorkerIdentity::new(0, 4)?;
//! let options = WorkerOptions::new()
//!     .with_policy(SampleRatePolicy::from_frames_per_second(1.0)?);
//!
//! let worker = Worker::new(identity, "/opt/output", options)?;
//! let report = worker.run(&input, &FfmpegBackend::new())?;
//! println!("{}", report.to_json()?);
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```

use std::path::{Path, PathBuf};

use crate::{
    configuration::WorkerOptions,
    decoder::{VideoBackend, VideoHandle},
    error::FrameShardError,
    progress::ProgressTracker,
    report::{JobReport, VideoReport},
    sampler::{FrameSampler, SampleRatePolicy},
    shard::{InputFileSet, Shard, WorkerIdentity},
    writer::OutputLayout,
};

/// One worker instance of a sharded extraction job.
#[derive(Debug, Clone)]
pub struct Worker {
    identity: WorkerIdentity,
    layout: OutputLayout,
    options: WorkerOptions,
}

impl Worker {
    /// Create a worker writing under `output_root`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if `options` are invalid.
    pub fn new<P: Into<PathBuf>>(
        identity: WorkerIdentity,
        output_root: P,
        options: WorkerOptions,
    ) -> Result<Self, FrameShardError> {
        options.validate()?;
        let layout = OutputLayout::new(output_root, options.image_format);
        Ok(Self {
            identity,
            layout,
            options,
        })
    }

    /// This worker's identity.
    pub fn identity(&self) -> WorkerIdentity {
        self.identity
    }

    /// Output naming in effect.
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// The videos this worker is responsible for.
    pub fn shard(&self, input: &InputFileSet) -> Shard {
        Shard::for_worker(input, self.identity)
    }

    /// Process the shard sequentially, one open video at a time.
    ///
    /// # Errors
    ///
    /// Never fails once the worker is constructed; the `Result` is kept so
    /// fatal conditions discovered at run time can be surfaced.
    pub fn run<B>(&self, input: &InputFileSet, backend: &B) -> Result<JobReport, FrameShardError>
    where
        B: VideoBackend + ?Sized,
    {
        let shard = self.begin(input);
        let tracker = self.tracker(&shard);
        let mut report = self.empty_report();

        for video in shard.files() {
            let video_report = self.process_video(input, video, backend, &tracker);
            report.record(video.clone(), video_report);
        }

        self.finish(&report);
        Ok(report)
    }

    /// Process the shard with videos decoded concurrently on the rayon
    /// thread pool. Each video gets its own decode session; the report is
    /// identical to the one [`run`](Worker::run) produces.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Worker::run).
    #[cfg(feature = "rayon")]
    pub fn run_parallel<B>(
        &self,
        input: &InputFileSet,
        backend: &B,
    ) -> Result<JobReport, FrameShardError>
    where
        B: VideoBackend + Sync + ?Sized,
    {
        use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        let shard = self.begin(input);
        let tracker = self.tracker(&shard);

        let results: Vec<(PathBuf, VideoReport)> = shard
            .files()
            .par_iter()
            .map(|video| {
                let video_report = self.process_video(input, video, backend, &tracker);
                (video.clone(), video_report)
            })
            .collect();

        let mut report = self.empty_report();
        for (video, video_report) in results {
            report.record(video, video_report);
        }

        self.finish(&report);
        Ok(report)
    }

    fn begin(&self, input: &InputFileSet) -> Shard {
        let shard = self.shard(input);
        log::info!(
            "{}: {} of {} video(s) assigned, sampling {}, writing to {}",
            self.identity,
            shard.len(),
            input.len(),
            self.options.policy,
            self.layout.root().display(),
        );
        shard
    }

    fn tracker(&self, shard: &Shard) -> ProgressTracker {
        ProgressTracker::new(
            self.options.progress.clone(),
            shard.len() as u64,
            self.options.batch_size,
        )
    }

    fn empty_report(&self) -> JobReport {
        JobReport::new(
            self.identity,
            self.options.policy,
            self.layout.root().to_path_buf(),
        )
    }

    fn finish(&self, report: &JobReport) {
        let summary = report.summary();
        log::info!(
            "{}: finished {} video(s): {} succeeded, {} partial, {} failed, {} frame(s) written",
            self.identity,
            summary.videos,
            summary.succeeded,
            summary.partial,
            summary.failed,
            summary.frames_written,
        );
    }

    /// Decode, sample and write one video. Never fails: every problem is
    /// folded into the returned report.
    fn process_video<B>(
        &self,
        input: &InputFileSet,
        video: &Path,
        backend: &B,
        tracker: &ProgressTracker,
    ) -> VideoReport
    where
        B: VideoBackend + ?Sized,
    {
        let report = self.extract(&input.resolve(video), video, backend, tracker);
        tracker.video_finished(video);
        report
    }

    fn extract<B>(
        &self,
        path: &Path,
        video: &Path,
        backend: &B,
        tracker: &ProgressTracker,
    ) -> VideoReport
    where
        B: VideoBackend + ?Sized,
    {
        let mut handle = match VideoHandle::open(backend, path, &self.options.frame_output) {
            Ok(handle) => handle,
            Err(error) => {
                log::warn!("Skipping {}: {error}", video.display());
                return VideoReport::failure(&error);
            }
        };

        let mut sampler = match FrameSampler::new(self.options.policy, handle.native_frame_rate())
        {
            Ok(sampler) => sampler,
            Err(error) => {
                let error = FrameShardError::UnreadableVideo {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                };
                log::warn!("Skipping {}: {error}", video.display());
                return VideoReport::failure(&error);
            }
        };

        let mut frames_decoded = 0_u64;
        let mut frames_written = 0_u64;
        let mut write_failures = 0_u64;
        let mut first_write_error: Option<FrameShardError> = None;
        let mut decode_fault: Option<FrameShardError> = None;

        loop {
            let frame = match handle.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => {
                    log::warn!(
                        "Truncating {} after {frames_decoded} frame(s): {error}",
                        video.display()
                    );
                    decode_fault = Some(error);
                    break;
                }
            };
            frames_decoded += 1;

            if !sampler.should_emit(frame.native_index) {
                continue;
            }

            match self.layout.write(video, frame.native_index, &frame.image) {
                Ok(_) => {
                    frames_written += 1;
                    tracker.frame_written(video);
                }
                Err(error) => {
                    log::warn!("{error}");
                    write_failures += 1;
                    first_write_error.get_or_insert(error);
                }
            }
        }
        handle.close();

        let report = VideoReport::from_counts(
            frames_written,
            frames_decoded,
            write_failures,
            decode_fault.as_ref(),
            first_write_error.as_ref(),
        );
        log::info!(
            "{}: {} ({} of {} decoded frame(s) written)",
            video.display(),
            report.outcome,
            frames_written,
            frames_decoded,
        );
        report
    }
}

/// Run one worker over `input` with default output settings.
///
/// The identity is validated before anything is opened.
///
/// # Errors
///
/// Returns [`FrameShardError::Configuration`] if `worker_count` is zero,
/// `worker_ordinal` is out of range, or `policy` is invalid.
pub fn run<B, P>(
    input: &InputFileSet,
    worker_ordinal: usize,
    worker_count: usize,
    policy: SampleRatePolicy,
    output_root: P,
    backend: &B,
) -> Result<JobReport, FrameShardError>
where
    B: VideoBackend + ?Sized,
    P: Into<PathBuf>,
{
    let identity = WorkerIdentity::new(worker_ordinal, worker_count)?;
    let worker = Worker::new(identity, output_root, WorkerOptions::new().with_policy(policy))?;
    worker.run(input, backend)
}
