//! Per-worker job reports.
//!
//! A [`JobReport`] is the definitive summary of one worker's contribution:
//! one [`VideoReport`] per video in its shard, keyed by video identifier in
//! canonical order. Frames are already on disk by the time the report
//! exists; the report describes them, it does not gate them.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{error::FrameShardError, sampler::SampleRatePolicy, shard::WorkerIdentity};

/// How processing of one video ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoOutcome {
    /// Decoded to end of stream and every sampled frame was written.
    Success,
    /// Frames were written, but the stream faulted or some writes failed.
    Partial,
    /// The video could not be opened; nothing was written.
    Failure,
}

impl Display for VideoOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            VideoOutcome::Success => "SUCCESS",
            VideoOutcome::Partial => "PARTIAL",
            VideoOutcome::Failure => "FAILURE",
        })
    }
}

/// Result of processing one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoReport {
    /// Final outcome.
    pub outcome: VideoOutcome,
    /// Frames successfully written.
    pub frames_written: u64,
    /// Native frames decoded (sampled or not).
    pub frames_decoded: u64,
    /// Sampled frames whose write failed.
    pub write_failures: u64,
    /// First error encountered, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoReport {
    /// A video that could not be opened.
    pub fn failure(error: &FrameShardError) -> Self {
        Self {
            outcome: VideoOutcome::Failure,
            frames_written: 0,
            frames_decoded: 0,
            write_failures: 0,
            error: Some(error.to_string()),
        }
    }

    /// Classify a finished decode pass.
    ///
    /// `decode_fault` is the mid-stream fault that ended decoding early, if
    /// any; `first_write_error` the first frame that failed to write.
    pub fn from_counts(
        frames_written: u64,
        frames_decoded: u64,
        write_failures: u64,
        decode_fault: Option<&FrameShardError>,
        first_write_error: Option<&FrameShardError>,
    ) -> Self {
        let error = decode_fault.or(first_write_error).map(ToString::to_string);
        let outcome = if error.is_some() {
            VideoOutcome::Partial
        } else {
            VideoOutcome::Success
        };
        Self {
            outcome,
            frames_written,
            frames_decoded,
            write_failures,
            error,
        }
    }
}

/// Totals across a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Videos in the shard.
    pub videos: u64,
    /// Videos with [`VideoOutcome::Success`].
    pub succeeded: u64,
    /// Videos with [`VideoOutcome::Partial`].
    pub partial: u64,
    /// Videos with [`VideoOutcome::Failure`].
    pub failed: u64,
    /// Frames written across all videos.
    pub frames_written: u64,
}

/// Summary of one worker's run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    /// The worker that produced this report.
    pub worker: WorkerIdentity,
    /// Sampling policy in effect.
    pub policy: SampleRatePolicy,
    /// Output root the frames were written under.
    #[serde(serialize_with = "serialize_lossy_path")]
    pub output_root: PathBuf,
    /// Per-video results in canonical order.
    #[serde(serialize_with = "serialize_videos")]
    pub videos: BTreeMap<PathBuf, VideoReport>,
}

// JSON keys must be strings; identifiers that are not valid UTF-8 are
// written lossily rather than failing the whole report.
fn serialize_videos<S>(
    videos: &BTreeMap<PathBuf, VideoReport>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(videos.len()))?;
    for (video, report) in videos {
        map.serialize_entry(&video.to_string_lossy(), report)?;
    }
    map.end()
}

fn serialize_lossy_path<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

impl JobReport {
    /// An empty report for `worker`.
    pub fn new(worker: WorkerIdentity, policy: SampleRatePolicy, output_root: PathBuf) -> Self {
        Self {
            worker,
            policy,
            output_root,
            videos: BTreeMap::new(),
        }
    }

    /// Record the result for one video.
    pub fn record(&mut self, video: PathBuf, report: VideoReport) {
        self.videos.insert(video, report);
    }

    /// Result for a video, if it was part of this shard.
    pub fn get(&self, video: &Path) -> Option<&VideoReport> {
        self.videos.get(video)
    }

    /// Compute totals.
    pub fn summary(&self) -> ReportSummary {
        self.videos
            .values()
            .fold(ReportSummary::default(), |mut summary, video| {
                summary.videos += 1;
                summary.frames_written += video.frames_written;
                match video.outcome {
                    VideoOutcome::Success => summary.succeeded += 1,
                    VideoOutcome::Partial => summary.partial += 1,
                    VideoOutcome::Failure => summary.failed += 1,
                }
                summary
            })
    }

    /// Returns `true` if every video succeeded.
    pub fn is_clean(&self) -> bool {
        self.videos
            .values()
            .all(|video| video.outcome == VideoOutcome::Success)
    }

    /// Render the report, including its summary, as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Json`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, FrameShardError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("summary".to_string(), serde_json::to_value(self.summary())?);
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Write the JSON report to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Io`] or [`FrameShardError::Json`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FrameShardError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        log::info!("Wrote job report to {}", path.display());
        Ok(())
    }
}
