//! Deterministic, coordinator-free shard assignment.
//!
//! Every worker sees the same pool of input videos and knows its own
//! [`WorkerIdentity`]. Sorting the pool into a canonical order and dealing
//! file `i` to worker `i mod count` gives each worker its [`Shard`] without
//! any communication: shards are disjoint and together cover the pool.
//!
//! # Example
//!
//! ```
//! use frameshard::{InputFileSet, Shard, WorkerIdentity};
//!
//! let input = InputFileSet::new("/data/in", ["c.mp4", "a.mp4", "b.mp4"]);
//! let identity = WorkerIdentity::new(1, 2)?;
//! let shard = Shard::for_worker(&input, identity);
//!
//! // Canonical order is a, b, c; worker 1 of 2 takes position 1.
//! assert_eq!(shard.len(), 1);
//! assert_eq!(shard.files()[0].to_str(), Some("b.mp4"));
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::FrameShardError;

/// The ordered pool of video identifiers shared by every worker of a job.
///
/// Identifiers are paths relative to [`root`](InputFileSet::root). The set
/// is always held in canonical (lexicographic, deduplicated) order so that
/// the order in which a directory listing happened to return entries never
/// influences shard membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFileSet {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl InputFileSet {
    /// Build a set from explicit identifiers, canonicalising their order.
    ///
    /// Identifiers are paths relative to `root`. Nested identifiers such as
    /// `x/a.mp4` are allowed; their output directory keeps the parent
    /// components, so `x/a.mp4` and `y/a.mp4` never share frame paths.
    pub fn new<R, I, P>(root: R, files: I) -> Self
    where
        R: Into<PathBuf>,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut files: Vec<PathBuf> = files.into_iter().map(Into::into).collect();
        files.sort();
        files.dedup();
        Self {
            root: root.into(),
            files,
        }
    }

    /// List the regular files directly inside `root`.
    ///
    /// Nested directories and hidden dot-files are ignored. When
    /// `extensions` is non-empty only files whose extension matches one of
    /// its entries (case-insensitively, with or without a leading dot) are
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if the directory or any of
    /// its entries cannot be read: a worker with an incomplete listing would
    /// disagree with its peers about shard membership.
    pub fn from_directory<P: AsRef<Path>>(
        root: P,
        extensions: &[String],
    ) -> Result<Self, FrameShardError> {
        let root = root.as_ref();
        let allowed: Vec<String> = extensions
            .iter()
            .map(|extension| extension.trim_start_matches('.').to_ascii_lowercase())
            .filter(|extension| !extension.is_empty())
            .collect();

        let entries = fs::read_dir(root).map_err(|error| {
            FrameShardError::configuration(format!(
                "cannot list input directory {}: {error}",
                root.display()
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| {
                FrameShardError::configuration(format!(
                    "cannot read entry in {}: {error}",
                    root.display()
                ))
            })?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                log::debug!("Ignoring hidden entry {}", entry.path().display());
                continue;
            }

            // Follow symlinks so linked videos count as regular files.
            let metadata = fs::metadata(entry.path()).map_err(|error| {
                FrameShardError::configuration(format!(
                    "cannot stat {}: {error}",
                    entry.path().display()
                ))
            })?;
            if !metadata.is_file() {
                log::debug!("Ignoring non-file entry {}", entry.path().display());
                continue;
            }

            if !allowed.is_empty() && !has_allowed_extension(Path::new(&name), &allowed) {
                log::debug!("Ignoring {} (extension not allowed)", entry.path().display());
                continue;
            }

            files.push(PathBuf::from(name));
        }

        let set = Self::new(root, files);
        log::info!(
            "Discovered {} input file(s) in {}",
            set.len(),
            root.display()
        );
        Ok(set)
    }

    /// Directory the identifiers are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All identifiers in canonical order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of files in the set.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Absolute (root-joined) path for an identifier.
    pub fn resolve(&self, identifier: &Path) -> PathBuf {
        self.root.join(identifier)
    }
}

fn has_allowed_extension(name: &Path, allowed: &[String]) -> bool {
    name.extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|extension| allowed.contains(&extension))
}

/// A worker's position in the fleet: `(ordinal, count)`.
///
/// Immutable once constructed; [`WorkerIdentity::new`] is the only way to
/// build one, so an identity in hand always satisfies `ordinal < count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WorkerIdentity {
    ordinal: usize,
    count: usize,
}

impl WorkerIdentity {
    /// Validate and build an identity.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::Configuration`] if `count` is zero or
    /// `ordinal` is not in `0..count`.
    pub fn new(ordinal: usize, count: usize) -> Result<Self, FrameShardError> {
        if count == 0 {
            return Err(FrameShardError::configuration(
                "worker count must be at least 1",
            ));
        }
        if ordinal >= count {
            return Err(FrameShardError::configuration(format!(
                "worker ordinal {ordinal} is out of range for {count} worker(s)"
            )));
        }
        Ok(Self { ordinal, count })
    }

    /// The identity of the only worker in a one-worker job.
    pub fn single() -> Self {
        Self {
            ordinal: 0,
            count: 1,
        }
    }

    /// Zero-based position of this worker.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Total number of workers in the job.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Display for WorkerIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "worker {}/{}", self.ordinal, self.count)
    }
}

/// The subsequence of an [`InputFileSet`] owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    identity: WorkerIdentity,
    files: Vec<PathBuf>,
}

impl Shard {
    /// Deal the canonical input order round-robin and keep this worker's
    /// share. Workers beyond the number of files receive an empty shard.
    pub fn for_worker(input: &InputFileSet, identity: WorkerIdentity) -> Self {
        let files = input
            .files()
            .iter()
            .enumerate()
            .filter(|(position, _)| position % identity.count == identity.ordinal)
            .map(|(_, file)| file.clone())
            .collect();
        Self { identity, files }
    }

    /// The worker this shard belongs to.
    pub fn identity(&self) -> WorkerIdentity {
        self.identity
    }

    /// Identifiers in this shard, in canonical order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of videos in the shard.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if this worker has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Compute the shard for `worker_ordinal` out of `worker_count` workers.
///
/// # Errors
///
/// Returns [`FrameShardError::Configuration`] for a zero worker count or an
/// ordinal outside `0..worker_count`.
pub fn assign(
    input: &InputFileSet,
    worker_ordinal: usize,
    worker_count: usize,
) -> Result<Shard, FrameShardError> {
    let identity = WorkerIdentity::new(worker_ordinal, worker_count)?;
    Ok(Shard::for_worker(input, identity))
}
