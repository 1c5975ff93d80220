use std::{
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use frameshard::{
    FfmpegBackend, FfmpegLogLevel, ImageFormat, InputFileSet, JobReport, PixelFormat,
    ProgressCallback, ProgressInfo, ResourceConfig, SampleRatePolicy, Shard, VideoOutcome, Worker,
    WorkerIdentity, WorkerOptions, identity_from_values,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  frameshard-cli run --input /opt/input --output /opt/output --fps 1 --worker-index 0 --worker-count 4\n  frameshard-cli run --input videos --output frames --resource-config /opt/ml/config/resourceconfig.json --report frames\n  frameshard-cli plan --input videos --worker-count 4 --json\n  frameshard-cli completions zsh > _frameshard-cli";

#[derive(Debug, Parser)]
#[command(
    name = "frameshard-cli",
    version,
    about = "Extract still frames from this worker's shard of a shared video pool",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args, Clone)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg's own log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true, default_value = "error")]
    ffmpeg_log_level: String,
}

#[derive(Debug, Args, Clone, Default)]
struct IdentityOptions {
    /// Zero-based ordinal of this worker.
    #[arg(long, env = "FRAMESHARD_WORKER_INDEX")]
    worker_index: Option<String>,

    /// Total number of workers in the job.
    #[arg(long, env = "FRAMESHARD_WORKER_COUNT")]
    worker_count: Option<String>,

    /// Cluster resource document with `current_host` and `hosts`.
    #[arg(long, env = "FRAMESHARD_RESOURCE_CONFIG")]
    resource_config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process this worker's shard.
    #[command(
        about = "Extract frames from this worker's shard",
        after_help = "Examples:\n  frameshard-cli run --input videos --output frames --fps 2 --format jpg\n  FRAMESHARD_WORKER_INDEX=1 FRAMESHARD_WORKER_COUNT=3 frameshard-cli run --input videos --output frames"
    )]
    Run {
        /// Flat directory holding the full input pool.
        #[arg(long)]
        input: PathBuf,
        /// Output root for this worker's frames.
        #[arg(long)]
        output: PathBuf,
        /// Frames per second to keep; 0 keeps every frame.
        #[arg(long, env = "FRAMESHARD_FPS", default_value_t = 0.0)]
        fps: f64,
        #[command(flatten)]
        identity: IdentityOptions,
        /// Output image format (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        format: String,
        /// Frame pixel format (rgb8, rgba8, gray8).
        #[arg(long, default_value = "rgb8")]
        pixel_format: String,
        /// Output width; height follows the aspect ratio unless also set.
        #[arg(long)]
        width: Option<u32>,
        /// Output height; width follows the aspect ratio unless also set.
        #[arg(long)]
        height: Option<u32>,
        /// Comma-separated input extensions to accept (default: all files).
        #[arg(long, value_delimiter = ',')]
        extensions: Vec<String>,
        /// Write the JSON job report to this file or directory.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
        /// Decode the shard's videos concurrently (requires the `rayon` feature).
        #[arg(long)]
        parallel: bool,
        /// Exit with status 2 unless every video succeeded.
        #[arg(long)]
        strict: bool,
    },

    /// Print the shard of every worker without decoding anything.
    #[command(
        about = "Show how the input pool splits across workers",
        after_help = "Examples:\n  frameshard-cli plan --input videos --worker-count 4"
    )]
    Plan {
        /// Flat directory holding the full input pool.
        #[arg(long)]
        input: PathBuf,
        /// Total number of workers.
        #[arg(long)]
        worker_count: usize,
        /// Comma-separated input extensions to accept (default: all files).
        #[arg(long, value_delimiter = ',')]
        extensions: Vec<String>,
        /// Output the plan as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_pixel_format(value: &str) -> Option<PixelFormat> {
    match value.to_ascii_lowercase().as_str() {
        "rgb8" | "rgb" => Some(PixelFormat::Rgb8),
        "rgba8" | "rgba" => Some(PixelFormat::Rgba8),
        "gray8" | "gray" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

fn parse_ffmpeg_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "debug" => Some(FfmpegLogLevel::Debug),
        _ => None,
    }
}

fn resolve_identity(options: &IdentityOptions) -> Result<WorkerIdentity, Box<dyn Error>> {
    if let Some(identity) =
        identity_from_values(options.worker_index.as_deref(), options.worker_count.as_deref())?
    {
        return Ok(identity);
    }

    if let Some(path) = &options.resource_config {
        return Ok(ResourceConfig::from_path(path)?.identity()?);
    }

    log::info!("No worker identity provided; running as the only worker");
    Ok(WorkerIdentity::single())
}

fn report_path(path: &Path, identity: WorkerIdentity) -> PathBuf {
    if path.is_dir() {
        path.join(format!("report-worker-{}.json", identity.ordinal()))
    } else {
        path.to_path_buf()
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(total_videos: u64) -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new(total_videos);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} videos {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.videos_completed);
        self.bar
            .set_message(format!("({} frames written)", info.frames_written));
    }
}

fn print_summary(report: &JobReport) {
    for (video, entry) in &report.videos {
        let outcome = match entry.outcome {
            VideoOutcome::Success => entry.outcome.to_string().green().bold(),
            VideoOutcome::Partial => entry.outcome.to_string().yellow().bold(),
            VideoOutcome::Failure => entry.outcome.to_string().red().bold(),
        };
        match &entry.error {
            Some(error) => println!(
                "{outcome} {} ({} frame(s)): {}",
                video.display(),
                entry.frames_written,
                error.dimmed()
            ),
            None => println!(
                "{outcome} {} ({} frame(s))",
                video.display(),
                entry.frames_written
            ),
        }
    }

    let summary = report.summary();
    println!(
        "{} {}",
        "done:".green().bold(),
        format!(
            "{}: {} video(s), {} succeeded, {} partial, {} failed, {} frame(s) written to {}",
            report.worker,
            summary.videos,
            summary.succeeded,
            summary.partial,
            summary.failed,
            summary.frames_written,
            report.output_root.display(),
        )
    );
}

// File names are rendered lossily: JSON strings must be valid UTF-8.
fn plan_payload(input: &InputFileSet, shards: &[Shard]) -> Value {
    let workers: Vec<Value> = shards
        .iter()
        .map(|shard| {
            let files: Vec<_> = shard
                .files()
                .iter()
                .map(|file| file.to_string_lossy())
                .collect();
            json!({
                "ordinal": shard.identity().ordinal(),
                "files": files,
            })
        })
        .collect();
    json!({
        "input": input.root().to_string_lossy(),
        "files": input.len(),
        "workers": workers,
    })
}

fn print_plan(
    input: &InputFileSet,
    worker_count: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let shards = (0..worker_count)
        .map(|ordinal| {
            WorkerIdentity::new(ordinal, worker_count)
                .map(|identity| Shard::for_worker(input, identity))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if shards.is_empty() {
        return Err("--worker-count must be at least 1".into());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&plan_payload(input, &shards))?);
        return Ok(());
    }

    for shard in &shards {
        println!(
            "{} {} file(s)",
            format!("{}:", shard.identity()).cyan().bold(),
            shard.len()
        );
        for file in shard.files() {
            println!("  {}", file.display());
        }
    }
    Ok(())
}

fn run() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let ffmpeg_log_level = parse_ffmpeg_log_level(&cli.global.ffmpeg_log_level).ok_or(format!(
        "unsupported --ffmpeg-log-level: {}",
        cli.global.ffmpeg_log_level
    ))?;
    frameshard::set_ffmpeg_log_level(ffmpeg_log_level);

    match cli.command {
        Commands::Run {
            input,
            output,
            fps,
            identity,
            format,
            pixel_format,
            width,
            height,
            extensions,
            report,
            progress,
            parallel,
            strict,
        } => {
            // Everything fatal is checked before the first video is opened.
            let identity = resolve_identity(&identity)?;
            let policy = SampleRatePolicy::from_frames_per_second(fps)?;
            let image_format: ImageFormat = format.parse()?;
            let pixel_format = parse_pixel_format(&pixel_format)
                .ok_or(format!("unsupported --pixel-format: {pixel_format}"))?;
            let input_set = InputFileSet::from_directory(&input, &extensions)?;

            let mut options = WorkerOptions::new()
                .with_policy(policy)
                .with_image_format(image_format)
                .with_pixel_format(pixel_format)
                .with_resolution(width, height);

            let terminal = if progress {
                let shard_size = Shard::for_worker(&input_set, identity).len() as u64;
                Some(Arc::new(TerminalProgress::new(shard_size)?))
            } else {
                None
            };
            if let Some(terminal) = &terminal {
                options = options.with_progress(terminal.clone());
            }
            let worker = Worker::new(identity, &output, options)?;

            let backend = FfmpegBackend::new();
            let job_report = if parallel {
                run_parallel(&worker, &input_set, &backend)?
            } else {
                worker.run(&input_set, &backend)?
            };

            if let Some(terminal) = terminal {
                terminal.bar.finish_with_message("done");
            }

            print_summary(&job_report);
            if let Some(path) = report {
                job_report.save(report_path(&path, identity))?;
            }

            if strict && !job_report.is_clean() {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Plan {
            input,
            worker_count,
            extensions,
            json,
        } => {
            let input_set = InputFileSet::from_directory(&input, &extensions)?;
            print_plan(&input_set, worker_count, json)?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "frameshard-cli", &mut std::io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "rayon")]
fn run_parallel(
    worker: &Worker,
    input: &InputFileSet,
    backend: &FfmpegBackend,
) -> Result<JobReport, Box<dyn Error>> {
    Ok(worker.run_parallel(input, backend)?)
}

#[cfg(not(feature = "rayon"))]
fn run_parallel(
    worker: &Worker,
    input: &InputFileSet,
    backend: &FfmpegBackend,
) -> Result<JobReport, Box<dyn Error>> {
    eprintln!(
        "{} {}",
        "warning:".yellow().bold(),
        "--parallel requires building with the `rayon` feature; running sequentially".yellow()
    );
    Ok(worker.run(input, backend)?)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use frameshard::{FfmpegLogLevel, WorkerIdentity};

    use super::{
        IdentityOptions, parse_ffmpeg_log_level, parse_pixel_format, plan_payload, report_path,
        resolve_identity,
    };

    #[test]
    fn parse_pixel_format_aliases() {
        assert!(parse_pixel_format("rgb").is_some());
        assert!(parse_pixel_format("RGBA8").is_some());
        assert!(parse_pixel_format("greyscale").is_some());
        assert!(parse_pixel_format("yuv420p").is_none());
    }

    #[test]
    fn parse_ffmpeg_log_level_aliases() {
        assert_eq!(parse_ffmpeg_log_level("error"), Some(FfmpegLogLevel::Error));
        assert_eq!(parse_ffmpeg_log_level("WARN"), Some(FfmpegLogLevel::Warning));
        assert_eq!(parse_ffmpeg_log_level("quiet"), Some(FfmpegLogLevel::Quiet));
        assert_eq!(parse_ffmpeg_log_level("loud"), None);
    }

    #[test]
    fn explicit_identity_wins() {
        let options = IdentityOptions {
            worker_index: Some("2".to_string()),
            worker_count: Some("3".to_string()),
            resource_config: Some("does-not-exist.json".into()),
        };
        let identity = resolve_identity(&options).unwrap();
        assert_eq!(identity, WorkerIdentity::new(2, 3).unwrap());
    }

    #[test]
    fn zero_worker_count_is_rejected() {
        let options = IdentityOptions {
            worker_index: Some("0".to_string()),
            worker_count: Some("0".to_string()),
            resource_config: None,
        };
        assert!(resolve_identity(&options).is_err());
    }

    #[test]
    fn missing_identity_defaults_to_single_worker() {
        let identity = resolve_identity(&IdentityOptions::default()).unwrap();
        assert_eq!(identity, WorkerIdentity::single());
    }

    #[test]
    fn report_path_keeps_explicit_file_names() {
        let identity = WorkerIdentity::new(3, 4).unwrap();
        let path = report_path(Path::new("no-such-dir/report.json"), identity);
        assert_eq!(path, Path::new("no-such-dir/report.json"));
    }

    #[cfg(unix)]
    #[test]
    fn plan_payload_renders_non_utf8_names() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt, path::PathBuf};

        use frameshard::{InputFileSet, Shard};

        let odd = PathBuf::from(OsStr::from_bytes(b"clip_\xff.mp4"));
        let input = InputFileSet::new("/in", [odd, PathBuf::from("plain.mp4")]);
        let shards = vec![
            Shard::for_worker(&input, WorkerIdentity::new(0, 2).unwrap()),
            Shard::for_worker(&input, WorkerIdentity::new(1, 2).unwrap()),
        ];

        let payload = plan_payload(&input, &shards);
        assert!(serde_json::to_string(&payload).is_ok());
        assert_eq!(payload["files"], 2);
        assert_eq!(payload["workers"][0]["files"][0], "clip_\u{fffd}.mp4");
        assert_eq!(payload["workers"][1]["files"][0], "plain.mp4");
    }
}
