//! Video decoding.
//!
//! The worker only needs three things from a decoder: open a file, pull
//! frames in native order, and know the native frame rate. [`VideoBackend`]
//! and [`FrameSource`] capture exactly that, so the driver can be exercised
//! against an in-memory source in tests, and [`FfmpegBackend`] provides the
//! real implementation on top of `ffmpeg-next`.
//!
//! Every open session is wrapped in a [`VideoHandle`]. Dropping the handle
//! releases the demuxer, decoder and scaler, so resources are returned on
//! every exit path of a video, including early returns and panics.
//!
//! # Example
//!
//! ```no_run
//! use frameshard::{FfmpegBackend, FrameOutputOptions, VideoHandle};
//!
//! let backend = FfmpegBackend::new();
//! let mut handle = VideoHandle::open(&backend, "input.mp4", &FrameOutputOptions::default())?;
//! println!("native rate: {:.3} fps", handle.native_frame_rate());
//!
//! while let Some(frame) = handle.next_frame()? {
//!     println!("decoded frame {}", frame.native_index);
//! }
//! # Ok::<(), frameshard::FrameShardError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use image::DynamicImage;

use crate::{
    configuration::FrameOutputOptions,
    conversion::{buffer_to_image, frame_to_buffer, rational_to_frames_per_second},
    error::FrameShardError,
};

/// Give up on a stream after this many consecutive demuxer read errors.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 64;

/// One decoded frame with its position in the video's own frame sequence.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Zero-based native frame index.
    pub native_index: u64,
    /// The decoded, converted picture.
    pub image: DynamicImage,
}

/// A sequential frame stream for one open video.
pub trait FrameSource {
    /// Native frame rate of the stream, `0.0` if unknown.
    fn native_frame_rate(&self) -> f64;

    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` at end of stream. An `Err` is a mid-stream fault;
    /// callers treat it as the end of this video.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, FrameShardError>;
}

/// Opens videos as [`FrameSource`]s.
pub trait VideoBackend {
    /// Open `path` for sequential decoding.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::UnreadableVideo`] if the file cannot be
    /// decoded at all.
    fn open(
        &self,
        path: &Path,
        output: &FrameOutputOptions,
    ) -> Result<Box<dyn FrameSource>, FrameShardError>;
}

/// Scoped decode session for one video.
///
/// Frames are delivered with strictly increasing native indices. After the
/// first end-of-stream or fault the handle is exhausted and keeps returning
/// `Ok(None)`.
pub struct VideoHandle {
    path: PathBuf,
    source: Box<dyn FrameSource>,
    frames_delivered: u64,
    last_index: Option<u64>,
    exhausted: bool,
}

impl Debug for VideoHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoHandle")
            .field("path", &self.path)
            .field("frames_delivered", &self.frames_delivered)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl VideoHandle {
    /// Open a video through `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::UnreadableVideo`] if the backend cannot
    /// open the file.
    pub fn open<B, P>(
        backend: &B,
        path: P,
        output: &FrameOutputOptions,
    ) -> Result<Self, FrameShardError>
    where
        B: VideoBackend + ?Sized,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let source = backend.open(path, output)?;
        log::debug!(
            "Opened decoder for {} ({:.3} fps)",
            path.display(),
            source.native_frame_rate()
        );
        Ok(Self {
            path: path.to_path_buf(),
            source,
            frames_delivered: 0,
            last_index: None,
            exhausted: false,
        })
    }

    /// Path of the open video.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Native frame rate reported by the decoder.
    pub fn native_frame_rate(&self) -> f64 {
        self.source.native_frame_rate()
    }

    /// Number of frames delivered so far.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    /// Pull the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameShardError::DecodeFault`] once, at the point the
    /// stream broke; subsequent calls return `Ok(None)`.
    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>, FrameShardError> {
        if self.exhausted {
            return Ok(None);
        }

        match self.source.next_frame() {
            Ok(Some(frame)) => {
                if self.last_index.is_some_and(|last| frame.native_index <= last) {
                    self.exhausted = true;
                    return Err(FrameShardError::DecodeFault {
                        path: self.path.clone(),
                        frame: self.frames_delivered,
                        reason: format!(
                            "frame index {} is not after {}",
                            frame.native_index,
                            self.last_index.unwrap_or_default()
                        ),
                    });
                }
                self.last_index = Some(frame.native_index);
                self.frames_delivered += 1;
                Ok(Some(frame))
            }
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(error) => {
                self.exhausted = true;
                Err(error)
            }
        }
    }

    /// Release the decoder now. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for VideoHandle {
    fn drop(&mut self) {
        log::debug!(
            "Closed decoder for {} after {} frame(s)",
            self.path.display(),
            self.frames_delivered
        );
    }
}

/// Decoder backend built on the system FFmpeg libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    /// Create the backend. FFmpeg itself is initialised lazily on first open.
    pub fn new() -> Self {
        Self
    }
}

impl VideoBackend for FfmpegBackend {
    fn open(
        &self,
        path: &Path,
        output: &FrameOutputOptions,
    ) -> Result<Box<dyn FrameSource>, FrameShardError> {
        let source = FfmpegFrameSource::open(path, output)?;
        Ok(Box::new(source))
    }
}

/// Sequential FFmpeg decode session: demuxer, decoder and a lazily built
/// scaler to the requested output format.
struct FfmpegFrameSource {
    path: PathBuf,
    input_context: Input,
    decoder: VideoDecoder,
    video_stream_index: usize,
    frames_per_second: f64,
    output: FrameOutputOptions,
    scaler: Option<ScalerState>,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    next_index: u64,
    consecutive_read_errors: u32,
    eof_sent: bool,
    done: bool,
}

/// Scaler plus the source geometry it was built for.
struct ScalerState {
    context: ScalingContext,
    source_format: Pixel,
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: u32,
}

impl FfmpegFrameSource {
    fn open(path: &Path, output: &FrameOutputOptions) -> Result<Self, FrameShardError> {
        let unreadable = |reason: String| FrameShardError::UnreadableVideo {
            path: path.to_path_buf(),
            reason,
        };

        crate::ffmpeg::init()
            .map_err(|error| unreadable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let (video_stream_index, frames_per_second, decoder) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| unreadable("no video stream found".to_string()))?;

            let frames_per_second = rational_to_frames_per_second(stream.avg_frame_rate())
                .or_else(|| rational_to_frames_per_second(stream.rate()))
                .unwrap_or(0.0);

            let decoder_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| unreadable(format!("bad codec parameters: {error}")))?;
            let decoder = decoder_context
                .decoder()
                .video()
                .map_err(|error| unreadable(format!("cannot create video decoder: {error}")))?;

            (stream.index(), frames_per_second, decoder)
        };

        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(unreadable("video stream has zero dimensions".to_string()));
        }

        log::debug!(
            "Video stream {} in {}: {}x{}, {:.3} fps",
            video_stream_index,
            path.display(),
            decoder.width(),
            decoder.height(),
            frames_per_second,
        );

        Ok(Self {
            path: path.to_path_buf(),
            input_context,
            decoder,
            video_stream_index,
            frames_per_second,
            output: output.clone(),
            scaler: None,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            next_index: 0,
            consecutive_read_errors: 0,
            eof_sent: false,
            done: false,
        })
    }

    fn fault(&mut self, reason: String) -> FrameShardError {
        self.done = true;
        FrameShardError::DecodeFault {
            path: self.path.clone(),
            frame: self.next_index,
            reason,
        }
    }

    /// (Re)build the scaler if the decoded frame's geometry changed.
    fn ensure_scaler(&mut self) -> Result<(), FfmpegError> {
        let format = self.decoded_frame.format();
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        let current = self.scaler.as_ref().is_some_and(|state| {
            state.source_format == format
                && state.source_width == width
                && state.source_height == height
        });
        if current {
            return Ok(());
        }

        let (target_width, target_height) = self.output.resolve_dimensions(width, height);
        let context = ScalingContext::get(
            format,
            width,
            height,
            self.output.pixel_format.to_ffmpeg_pixel(),
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )?;
        self.scaler = Some(ScalerState {
            context,
            source_format: format,
            source_width: width,
            source_height: height,
            target_width,
            target_height,
        });
        Ok(())
    }

    /// Scale and convert the current `decoded_frame` to an image.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, String> {
        self.ensure_scaler()
            .map_err(|error| format!("cannot build scaler: {error}"))?;
        let Some(state) = self.scaler.as_mut() else {
            return Err("scaler unavailable".to_string());
        };

        state
            .context
            .run(&self.decoded_frame, &mut self.scaled_frame)
            .map_err(|error| format!("scaling failed: {error}"))?;

        let width = state.target_width;
        let height = state.target_height;
        let pixel_format = self.output.pixel_format;
        frame_to_buffer(
            &self.scaled_frame,
            width,
            height,
            pixel_format.bytes_per_pixel(),
        )
        .and_then(|buffer| buffer_to_image(buffer, width, height, pixel_format))
        .ok_or_else(|| "decoded frame data does not match its geometry".to_string())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn native_frame_rate(&self) -> f64 {
        self.frames_per_second
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, FrameShardError> {
        if self.done {
            return Ok(None);
        }

        loop {
            // Drain anything the decoder has already produced.
            match classify_receive(self.decoder.receive_frame(&mut self.decoded_frame)) {
                Receive::Frame => {
                    let image = match self.convert_current_frame() {
                        Ok(image) => image,
                        Err(reason) => return Err(self.fault(reason)),
                    };
                    let native_index = self.next_index;
                    self.next_index += 1;
                    return Ok(Some(DecodedFrame {
                        native_index,
                        image,
                    }));
                }
                Receive::Drained => {
                    self.done = true;
                    return Ok(None);
                }
                Receive::Failed(error) => {
                    return Err(self.fault(format!("decoding failed: {error}")));
                }
                Receive::NeedsInput => {}
            }

            if self.eof_sent {
                self.done = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    self.consecutive_read_errors = 0;
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        return Err(self.fault(format!("decoder rejected packet: {error}")));
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        return Err(self.fault(format!("cannot flush decoder: {error}")));
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    self.consecutive_read_errors += 1;
                    if self.consecutive_read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return Err(self.fault(format!("demuxer read failed: {error}")));
                    }
                }
            }
        }
    }
}

/// What a `receive_frame` call means for the decode loop.
#[derive(Debug)]
enum Receive {
    /// A frame is ready in the output buffer.
    Frame,
    /// The decoder wants another packet (`EAGAIN`).
    NeedsInput,
    /// The decoder is fully flushed.
    Drained,
    /// A real decode error; ends the video early.
    Failed(FfmpegError),
}

fn classify_receive(result: Result<(), FfmpegError>) -> Receive {
    match result {
        Ok(()) => Receive::Frame,
        Err(FfmpegError::Other { errno }) if errno == EAGAIN => Receive::NeedsInput,
        Err(FfmpegError::Eof) => Receive::Drained,
        Err(error) => Receive::Failed(error),
    }
}
