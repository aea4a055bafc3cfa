use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::capture_source::{
    CaptureConfig, CaptureProvider, CaptureSource, DeviceError,
};
use crate::shared::frame::Frame;

type FrameSlot = Arc<Mutex<Option<Frame>>>;

/// How long dropping a capture waits for the decoder to notice `stop`.
/// A network source can block inside a read far longer than this.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens live sources through ffmpeg-next (libavdevice + libavcodec).
#[derive(Debug, Default)]
pub struct FfmpegCaptureProvider;

impl FfmpegCaptureProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureProvider for FfmpegCaptureProvider {
    fn setup(&mut self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, DeviceError> {
        let capture = FfmpegCapture::open(config.clone())?;
        Ok(Box::new(capture))
    }
}

/// A capture source decoded on a dedicated thread.
///
/// The decoder thread keeps only the newest RGB frame, so a slow consumer
/// never builds up latency.
pub struct FfmpegCapture {
    latest: FrameSlot,
    ready_rx: Receiver<()>,
    ready: bool,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    /// Disconnects when the decoder thread exits.
    done_rx: Receiver<()>,
    stop_timeout: Duration,
}

impl FfmpegCapture {
    /// Opens the source and starts decoding. Open errors are reported here,
    /// not on the first `wait_ready`.
    pub fn open(config: CaptureConfig) -> Result<Self, DeviceError> {
        let latest: FrameSlot = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<(), DeviceError>>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let slot = latest.clone();
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("capture-decoder".into())
            .spawn(move || decode_thread(config, slot, open_tx, ready_tx, stop_flag, done_tx))
            .map_err(|e| DeviceError::Open {
                location: "decoder thread".into(),
                reason: e.to_string(),
            })?;

        match open_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                latest,
                ready_rx,
                ready: false,
                stop,
                handle: Some(handle),
                done_rx,
                stop_timeout: STOP_TIMEOUT,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(DeviceError::Disconnected)
            }
        }
    }
}

impl CaptureSource for FfmpegCapture {
    fn is_ready(&self) -> bool {
        self.ready
            || self
                .latest
                .lock()
                .map(|slot| slot.is_some())
                .unwrap_or(false)
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), DeviceError> {
        if self.ready {
            return Ok(());
        }
        match self.ready_rx.recv_timeout(timeout) {
            Ok(()) => {
                self.ready = true;
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(DeviceError::NotReady(timeout.as_millis() as u64)),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Disconnected),
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.done_rx.recv_timeout(self.stop_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                // Stuck in a blocking read; the thread exits on its next packet.
                log::warn!(
                    "Capture decoder did not stop within {:?}, detaching it",
                    self.stop_timeout
                );
            }
            _ => {
                let _ = handle.join();
            }
        }
    }
}

struct Decoder {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

fn decode_thread(
    config: CaptureConfig,
    slot: FrameSlot,
    open_tx: Sender<Result<(), DeviceError>>,
    ready_tx: Sender<()>,
    stop: Arc<AtomicBool>,
    _done: Sender<()>,
) {
    let mut decoder = match open_decoder(&config) {
        Ok(d) => {
            log::info!(
                "Capture opened: {} at {}x{} (target {} fps)",
                config.source,
                d.width,
                d.height,
                config.target_fps
            );
            let _ = open_tx.send(Ok(()));
            d
        }
        Err(e) => {
            let _ = open_tx.send(Err(e));
            return;
        }
    };

    let Decoder {
        input,
        decoder,
        scaler,
        stream_index,
        width,
        height,
    } = &mut decoder;

    let mut sequence = 0usize;
    for (stream, packet) in input.packets() {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        if stream.index() != *stream_index || decoder.send_packet(&packet).is_err() {
            continue;
        }
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
            if let Err(e) = scaler.run(&decoded, &mut rgb) {
                log::warn!("Dropping frame that failed to convert: {e}");
                continue;
            }
            let pixels = extract_rgb_pixels(&rgb, *width, *height);
            *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                Some(Frame::new(pixels, *width, *height, 3, sequence));
            if sequence == 0 {
                let _ = ready_tx.try_send(());
            }
            sequence += 1;
        }
    }
    log::info!("Capture source {} reached end of stream", config.source);
}

fn open_decoder(config: &CaptureConfig) -> Result<Decoder, DeviceError> {
    let open_err = |reason: String| DeviceError::Open {
        location: config.source.clone(),
        reason,
    };

    ffmpeg_next::init().map_err(|e| open_err(e.to_string()))?;
    ffmpeg_next::device::register_all();

    let mut options = ffmpeg_next::Dictionary::new();
    if config.width > 0 && config.height > 0 {
        options.set("video_size", &format!("{}x{}", config.width, config.height));
    }
    if config.target_fps > 0 {
        options.set("framerate", &config.target_fps.to_string());
    }

    let input = match config.input_format.as_deref() {
        Some(name) => {
            let format = ffmpeg_next::device::input::video()
                .find(|f| f.name() == name)
                .ok_or_else(|| open_err(format!("input format '{name}' is not available")))?;
            let ctx = ffmpeg_next::format::open_with(
                &config.source,
                &ffmpeg_next::format::Format::Input(format),
                options,
            )
            .map_err(|e| open_err(e.to_string()))?;
            match ctx {
                ffmpeg_next::format::context::Context::Input(input) => input,
                _ => return Err(open_err("device opened as output".into())),
            }
        }
        None => ffmpeg_next::format::input_with_dictionary(&config.source, options)
            .map_err(|e| open_err(e.to_string()))?,
    };

    let stream = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| DeviceError::NoVideoStream(config.source.clone()))?;
    let stream_index = stream.index();
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| open_err(e.to_string()))?;
    let decoder = codec_ctx
        .decoder()
        .video()
        .map_err(|e| open_err(e.to_string()))?;

    let (width, height) = output_size(config, decoder.width(), decoder.height());
    let scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| open_err(e.to_string()))?;

    Ok(Decoder {
        input,
        decoder,
        scaler,
        stream_index,
        width,
        height,
    })
}

/// Requested size when set, otherwise the native decoder size.
fn output_size(config: &CaptureConfig, native_w: u32, native_h: u32) -> (u32, u32) {
    if config.width > 0 && config.height > 0 {
        (config.width, config.height)
    } else {
        (native_w, native_h)
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// stripping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
